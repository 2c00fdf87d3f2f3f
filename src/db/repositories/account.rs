use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Unchanged,
};

use crate::domain::account::{StoredAccount, normalized_key};
use crate::domain::hierarchy::ManagerGraph;
use crate::domain::{AccountId, AccountRecord, CredentialHash, NewAccount, Role};
use crate::entities::accounts;

impl TryFrom<accounts::Model> for AccountRecord {
    type Error = anyhow::Error;

    fn try_from(model: accounts::Model) -> Result<Self> {
        let role: Role = model
            .role
            .parse()
            .with_context(|| format!("Account {} has an unrecognized stored role", model.id))?;

        Ok(Self::from_stored(StoredAccount {
            id: AccountId::new(model.id),
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            mobile_no: model.mobile_no,
            address: model.address,
            role,
            manager_id: model.manager_id.map(AccountId::new),
            credential_hash: CredentialHash::new(model.credential_hash),
            is_active: model.is_active,
            first_login: model.first_login,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }))
    }
}

/// Directory store access for account records.
///
/// Generic over the connection so the account service can run reads and
/// writes inside one transaction.
pub struct AccountRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AccountRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: AccountId) -> Result<Option<AccountRecord>> {
        let account = accounts::Entity::find_by_id(id.value())
            .one(self.conn)
            .await
            .context("Failed to query account by ID")?;

        account.map(AccountRecord::try_from).transpose()
    }

    /// Case-insensitive lookup.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<AccountRecord>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::UsernameKey.eq(normalized_key(username)))
            .one(self.conn)
            .await
            .context("Failed to query account by username")?;

        account.map(AccountRecord::try_from).transpose()
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>> {
        let account = accounts::Entity::find()
            .filter(accounts::Column::EmailKey.eq(normalized_key(email)))
            .one(self.conn)
            .await
            .context("Failed to query account by email")?;

        account.map(AccountRecord::try_from).transpose()
    }

    pub async fn list(&self) -> Result<Vec<AccountRecord>> {
        let rows = accounts::Entity::find()
            .order_by_asc(accounts::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list accounts")?;

        rows.into_iter().map(AccountRecord::try_from).collect()
    }

    /// Direct reports of `manager_id`.
    pub async fn children_of(&self, manager_id: AccountId) -> Result<Vec<AccountRecord>> {
        let rows = accounts::Entity::find()
            .filter(accounts::Column::ManagerId.eq(manager_id.value()))
            .order_by_asc(accounts::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to query direct reports")?;

        rows.into_iter().map(AccountRecord::try_from).collect()
    }

    /// Snapshot of every manager edge.
    pub async fn manager_edges(&self) -> Result<ManagerGraph> {
        let edges: Vec<(i32, Option<i32>)> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .column(accounts::Column::ManagerId)
            .into_tuple()
            .all(self.conn)
            .await
            .context("Failed to load manager edges")?;

        Ok(ManagerGraph::from_edges(edges.into_iter().map(
            |(id, manager)| (AccountId::new(id), manager.map(AccountId::new)),
        )))
    }

    pub async fn count(&self) -> Result<u64> {
        accounts::Entity::find()
            .count(self.conn)
            .await
            .context("Failed to count accounts")
    }

    /// Inserts a freshly provisioned account. The store assigns the id.
    pub async fn insert(
        &self,
        account: &NewAccount,
        credential_hash: &CredentialHash,
    ) -> Result<AccountRecord> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = accounts::ActiveModel {
            id: NotSet,
            username: Set(account.username.clone()),
            username_key: Set(normalized_key(&account.username)),
            email: Set(account.email.clone()),
            email_key: Set(normalized_key(&account.email)),
            first_name: Set(account.first_name.clone()),
            last_name: Set(account.last_name.clone()),
            mobile_no: Set(account.mobile_no.clone()),
            address: Set(account.address.clone()),
            role: Set(account.role.as_str().to_string()),
            manager_id: Set(account.manager_id.map(i32::from)),
            credential_hash: Set(credential_hash.expose().to_string()),
            is_active: Set(true),
            first_login: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert account")?;

        AccountRecord::try_from(model)
    }

    /// Writes every mutable column of `record`.
    pub async fn save(&self, record: &AccountRecord) -> Result<()> {
        let active = accounts::ActiveModel {
            id: Unchanged(record.id().value()),
            username: Unchanged(record.username().to_string()),
            username_key: Unchanged(normalized_key(record.username())),
            email: Set(record.email().to_string()),
            email_key: Set(normalized_key(record.email())),
            first_name: Set(record.first_name().to_string()),
            last_name: Set(record.last_name().to_string()),
            mobile_no: Set(record.mobile_no().map(str::to_string)),
            address: Set(record.address().map(str::to_string)),
            role: Set(record.role().as_str().to_string()),
            manager_id: Set(record.manager_id().map(i32::from)),
            credential_hash: Set(record.credential_hash().expose().to_string()),
            is_active: Set(record.is_active()),
            first_login: Set(record.first_login()),
            created_at: Unchanged(record.created_at().to_string()),
            updated_at: Set(record.updated_at().to_string()),
        };

        active
            .update(self.conn)
            .await
            .with_context(|| format!("Failed to save account {}", record.id()))?;

        Ok(())
    }

    /// Points every direct report of `from` at `to`. Returns the number of
    /// records changed.
    pub async fn reassign_reports(&self, from: AccountId, to: Option<AccountId>) -> Result<u64> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = accounts::Entity::update_many()
            .col_expr(accounts::Column::ManagerId, Expr::value(to.map(i32::from)))
            .col_expr(accounts::Column::UpdatedAt, Expr::value(now))
            .filter(accounts::Column::ManagerId.eq(from.value()))
            .exec(self.conn)
            .await
            .context("Failed to reassign direct reports")?;

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: AccountId) -> Result<bool> {
        let result = accounts::Entity::delete_by_id(id.value())
            .exec(self.conn)
            .await
            .context("Failed to delete account")?;

        Ok(result.rows_affected > 0)
    }
}
