//! `SeaORM` implementation of the `AccountService` trait.
//!
//! All mutations pass through a single write gate so that uniqueness checks,
//! the hierarchy check and the commit form one atomic read-modify-write.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::config::{BOOTSTRAP_PASSWORD_ENV, BootstrapConfig};
use crate::db::{AccountRepository, Store};
use crate::domain::account::normalized_key;
use crate::domain::{
    AccountId, AccountPatch, AccountRecord, NewAccount, Password, Role, ValidationError,
};
use crate::services::account_service::{AccountError, AccountService, ResetKind};
use crate::services::credential_service::CredentialService;

pub struct SeaOrmAccountService {
    store: Store,
    credentials: Arc<dyn CredentialService>,
    write_gate: Mutex<()>,
}

impl SeaOrmAccountService {
    #[must_use]
    pub fn new(store: Store, credentials: Arc<dyn CredentialService>) -> Self {
        Self {
            store,
            credentials,
            write_gate: Mutex::new(()),
        }
    }

    fn repo(&self) -> AccountRepository<'_, DatabaseConnection> {
        self.store.accounts()
    }

    /// Provisions the configured administrator when the directory is empty.
    ///
    /// Returns the new account, or `None` if nothing needed to be done.
    pub async fn ensure_bootstrap_admin(
        &self,
        config: &BootstrapConfig,
    ) -> Result<Option<AccountRecord>, AccountError> {
        if !config.enabled || self.repo().count().await? > 0 {
            return Ok(None);
        }

        let Some(password) = config.resolve_password() else {
            warn!(
                "Directory is empty and no bootstrap password is configured; set {} or bootstrap.password",
                BOOTSTRAP_PASSWORD_ENV
            );
            return Ok(None);
        };

        let record = self
            .create(NewAccount {
                username: config.username.clone(),
                email: config.email.clone(),
                first_name: config.first_name.clone(),
                last_name: config.last_name.clone(),
                mobile_no: None,
                address: None,
                role: Role::Admin,
                password: Password::new(password),
                manager_id: None,
            })
            .await?;

        info!(
            account_id = %record.id(),
            username = %record.username(),
            "Bootstrap administrator provisioned; password change required on first login"
        );

        Ok(Some(record))
    }

    /// Validates a manager assignment against a snapshot of the hierarchy.
    /// Caller must hold the write gate.
    async fn check_manager(&self, id: AccountId, manager_id: AccountId) -> Result<(), AccountError> {
        if manager_id == id {
            return Err(AccountError::Cycle { id, manager_id });
        }

        let graph = self.repo().manager_edges().await?;

        if !graph.contains(manager_id) {
            return Err(unknown_manager(manager_id));
        }

        if graph.would_create_cycle(id, manager_id) {
            return Err(AccountError::Cycle { id, manager_id });
        }

        Ok(())
    }

    /// Replaces the credential of an already-loaded record. The caller holds
    /// the write gate for the whole read-verify-write.
    async fn rotate_credential(
        &self,
        _gate: &MutexGuard<'_, ()>,
        mut record: AccountRecord,
        password: Password,
        kind: ResetKind,
    ) -> Result<(), AccountError> {
        self.credentials.enforce_policy(&password)?;
        let credential_hash = self.credentials.hash(&password).await?;
        drop(password);

        record.replace_credential(
            credential_hash,
            kind.forces_first_login(),
            chrono::Utc::now().to_rfc3339(),
        );
        self.repo().save(&record).await?;

        metrics::counter!("password_resets_total", "kind" => kind.as_str()).increment(1);
        info!(
            account_id = %record.id(),
            kind = kind.as_str(),
            first_login = record.first_login(),
            "Credential replaced"
        );

        Ok(())
    }
}

fn unknown_manager(manager_id: AccountId) -> AccountError {
    AccountError::Validation(ValidationError::new(
        "managerId",
        format!("Manager {manager_id} does not exist"),
    ))
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn create(&self, account: NewAccount) -> Result<AccountRecord, AccountError> {
        let account = account.normalize()?;

        let _gate = self.write_gate.lock().await;
        let repo = self.repo();

        if repo.find_by_username(&account.username).await?.is_some() {
            return Err(AccountError::Conflict(format!(
                "Username '{}' is already taken",
                account.username
            )));
        }

        if repo.find_by_email(&account.email).await?.is_some() {
            return Err(AccountError::Conflict(format!(
                "Email '{}' is already registered",
                account.email
            )));
        }

        if let Some(manager_id) = account.manager_id
            && repo.find_by_id(manager_id).await?.is_none()
        {
            return Err(unknown_manager(manager_id));
        }

        self.credentials.enforce_policy(&account.password)?;
        let credential_hash = self.credentials.hash(&account.password).await?;

        let record = repo.insert(&account, &credential_hash).await?;
        drop(account);

        metrics::counter!("accounts_created_total").increment(1);
        info!(
            account_id = %record.id(),
            username = %record.username(),
            role = %record.role(),
            manager_id = ?record.manager_id().map(i32::from),
            "Account provisioned"
        );

        Ok(record)
    }

    async fn update(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<AccountRecord, AccountError> {
        let patch = patch.normalize()?;

        let _gate = self.write_gate.lock().await;
        let repo = self.repo();

        let mut record = repo
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;

        if patch.is_empty() {
            return Ok(record);
        }

        if let Some(email) = &patch.email
            && normalized_key(email) != normalized_key(record.email())
            && let Some(existing) = repo.find_by_email(email).await?
            && existing.id() != id
        {
            return Err(AccountError::Conflict(format!(
                "Email '{email}' is already registered"
            )));
        }

        if let Some(Some(manager_id)) = patch.manager_id {
            self.check_manager(id, manager_id).await?;
        }

        let changed = record.apply(patch, chrono::Utc::now().to_rfc3339());
        if changed {
            repo.save(&record).await?;
            info!(
                account_id = %id,
                role = %record.role(),
                manager_id = ?record.manager_id().map(i32::from),
                is_active = record.is_active(),
                "Account updated"
            );
        }

        Ok(record)
    }

    async fn reset_password(&self, id: AccountId, password: Password) -> Result<(), AccountError> {
        let gate = self.write_gate.lock().await;

        let record = self
            .repo()
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;

        self.rotate_credential(&gate, record, password, ResetKind::Administrative)
            .await
    }

    async fn change_password(
        &self,
        id: AccountId,
        current: Password,
        new: Password,
    ) -> Result<(), AccountError> {
        let gate = self.write_gate.lock().await;

        let record = self
            .repo()
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;

        if !self
            .credentials
            .verify(&current, record.credential_hash())
            .await?
        {
            return Err(ValidationError::new("currentPassword", "Current password is incorrect").into());
        }

        if current == new {
            return Err(ValidationError::new(
                "newPassword",
                "New password must be different from current password",
            )
            .into());
        }

        self.rotate_credential(&gate, record, new, ResetKind::SelfService)
            .await
    }

    async fn would_create_cycle(
        &self,
        id: AccountId,
        proposed_manager: AccountId,
    ) -> Result<bool, AccountError> {
        let graph = self.repo().manager_edges().await?;

        if !graph.contains(id) {
            return Err(AccountError::NotFound(id));
        }
        if !graph.contains(proposed_manager) {
            return Err(AccountError::NotFound(proposed_manager));
        }

        Ok(graph.would_create_cycle(id, proposed_manager))
    }

    async fn deactivate(&self, id: AccountId) -> Result<AccountRecord, AccountError> {
        self.update(id, AccountPatch::deactivate()).await
    }

    async fn delete(&self, id: AccountId) -> Result<(), AccountError> {
        let _gate = self.write_gate.lock().await;

        let record = self
            .repo()
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))?;

        let txn = self.store.conn.begin().await?;
        let repo = AccountRepository::new(&txn);

        let moved = repo.reassign_reports(id, record.manager_id()).await?;
        repo.delete(id).await?;

        txn.commit().await?;

        info!(
            account_id = %id,
            username = %record.username(),
            reassigned_reports = moved,
            "Account deleted"
        );

        Ok(())
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<AccountRecord, AccountError> {
        let Some(record) = self.repo().find_by_username(username).await? else {
            metrics::counter!("account_logins_total", "outcome" => "unknown_user").increment(1);
            return Err(AccountError::InvalidCredentials);
        };

        if !record.can_authenticate() {
            metrics::counter!("account_logins_total", "outcome" => "inactive").increment(1);
            return Err(AccountError::InvalidCredentials);
        }

        if !self
            .credentials
            .verify(password, record.credential_hash())
            .await?
        {
            metrics::counter!("account_logins_total", "outcome" => "bad_password").increment(1);
            return Err(AccountError::InvalidCredentials);
        }

        metrics::counter!("account_logins_total", "outcome" => "success").increment(1);
        Ok(record)
    }

    async fn get(&self, id: AccountId) -> Result<AccountRecord, AccountError> {
        self.repo()
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountRecord>, AccountError> {
        Ok(self.repo().find_by_username(username).await?)
    }

    async fn list(&self) -> Result<Vec<AccountRecord>, AccountError> {
        Ok(self.repo().list().await?)
    }

    async fn reports_of(&self, id: AccountId) -> Result<Vec<AccountRecord>, AccountError> {
        let repo = self.repo();
        if repo.find_by_id(id).await?.is_none() {
            return Err(AccountError::NotFound(id));
        }
        Ok(repo.children_of(id).await?)
    }

    async fn manager_of(&self, id: AccountId) -> Result<Option<AccountRecord>, AccountError> {
        let record = self.get(id).await?;
        match record.manager_id() {
            Some(manager_id) => Ok(self.repo().find_by_id(manager_id).await?),
            None => Ok(None),
        }
    }
}
