use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Username as entered.
    pub username: String,

    /// Lowercased username; enforces case-insensitive uniqueness.
    #[sea_orm(unique)]
    pub username_key: String,

    pub email: String,

    /// Lowercased email; enforces case-insensitive uniqueness.
    #[sea_orm(unique)]
    pub email_key: String,

    pub first_name: String,

    pub last_name: String,

    pub mobile_no: Option<String>,

    pub address: Option<String>,

    /// Role tag (ADMIN, MANAGER, ARTIST, EMPLOYEE).
    pub role: String,

    /// Weak reference to another account; checked for cycles by the service.
    #[sea_orm(indexed)]
    pub manager_id: Option<i32>,

    /// Argon2id PHC string
    pub credential_hash: String,

    pub is_active: bool,

    /// Forces a password change before normal use.
    pub first_login: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
