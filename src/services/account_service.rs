//! Domain service for the account directory.
//!
//! Provisioning, profile and credential changes, hierarchy checks and
//! authentication. Every mutating operation is all-or-nothing: when it
//! fails the store is left unchanged.

use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    AccountId, AccountPatch, AccountRecord, NewAccount, Password, Role, ValidationError,
};
use crate::services::credential_service::CredentialError;

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Account {0} not found")]
    NotFound(AccountId),

    #[error("Making {manager_id} the manager of {id} would create a cycle")]
    Cycle { id: AccountId, manager_id: AccountId },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbErr> for AccountError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(format!(
                "Username or email is already in use ({detail})"
            )),
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        // Repository errors carry context; the underlying DbErr decides
        // whether this is a lost uniqueness race.
        if let Some(db_err) = err.downcast_ref::<DbErr>()
            && let Some(SqlErr::UniqueConstraintViolation(detail)) = db_err.sql_err()
        {
            return Self::Conflict(format!("Username or email is already in use ({detail})"));
        }

        if err.downcast_ref::<DbErr>().is_some() {
            return Self::Database(format!("{err:#}"));
        }

        Self::Internal(format!("{err:#}"))
    }
}

impl From<CredentialError> for AccountError {
    fn from(err: CredentialError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Which flavour of password replacement is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// An administrator set the password; the user must change it.
    Administrative,
    /// The user changed their own password, completing any mandated change.
    SelfService,
}

impl ResetKind {
    #[must_use]
    pub const fn forces_first_login(&self) -> bool {
        matches!(self, Self::Administrative)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Administrative => "administrative",
            Self::SelfService => "self_service",
        }
    }
}

/// Outward-facing representation of an account.
///
/// Credential material has no field here, so it cannot leak through any
/// response built from this type.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_no: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub manager_id: Option<AccountId>,
    pub is_active: bool,
    pub first_login: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&AccountRecord> for AccountDto {
    fn from(record: &AccountRecord) -> Self {
        Self {
            id: record.id(),
            username: record.username().to_string(),
            email: record.email().to_string(),
            first_name: record.first_name().to_string(),
            last_name: record.last_name().to_string(),
            mobile_no: record.mobile_no().map(str::to_string),
            address: record.address().map(str::to_string),
            role: record.role(),
            manager_id: record.manager_id(),
            is_active: record.is_active(),
            first_login: record.first_login(),
            created_at: record.created_at().to_string(),
            updated_at: record.updated_at().to_string(),
        }
    }
}

impl From<AccountRecord> for AccountDto {
    fn from(record: AccountRecord) -> Self {
        Self::from(&record)
    }
}

/// Domain service trait for accounts.
#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Provisions a new account.
    ///
    /// Checks run in order: field syntax, username/email uniqueness, manager
    /// existence, password strength. The first failure is returned.
    ///
    /// # Errors
    ///
    /// [`AccountError::Validation`] for malformed input or a weak password,
    /// [`AccountError::Conflict`] when the username or email is taken.
    async fn create(&self, account: NewAccount) -> Result<AccountRecord, AccountError>;

    /// Applies a partial profile update.
    ///
    /// # Errors
    ///
    /// [`AccountError::NotFound`] for an unknown id, [`AccountError::Cycle`]
    /// when the new manager is the account itself or one of its reports.
    async fn update(&self, id: AccountId, patch: AccountPatch)
    -> Result<AccountRecord, AccountError>;

    /// Administrative password reset. Always sets `first_login`.
    async fn reset_password(&self, id: AccountId, password: Password)
    -> Result<(), AccountError>;

    /// Self-service password change. Verifies the current password and
    /// clears `first_login`.
    async fn change_password(
        &self,
        id: AccountId,
        current: Password,
        new: Password,
    ) -> Result<(), AccountError>;

    /// Whether making `proposed_manager` the manager of `id` would create a
    /// cycle.
    async fn would_create_cycle(
        &self,
        id: AccountId,
        proposed_manager: AccountId,
    ) -> Result<bool, AccountError>;

    /// Suspends an account. Idempotent.
    async fn deactivate(&self, id: AccountId) -> Result<AccountRecord, AccountError>;

    /// Removes an account, moving its direct reports up to its own manager.
    async fn delete(&self, id: AccountId) -> Result<(), AccountError>;

    /// Verifies a login attempt.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for an unknown username,
    /// a deactivated account or a wrong password alike.
    async fn authenticate(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<AccountRecord, AccountError>;

    async fn get(&self, id: AccountId) -> Result<AccountRecord, AccountError>;

    async fn find_by_username(&self, username: &str)
    -> Result<Option<AccountRecord>, AccountError>;

    async fn list(&self) -> Result<Vec<AccountRecord>, AccountError>;

    /// Direct reports of `id`.
    async fn reports_of(&self, id: AccountId) -> Result<Vec<AccountRecord>, AccountError>;

    /// The manager of `id`, if it has one.
    async fn manager_of(&self, id: AccountId) -> Result<Option<AccountRecord>, AccountError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_errors_map_to_database() {
        let err: AccountError = DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, AccountError::Database(_)));
    }

    #[test]
    fn plain_anyhow_errors_are_internal() {
        let err: AccountError = anyhow::anyhow!("bad role").into();
        assert!(matches!(err, AccountError::Internal(_)));
    }

    #[test]
    fn contextual_db_errors_stay_database() {
        let err = anyhow::Error::new(DbErr::Custom("locked".to_string())).context("Failed to save");
        assert!(matches!(AccountError::from(err), AccountError::Database(_)));
    }

    #[test]
    fn validation_errors_convert() {
        let err: AccountError = ValidationError::new("email", "bad").into();
        assert!(matches!(err, AccountError::Validation(ref v) if v.field == "email"));
    }

    #[test]
    fn reset_kind_first_login() {
        assert!(ResetKind::Administrative.forces_first_login());
        assert!(!ResetKind::SelfService.forces_first_login());
    }
}
