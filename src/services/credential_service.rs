//! Domain service boundary for credential material.
//!
//! Turns submitted plaintext passwords into stored credential hashes,
//! verifies later attempts, and owns the password-strength policy.

use thiserror::Error;

use crate::domain::{CredentialHash, Password, ValidationError};

/// Errors specific to credential operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Stored credential is malformed: {0}")]
    MalformedHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Domain service trait for credentials.
#[async_trait::async_trait]
pub trait CredentialService: Send + Sync {
    /// Checks a candidate password against the configured strength policy.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on the `password` field naming the first
    /// rule the password breaks.
    fn enforce_policy(&self, password: &Password) -> Result<(), ValidationError>;

    /// Produces fresh credential material for `password`.
    async fn hash(&self, password: &Password) -> Result<CredentialHash, CredentialError>;

    /// Checks an attempt against stored credential material.
    async fn verify(
        &self,
        password: &Password,
        credential_hash: &CredentialHash,
    ) -> Result<bool, CredentialError>;
}
