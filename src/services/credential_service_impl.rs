//! Argon2id implementation of the `CredentialService` trait.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use tokio::task;

use crate::config::{PasswordPolicyConfig, SecurityConfig};
use crate::domain::{CredentialHash, Password, ValidationError};
use crate::services::credential_service::{CredentialError, CredentialService};

pub struct Argon2CredentialService {
    params: Params,
    policy: PasswordPolicyConfig,
}

impl Argon2CredentialService {
    /// # Errors
    ///
    /// Fails if the configured Argon2 parameters are out of range.
    pub fn new(config: &SecurityConfig) -> Result<Self, CredentialError> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| CredentialError::Internal(format!("Invalid Argon2 params: {e}")))?;

        Ok(Self {
            params,
            policy: config.password_policy.clone(),
        })
    }

    fn hasher(params: Params) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    }
}

#[async_trait]
impl CredentialService for Argon2CredentialService {
    fn enforce_policy(&self, password: &Password) -> Result<(), ValidationError> {
        check_policy(&self.policy, password.expose())
    }

    async fn hash(&self, password: &Password) -> Result<CredentialHash, CredentialError> {
        let password = password.clone();
        let params = self.params.clone();

        // Argon2 is CPU-intensive; keep it off the async workers
        let phc = task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Self::hasher(params)
                .hash_password(password.expose().as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| CredentialError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| CredentialError::Internal(format!("Password hashing task panicked: {e}")))??;

        Ok(CredentialHash::new(phc))
    }

    async fn verify(
        &self,
        password: &Password,
        credential_hash: &CredentialHash,
    ) -> Result<bool, CredentialError> {
        let password = password.clone();
        let stored = credential_hash.clone();

        task::spawn_blocking(move || {
            let parsed = PasswordHash::new(stored.expose())
                .map_err(|e| CredentialError::MalformedHash(e.to_string()))?;

            // Parameters come from the PHC string, not from config
            Ok(Argon2::default()
                .verify_password(password.expose().as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| CredentialError::Internal(format!("Password verification task panicked: {e}")))?
    }
}

fn check_policy(policy: &PasswordPolicyConfig, password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < policy.min_length {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {} characters", policy.min_length),
        ));
    }

    if length > policy.max_length {
        return Err(ValidationError::new(
            "password",
            format!("Password must be {} characters or less", policy.max_length),
        ));
    }

    if policy.require_uppercase && !password.chars().any(char::is_uppercase) {
        return Err(ValidationError::new(
            "password",
            "Password must contain an uppercase letter",
        ));
    }

    if policy.require_lowercase && !password.chars().any(char::is_lowercase) {
        return Err(ValidationError::new(
            "password",
            "Password must contain a lowercase letter",
        ));
    }

    if policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "password",
            "Password must contain a digit",
        ));
    }

    if policy.require_symbol && password.chars().all(char::is_alphanumeric) {
        return Err(ValidationError::new(
            "password",
            "Password must contain a symbol",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    fn test_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        }
    }

    #[test]
    fn policy_rules() {
        let policy = PasswordPolicyConfig::default();
        assert!(check_policy(&policy, "Wonderland1").is_ok());
        assert!(check_policy(&policy, "Short1").is_err());
        assert!(check_policy(&policy, "wonderland1").is_err());
        assert!(check_policy(&policy, "WONDERLAND1").is_err());
        assert!(check_policy(&policy, "Wonderland").is_err());
        assert!(check_policy(&policy, &"Aa1".repeat(50)).is_err());

        let strict = PasswordPolicyConfig {
            require_symbol: true,
            ..PasswordPolicyConfig::default()
        };
        assert!(check_policy(&strict, "Wonderland1").is_err());
        assert!(check_policy(&strict, "Wonderland1!").is_ok());
    }

    #[test]
    fn policy_error_names_password_field() {
        let err = check_policy(&PasswordPolicyConfig::default(), "x").unwrap_err();
        assert_eq!(err.field, "password");
    }

    #[test]
    fn rejects_invalid_params() {
        let config = SecurityConfig {
            argon2_parallelism: 0,
            ..test_security()
        };
        assert!(Argon2CredentialService::new(&config).is_err());
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let service = Argon2CredentialService::new(&test_security()).unwrap();
        let password = Password::new("Wonderland1");

        let hash = service.hash(&password).await.unwrap();
        assert_ne!(hash.expose(), password.expose());
        assert!(hash.expose().starts_with("$argon2id$"));

        assert!(service.verify(&password, &hash).await.unwrap());
        assert!(
            !service
                .verify(&Password::new("Wonderland2"), &hash)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn same_password_gets_fresh_salt() {
        let service = Argon2CredentialService::new(&test_security()).unwrap();
        let password = Password::new("Wonderland1");

        let first = service.hash(&password).await.unwrap();
        let second = service.hash(&password).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let service = Argon2CredentialService::new(&test_security()).unwrap();
        let result = service
            .verify(&Password::new("x"), &CredentialHash::new("not-a-phc"))
            .await;
        assert!(matches!(result, Err(CredentialError::MalformedHash(_))));
    }
}
