//! The account record and the input types used to create and change it.
//!
//! Records are only ever built from validated input or from storage; every
//! field is private and mutation goes through crate-internal operations that
//! the account service calls after its cross-record checks pass.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::OnceLock;

use super::{AccountId, Role};

const MAX_USERNAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;
const MAX_MOBILE_LEN: usize = 32;

/// A single violated field constraint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Plaintext password as submitted on a create or reset request.
///
/// Deliberately not `Serialize`, and `Debug` never prints the value. It is
/// handed to the credential service and dropped.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(plaintext.into())
    }

    /// Borrow the plaintext. Only the credential service should need this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Opaque credential material produced by the credential service
/// (an Argon2 PHC string).
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

/// Input for provisioning a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_no: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub password: Password,
    pub manager_id: Option<AccountId>,
}

impl NewAccount {
    /// Trims display fields, drops blank optionals, and runs every syntactic
    /// check. The first violation is returned.
    pub fn normalize(mut self) -> Result<Self, ValidationError> {
        validate_username(&self.username)?;

        self.email = self.email.trim().to_string();
        validate_email(&self.email)?;

        self.first_name = self.first_name.trim().to_string();
        validate_person_name("firstName", &self.first_name)?;

        self.last_name = self.last_name.trim().to_string();
        validate_person_name("lastName", &self.last_name)?;

        self.mobile_no = normalize_optional(self.mobile_no);
        if let Some(mobile) = &self.mobile_no {
            validate_mobile(mobile)?;
        }

        self.address = normalize_optional(self.address);

        if self.password.is_empty() {
            return Err(ValidationError::new("password", "Password is required"));
        }

        Ok(self)
    }
}

/// Partial update of an account profile. `None` leaves a field untouched;
/// for clearable fields `Some(None)` removes the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_no: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub role: Option<Role>,
    pub manager_id: Option<Option<AccountId>>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    #[must_use]
    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Same normalization rules as [`NewAccount::normalize`], applied only to
    /// the fields present.
    pub fn normalize(mut self) -> Result<Self, ValidationError> {
        if let Some(email) = self.email.take() {
            let email = email.trim().to_string();
            validate_email(&email)?;
            self.email = Some(email);
        }

        if let Some(name) = self.first_name.take() {
            let name = name.trim().to_string();
            validate_person_name("firstName", &name)?;
            self.first_name = Some(name);
        }

        if let Some(name) = self.last_name.take() {
            let name = name.trim().to_string();
            validate_person_name("lastName", &name)?;
            self.last_name = Some(name);
        }

        if let Some(mobile) = self.mobile_no.take() {
            let mobile = normalize_optional(mobile);
            if let Some(m) = &mobile {
                validate_mobile(m)?;
            }
            self.mobile_no = Some(mobile);
        }

        if let Some(address) = self.address.take() {
            self.address = Some(normalize_optional(address));
        }

        Ok(self)
    }
}

/// Fields as they come back from the store.
#[derive(Debug, Clone)]
pub(crate) struct StoredAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub mobile_no: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub manager_id: Option<AccountId>,
    pub credential_hash: CredentialHash,
    pub is_active: bool,
    pub first_login: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One user of the system.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    id: AccountId,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    mobile_no: Option<String>,
    address: Option<String>,
    role: Role,
    manager_id: Option<AccountId>,
    credential_hash: CredentialHash,
    is_active: bool,
    first_login: bool,
    created_at: String,
    updated_at: String,
}

impl AccountRecord {
    pub(crate) fn from_stored(stored: StoredAccount) -> Self {
        Self {
            id: stored.id,
            username: stored.username,
            email: stored.email,
            first_name: stored.first_name,
            last_name: stored.last_name,
            mobile_no: stored.mobile_no,
            address: stored.address,
            role: stored.role,
            manager_id: stored.manager_id,
            credential_hash: stored.credential_hash,
            is_active: stored.is_active,
            first_login: stored.first_login,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    #[must_use]
    pub const fn id(&self) -> AccountId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    #[must_use]
    pub fn mobile_no(&self) -> Option<&str> {
        self.mobile_no.as_deref()
    }

    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn manager_id(&self) -> Option<AccountId> {
        self.manager_id
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub const fn first_login(&self) -> bool {
        self.first_login
    }

    #[must_use]
    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    /// A record with no credential material cannot authenticate.
    #[must_use]
    pub fn can_authenticate(&self) -> bool {
        self.is_active && !self.credential_hash.expose().is_empty()
    }

    pub(crate) const fn credential_hash(&self) -> &CredentialHash {
        &self.credential_hash
    }

    /// Applies an already-normalized patch whose cross-record constraints
    /// have been checked. Returns false (and leaves `updated_at` alone) when
    /// nothing actually changed.
    pub(crate) fn apply(&mut self, patch: AccountPatch, now: String) -> bool {
        let before = self.clone();

        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(name) = patch.first_name {
            self.first_name = name;
        }
        if let Some(name) = patch.last_name {
            self.last_name = name;
        }
        if let Some(mobile) = patch.mobile_no {
            self.mobile_no = mobile;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(manager_id) = patch.manager_id {
            self.manager_id = manager_id;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }

        let changed = *self != before;
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub(crate) fn replace_credential(
        &mut self,
        credential_hash: CredentialHash,
        first_login: bool,
        now: String,
    ) {
        self.credential_hash = credential_hash;
        self.first_login = first_login;
        self.updated_at = now;
    }
}

/// Lowercased key used for case-insensitive uniqueness.
#[must_use]
pub fn normalized_key(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::new("username", "Username is required"));
    }

    if username.trim() != username {
        return Err(ValidationError::new(
            "username",
            "Username must not have leading or trailing whitespace",
        ));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::new(
            "username",
            format!("Username must be {MAX_USERNAME_LEN} characters or less"),
        ));
    }

    if username
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::new(
            "username",
            "Username must not contain whitespace or control characters",
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$")
            .expect("Invalid regex")
    });

    if email.is_empty() {
        return Err(ValidationError::new("email", "Email is required"));
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(ValidationError::new(
            "email",
            format!("Email must be {MAX_EMAIL_LEN} characters or less"),
        ));
    }

    if !re.is_match(email) {
        return Err(ValidationError::new(
            "email",
            format!("'{email}' is not a valid email address"),
        ));
    }

    Ok(())
}

pub fn validate_person_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new(field, "Name is required"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            field,
            format!("Name must be {MAX_NAME_LEN} characters or less"),
        ));
    }

    if name.chars().any(char::is_control) {
        return Err(ValidationError::new(
            field,
            "Name must not contain control characters",
        ));
    }

    Ok(())
}

pub fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    if mobile.len() > MAX_MOBILE_LEN {
        return Err(ValidationError::new(
            "mobileNo",
            format!("Mobile number must be {MAX_MOBILE_LEN} characters or less"),
        ));
    }

    if !mobile
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | '.' | ' '))
    {
        return Err(ValidationError::new(
            "mobileNo",
            "Mobile number may only contain digits and + - ( ) . or spaces",
        ));
    }

    if !mobile.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            "mobileNo",
            "Mobile number must contain at least one digit",
        ));
    }

    Ok(())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
