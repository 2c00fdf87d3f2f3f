pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountDto, AccountError, AccountService, ResetKind};
pub use account_service_impl::SeaOrmAccountService;

pub mod credential_service;
pub mod credential_service_impl;
pub use credential_service::{CredentialError, CredentialService};
pub use credential_service_impl::Argon2CredentialService;
