use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::domain::AccountRecord;
use crate::services::{
    AccountError, AccountService, Argon2CredentialService, CredentialService, SeaOrmAccountService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub credentials: Arc<dyn CredentialService>,

    pub accounts: Arc<dyn AccountService>,

    directory: Arc<SeaOrmAccountService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let credentials = Arc::new(
            Argon2CredentialService::new(&config.security)
                .map_err(|e| anyhow::anyhow!("Failed to initialize credential service: {e}"))?,
        ) as Arc<dyn CredentialService>;

        let directory = Arc::new(SeaOrmAccountService::new(
            store.clone(),
            credentials.clone(),
        ));
        let accounts = directory.clone() as Arc<dyn AccountService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            credentials,
            accounts,
            directory,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Delegates to `SeaOrmAccountService` to provision the first administrator.
    pub async fn ensure_bootstrap_admin(&self) -> Result<Option<AccountRecord>, AccountError> {
        let bootstrap = self.config.read().await.bootstrap.clone();
        self.directory.ensure_bootstrap_admin(&bootstrap).await
    }
}
