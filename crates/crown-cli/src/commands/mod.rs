//! CLI command implementations.

mod account;
mod session;

pub use account::{profile, rename};
pub use session::{callback, login, logout, status, token};

use crate::output::OutputFormat;
use anyhow::{Context as _, Result};
use crown_auth::{HttpIdentityGateway, NoProviderSdk, SessionController};
use crown_config_and_utils::{Config, Paths};
use crown_storage::{FileStorage, MemoryStorage, TokenStore};
use std::sync::Arc;

/// Everything a command needs.
pub struct Context {
    pub config: Config,
    pub paths: Paths,
    pub format: OutputFormat,
}

impl Context {
    /// Wire storage, gateway, and controller from the loaded configuration.
    pub fn controller(&self) -> Result<Arc<SessionController>> {
        self.paths.ensure_dirs()?;

        let primary = FileStorage::open(self.paths.storage_file())
            .with_context(|| format!("opening {}", self.paths.storage_file().display()))?;
        let cookies = FileStorage::open(self.paths.cookie_file())
            .with_context(|| format!("opening {}", self.paths.cookie_file().display()))?;
        let store = TokenStore::new(
            Box::new(primary),
            Box::new(MemoryStorage::new()),
            Box::new(cookies),
        );

        let gateway =
            HttpIdentityGateway::new(self.config.api_base_url()?, self.config.request_timeout())?;

        Ok(Arc::new(SessionController::new(
            store,
            Arc::new(gateway),
            Arc::new(NoProviderSdk),
            self.config.request_timeout(),
        )))
    }
}
