use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use folio_core::storage::{DirectoryStore, Library, RemoteSource};
use folio_extensions::http::{HttpRemote, HttpRemoteConfig};

use crate::cli::Cli;

pub mod cli;
pub mod commands;

pub struct AppContext {
    pub library: Library,
    pub remote: Option<Arc<HttpRemote>>,
}

impl AppContext {
    /// Opens the cache directory, connects the backend if one is configured and loads the
    /// library.
    pub async fn init(cli: &Cli) -> Result<Self> {
        let store = DirectoryStore::open(&cli.data_dir)
            .await
            .with_context(|| format!("Failed to open data directory {}", cli.data_dir.display()))?;

        let remote = match cli.remote.as_deref() {
            Some(url) => {
                let mut config = HttpRemoteConfig::new(url)?
                    .timeout(Duration::from_secs(cli.timeout_secs));
                if let Some(token) = cli.token.as_deref() {
                    config = config.token(token);
                }
                Some(Arc::new(HttpRemote::new(config)?))
            }
            None => None,
        };

        let library = Library::init(
            Arc::new(store),
            remote.clone().map(|r| r as Arc<dyn RemoteSource>),
        )
        .await;
        Ok(AppContext { library, remote })
    }
}
