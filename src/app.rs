use std::sync::Arc;

use reqwest::Client;

use crate::{
    config::Config,
    error::Result,
    management::{ContentCache, TokenStore},
    spotify::{AuthSession, RemoteCatalogClient, RequestDispatcher},
};

/// Every long-lived component, built once at startup and passed around
/// explicitly.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub session: Arc<AuthSession>,
    pub dispatcher: Arc<RequestDispatcher>,
    pub catalog: Arc<RemoteCatalogClient>,
    pub cache: Arc<ContentCache>,
}

impl App {
    /// Wires the components around the OS keyring.
    pub fn build(config: Config) -> Result<Self> {
        let store = TokenStore::keyring(config.keyring_service.clone());
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: TokenStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let session = Arc::new(AuthSession::new(
            config.oauth.clone(),
            client.clone(),
            store,
            config.refresh_wait,
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(Arc::clone(&session), client.clone()));
        let catalog = Arc::new(RemoteCatalogClient::new(Arc::clone(&dispatcher)));
        let cache = Arc::new(ContentCache::new(&config.cache, client));

        Ok(Self {
            config,
            session,
            dispatcher,
            catalog,
            cache,
        })
    }
}
