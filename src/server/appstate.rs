use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::link::client::RemoteSwitchClient;
use crate::link::manager::LinkManager;
use crate::model::links::LinkStore;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    conf: Arc<AppConfig>,
    pub registry: Arc<Mutex<Registry>>,
    links: Arc<Mutex<LinkManager>>,
}

impl AppState {
    pub async fn from_config(config: AppConfig) -> ApiResult<Self> {
        let registry = Arc::new(Mutex::new(Registry::new()));
        let store = LinkStore::new(config.hasslink.links_file.clone());

        let mut links = LinkManager::new(
            RemoteSwitchClient::http_client()?,
            registry.clone(),
            store,
        );
        links.load(&config.links).await;

        Ok(Self {
            conf: Arc::new(config),
            registry,
            links: Arc::new(Mutex::new(links)),
        })
    }

    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.conf.clone()
    }

    #[must_use]
    pub fn links(&self) -> Arc<Mutex<LinkManager>> {
        self.links.clone()
    }
}
