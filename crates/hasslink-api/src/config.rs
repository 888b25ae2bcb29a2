use std::collections::BTreeMap;
use std::net::IpAddr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::link::LinkForm;

#[derive(Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// When set, every API request must carry `Authorization: Bearer <token>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("api_token", &self.api_token.as_ref().map(|_| "<<REDACTED>>"))
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct HasslinkConfig {
    pub links_file: Utf8PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub hasslink: HasslinkConfig,
    /// Statically declared links. These are rebuilt on every start, and
    /// cannot be changed through the links api.
    #[serde(default)]
    pub links: BTreeMap<String, LinkForm>,
}

impl AppConfig {
    #[must_use]
    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }
}
