use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::TokenGate;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub database: PathBuf,
    /// Prefix the ingestion routes are nested under, e.g. `/api`. Empty for none.
    pub base_path: String,
    pub max_body_bytes: usize,
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database: PathBuf::from("./solar.db"),
            base_path: String::new(),
            max_body_bytes: 64 * 1024,
            token: None,
        }
    }
}

impl ServerConfig {
    pub fn token_gate(&self) -> TokenGate {
        TokenGate::new(self.token.clone())
    }

    /// `base_path` with a leading slash and no trailing slash, or `None`
    /// when routes are served from the root.
    pub fn normalized_base_path(&self) -> Option<String> {
        let trimmed = self.base_path.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        }
    }
}
