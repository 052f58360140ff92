//! Per-chain client cache
//!
//! Clients are dialed lazily on first use and reused afterwards. A client that was
//! marked unhealthy is redialed once on the next `connect`; if that redial fails the
//! error is returned and nothing retries it automatically.

use super::{ChainClient, ChainConnector};
use crate::error::ConfigError;
use crate::registry::ChainConfig;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct CachedClient {
    client: Arc<dyn ChainClient>,
    healthy: bool,
}

pub struct ConnectionManager {
    connector: Arc<dyn ChainConnector>,
    clients: Mutex<HashMap<String, CachedClient>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn ChainConnector>) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Cached client for `chain`, dialing (or redialing) when needed.
    pub async fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>> {
        let key = chain.name.to_lowercase();
        let mut clients = self.clients.lock().await;

        if let Some(cached) = clients.get(&key) {
            if cached.healthy {
                return Ok(cached.client.clone());
            }
            tracing::info!(chain = %chain.name, "Redialing chain after failed liveness check");
            clients.remove(&key);
        }

        let client = self.dial_checked(chain).await?;
        clients.insert(
            key,
            CachedClient {
                client: client.clone(),
                healthy: true,
            },
        );
        Ok(client)
    }

    /// Dial a fresh client and verify it answers with the configured chain id.
    ///
    /// Used when registering a chain; the verified client replaces any cached one.
    pub async fn probe(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>> {
        let client = self.dial_checked(chain).await?;
        self.clients.lock().await.insert(
            chain.name.to_lowercase(),
            CachedClient {
                client: client.clone(),
                healthy: true,
            },
        );
        Ok(client)
    }

    /// Record a failed call; the next `connect` redials.
    pub async fn mark_unhealthy(&self, chain: &str) {
        if let Some(cached) = self.clients.lock().await.get_mut(&chain.to_lowercase()) {
            tracing::warn!(chain = %chain, "Marking chain connection unhealthy");
            cached.healthy = false;
        }
    }

    /// Drop the cached client (chain removed from the registry).
    pub async fn evict(&self, chain: &str) {
        self.clients.lock().await.remove(&chain.to_lowercase());
    }

    pub async fn is_cached(&self, chain: &str) -> bool {
        self.clients.lock().await.contains_key(&chain.to_lowercase())
    }

    async fn dial_checked(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>> {
        let client = self.connector.connect(chain).await?;

        let actual = client.chain_id().await.map_err(|e| match e {
            Error::Rpc { chain, message } => Error::Connectivity { chain, message },
            other => other,
        })?;
        if actual != chain.chain_id {
            return Err(ConfigError::ChainIdMismatch {
                chain: chain.name.clone(),
                expected: chain.chain_id,
                actual,
            }
            .into());
        }

        tracing::info!(chain = %chain.name, chain_id = actual, "Connected to chain");
        Ok(client)
    }
}
