//! RPC endpoint configuration
//!
//! Endpoints are secrets (provider URLs usually embed an API key), so they are never
//! written to the registry files. They are resolved per chain name from:
//! 1. `<CHAIN>_RPC_URL` (e.g. `BASE_RPC_URL`, `POLYGON_RPC_URL`) - highest priority
//! 2. Provider API keys (ALCHEMY_API_KEY, INFURA_API_KEY) for the built-in chains
//! 3. Public RPC fallbacks for the built-in chains - for testing only
//!
//! # Examples
//!
//! ```bash
//! export BASE_RPC_URL="https://base-mainnet.g.alchemy.com/v2/YOUR_KEY"
//! export ALCHEMY_API_KEY="YOUR_KEY"
//! ```

use std::collections::HashMap;

/// RPC configuration keyed by lower-case chain name
#[derive(Debug, Clone, Default)]
pub struct RpcConfig {
    urls: HashMap<String, String>,
    /// Consult `<CHAIN>_RPC_URL` at resolve time
    read_env: bool,
}

/// Built-in chain names
pub mod chains {
    pub const BASE: &str = "base";
    pub const ETHEREUM: &str = "ethereum";
    pub const POLYGON: &str = "polygon";
}

/// Environment variable names
mod env_vars {
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const ALCHEMY_API_KEY: &str = "ALCHEMY_API_KEY";
    pub const INFURA_API_KEY: &str = "INFURA_API_KEY";
}

/// Public RPC endpoints (rate limited, for testing only)
mod public_rpcs {
    pub const ETHEREUM: &str = "https://eth.llamarpc.com";
    pub const BASE: &str = "https://mainnet.base.org";
    pub const POLYGON: &str = "https://polygon-rpc.com";
}

/// Environment variable consulted for a chain, e.g. `Base` -> `BASE_RPC_URL`.
pub fn env_var_for(chain: &str) -> String {
    let upper: String = chain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_RPC_URL", upper)
}

impl RpcConfig {
    /// Create RPC config from environment variables
    ///
    /// Priority:
    /// 1. `<CHAIN>_RPC_URL` (ETH_RPC_URL is accepted as an alias for Ethereum)
    /// 2. ALCHEMY_API_KEY - builds URLs for the built-in chains
    /// 3. INFURA_API_KEY - builds URLs for supported chains
    /// 4. Public RPC fallbacks (for testing only)
    pub fn from_env() -> Self {
        let mut urls = HashMap::new();

        for name in [chains::BASE, chains::ETHEREUM, chains::POLYGON] {
            let var = env_var_for(name);
            if let Ok(url) = std::env::var(&var) {
                tracing::debug!(chain = name, "Using {} for RPC", var);
                urls.insert(name.to_string(), url);
            }
        }
        if !urls.contains_key(chains::ETHEREUM) {
            if let Ok(url) = std::env::var(env_vars::ETH_RPC_URL) {
                tracing::debug!("Using ETH_RPC_URL for Ethereum");
                urls.insert(chains::ETHEREUM.to_string(), url);
            }
        }

        if urls.is_empty() {
            if let Ok(key) = std::env::var(env_vars::ALCHEMY_API_KEY) {
                tracing::info!("Building RPC URLs from ALCHEMY_API_KEY");
                urls.insert(
                    chains::ETHEREUM.to_string(),
                    format!("https://eth-mainnet.g.alchemy.com/v2/{}", key),
                );
                urls.insert(
                    chains::BASE.to_string(),
                    format!("https://base-mainnet.g.alchemy.com/v2/{}", key),
                );
                urls.insert(
                    chains::POLYGON.to_string(),
                    format!("https://polygon-mainnet.g.alchemy.com/v2/{}", key),
                );
            }
        }

        if urls.is_empty() {
            if let Ok(key) = std::env::var(env_vars::INFURA_API_KEY) {
                tracing::info!("Building RPC URLs from INFURA_API_KEY");
                urls.insert(
                    chains::ETHEREUM.to_string(),
                    format!("https://mainnet.infura.io/v3/{}", key),
                );
                urls.insert(
                    chains::POLYGON.to_string(),
                    format!("https://polygon-mainnet.infura.io/v3/{}", key),
                );
                // Infura has no Base endpoint; the public fallback covers it
            }
        }

        for (name, public) in [
            (chains::ETHEREUM, public_rpcs::ETHEREUM),
            (chains::BASE, public_rpcs::BASE),
            (chains::POLYGON, public_rpcs::POLYGON),
        ] {
            if !urls.contains_key(name) {
                tracing::warn!(chain = name, "No RPC configured, using public RPC (rate limited)");
                urls.insert(name.to_string(), public.to_string());
            }
        }

        Self {
            urls,
            read_env: true,
        }
    }

    /// Create with explicit RPC URLs; the environment is not consulted.
    pub fn with_urls<I, K, V>(urls: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            urls: urls
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
            read_env: false,
        }
    }

    /// Resolve the endpoint for a chain name.
    pub fn resolve(&self, chain: &str) -> Option<String> {
        if self.read_env {
            if let Ok(url) = std::env::var(env_var_for(chain)) {
                return Some(url);
            }
        }
        self.urls.get(&chain.to_lowercase()).cloned()
    }

    /// Remember an endpoint supplied at runtime (e.g. during `new chain`).
    pub fn insert(&mut self, chain: &str, url: impl Into<String>) {
        self.urls.insert(chain.to_lowercase(), url.into());
    }

    /// Check if a chain has an endpoint
    pub fn has_chain(&self, chain: &str) -> bool {
        self.resolve(chain).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_follow_chain_name() {
        assert_eq!(env_var_for("Base"), "BASE_RPC_URL");
        assert_eq!(env_var_for("arbitrum-one"), "ARBITRUM_ONE_RPC_URL");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let config = RpcConfig::with_urls([("Base", "https://custom.rpc")]);

        assert_eq!(config.resolve("base").as_deref(), Some("https://custom.rpc"));
        assert_eq!(config.resolve("BASE").as_deref(), Some("https://custom.rpc"));
        assert_eq!(config.resolve("polygon"), None);
    }

    #[test]
    fn test_runtime_insert() {
        let mut config = RpcConfig::with_urls(Vec::<(String, String)>::new());
        assert!(!config.has_chain("arbitrum"));
        config.insert("Arbitrum", "https://arb1.arbitrum.io/rpc");
        assert!(config.has_chain("arbitrum"));
    }

    #[test]
    fn test_builtin_chains_always_resolve() {
        let config = RpcConfig::from_env();

        assert!(config.has_chain(chains::ETHEREUM));
        assert!(config.has_chain(chains::BASE));
        assert!(config.has_chain(chains::POLYGON));
    }
}
