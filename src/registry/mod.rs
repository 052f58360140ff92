//! Chain and token registry
//!
//! Both registries sit behind one async mutex. A mutation holds the lock across
//! validation, the on-chain probe and the durable write, so concurrent mutations are
//! serialized and the persisted files always match a complete in-memory state.

pub mod chains;
pub mod store;
pub mod tokens;

use crate::chain::ConnectionManager;
use crate::config::RpcConfig;
use crate::error::ConfigError;
use crate::{Error, Result};
use serde::Serialize;
use tokio::sync::Mutex;

pub use chains::{ChainConfig, DexConfig};
pub use store::RegistryStore;
pub use tokens::{parse_address, Asset, TokenConfig, TokenDeployment};

#[derive(Debug, Default)]
struct RegistryState {
    chains: Vec<ChainConfig>,
    tokens: Vec<TokenConfig>,
}

impl RegistryState {
    fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.matches(name))
    }

    fn token(&self, name: &str) -> Option<&TokenConfig> {
        self.tokens
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .or_else(|| self.tokens.iter().find(|t| t.matches(name, None)))
    }
}

/// Point-in-time copy of the registry
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub chains: Vec<ChainConfig>,
    pub tokens: Vec<TokenConfig>,
}

pub struct Registry {
    state: Mutex<RegistryState>,
    store: Option<RegistryStore>,
    rpc: RpcConfig,
}

impl Registry {
    /// Load persisted state, or seed and persist the built-in defaults.
    pub async fn load_or_seed(store: RegistryStore, rpc: RpcConfig) -> Result<Self> {
        let (chains, tokens) = match store.load().await? {
            Some(loaded) => {
                tracing::info!(
                    chains = loaded.0.len(),
                    tokens = loaded.1.len(),
                    "Loaded registry"
                );
                loaded
            }
            None => {
                let chains = chains::default_chains();
                let tokens = tokens::default_tokens();
                store.save(&chains, &tokens).await?;
                tracing::info!("Seeded registry with built-in chains and tokens");
                (chains, tokens)
            }
        };

        Ok(Self::build(chains, tokens, Some(store), rpc))
    }

    /// Registry that is never written to disk.
    pub fn in_memory(chains: Vec<ChainConfig>, tokens: Vec<TokenConfig>, rpc: RpcConfig) -> Self {
        Self::build(chains, tokens, None, rpc)
    }

    fn build(
        chains: Vec<ChainConfig>,
        tokens: Vec<TokenConfig>,
        store: Option<RegistryStore>,
        rpc: RpcConfig,
    ) -> Self {
        let mut state = RegistryState {
            chains,
            tokens: Vec::with_capacity(tokens.len()),
        };

        for mut token in tokens {
            token.deployments.retain(|chain, _| {
                let known = state.chain(chain).is_some();
                if !known {
                    tracing::warn!(
                        token = %token.name,
                        chain = %chain,
                        "Dropping token deployment on unknown chain"
                    );
                }
                known
            });
            if !token.deployments.is_empty() {
                state.tokens.push(token);
            }
        }

        Self {
            state: Mutex::new(state),
            store,
            rpc,
        }
    }

    fn with_endpoint(&self, mut chain: ChainConfig) -> ChainConfig {
        if chain.rpc_url.is_none() {
            chain.rpc_url = self.rpc.resolve(&chain.name);
        }
        chain
    }

    async fn persist(&self, state: &RegistryState) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&state.chains, &state.tokens).await,
            None => Ok(()),
        }
    }

    pub async fn chain(&self, name: &str) -> Option<ChainConfig> {
        let state = self.state.lock().await;
        state.chain(name).cloned().map(|c| self.with_endpoint(c))
    }

    /// Like [`Registry::chain`], failing with `UnknownChain`.
    pub async fn require_chain(&self, name: &str) -> Result<ChainConfig> {
        self.chain(name)
            .await
            .ok_or_else(|| ConfigError::UnknownChain(name.to_string()).into())
    }

    pub async fn chains(&self) -> Vec<ChainConfig> {
        let state = self.state.lock().await;
        state
            .chains
            .iter()
            .cloned()
            .map(|c| self.with_endpoint(c))
            .collect()
    }

    pub async fn token(&self, name: &str) -> Option<TokenConfig> {
        self.state.lock().await.token(name).cloned()
    }

    pub async fn tokens(&self) -> Vec<TokenConfig> {
        self.state.lock().await.tokens.clone()
    }

    /// Tokens deployed on `chain`, with their deployment there.
    pub async fn tokens_on(&self, chain: &str) -> Vec<(String, TokenDeployment)> {
        let state = self.state.lock().await;
        state
            .tokens
            .iter()
            .filter_map(|t| t.deployment_on(chain).map(|d| (t.name.clone(), d.clone())))
            .collect()
    }

    /// Resolve a token name/symbol (or the chain's native symbol) on a chain.
    pub async fn resolve_asset(&self, chain: &str, name: &str) -> Result<Asset> {
        let state = self.state.lock().await;
        let chain_cfg = state
            .chain(chain)
            .ok_or_else(|| ConfigError::UnknownChain(chain.to_string()))?;

        if chain_cfg.is_native_symbol(name) {
            return Ok(Asset::Native {
                symbol: chain_cfg.native_symbol.clone(),
                decimals: chain_cfg.native_decimals,
            });
        }

        let token = state
            .tokens
            .iter()
            .find(|t| t.matches(name, Some(&chain_cfg.name)))
            .or_else(|| state.token(name))
            .ok_or_else(|| ConfigError::UnknownToken(name.to_string()))?;

        let deployment =
            token
                .deployment_on(&chain_cfg.name)
                .ok_or_else(|| ConfigError::TokenNotOnChain {
                    token: token.name.clone(),
                    chain: chain_cfg.name.clone(),
                })?;

        Ok(Asset::Erc20 {
            name: token.name.clone(),
            symbol: deployment.symbol.clone(),
            address: deployment.address,
            decimals: deployment.decimals,
        })
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        let state = self.state.lock().await;
        RegistrySnapshot {
            chains: state.chains.clone(),
            tokens: state.tokens.clone(),
        }
    }

    /// Register a chain after a successful liveness probe of its endpoint.
    pub async fn register_chain(
        &self,
        chain: ChainConfig,
        connections: &ConnectionManager,
    ) -> Result<()> {
        let name = chain.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument("chain name is empty".to_string()));
        }

        let mut state = self.state.lock().await;

        if state.chain(&name).is_some() {
            return Err(ConfigError::DuplicateChain(name).into());
        }
        if let Some(existing) = state.chains.iter().find(|c| c.chain_id == chain.chain_id) {
            return Err(ConfigError::DuplicateChainId {
                chain_id: chain.chain_id,
                existing: existing.name.clone(),
            }
            .into());
        }

        let chain = ChainConfig { name, ..chain };
        connections.probe(&self.with_endpoint(chain.clone())).await?;

        state.chains.push(chain.clone());
        if let Err(e) = self.persist(&state).await {
            state.chains.pop();
            return Err(e);
        }

        tracing::info!(chain = %chain.name, chain_id = chain.chain_id, "Chain registered");
        Ok(())
    }

    /// Remove a chain that no token references.
    pub async fn remove_chain(&self, name: &str, connections: &ConnectionManager) -> Result<()> {
        let mut state = self.state.lock().await;

        let index = state
            .chains
            .iter()
            .position(|c| c.matches(name))
            .ok_or_else(|| ConfigError::UnknownChain(name.to_string()))?;

        if let Some(token) = state.tokens.iter().find(|t| t.is_on(name)) {
            return Err(ConfigError::ChainInUse {
                chain: state.chains[index].name.clone(),
                token: token.name.clone(),
            }
            .into());
        }

        let removed = state.chains.remove(index);
        if let Err(e) = self.persist(&state).await {
            state.chains.insert(index, removed);
            return Err(e);
        }
        connections.evict(&removed.name).await;

        tracing::info!(chain = %removed.name, "Chain removed");
        Ok(())
    }

    /// Register (or overwrite) a token's deployment on one chain after confirming the
    /// contract answers ERC-20 `symbol()` and `decimals()`.
    pub async fn register_token(
        &self,
        name: &str,
        chain: &str,
        address: &str,
        connections: &ConnectionManager,
    ) -> Result<TokenDeployment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("token name is empty".to_string()));
        }
        let address = parse_address(address)?;

        let mut state = self.state.lock().await;
        let chain_cfg = state
            .chain(chain)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownChain(chain.to_string()))?;
        if chain_cfg.is_native_symbol(name) {
            return Err(Error::InvalidArgument(format!(
                "{} is the native coin of {}",
                name, chain_cfg.name
            )));
        }

        let client = connections.connect(&self.with_endpoint(chain_cfg.clone())).await?;
        let not_a_token = |reason: String| ConfigError::NotAToken {
            address: format!("{:?}", address),
            chain: chain_cfg.name.clone(),
            reason,
        };
        let symbol = client.erc20_symbol(address).await.map_err(|e| match e {
            Error::Rpc { message, .. } => not_a_token(message).into(),
            other => other,
        })?;
        let decimals = client.erc20_decimals(address).await.map_err(|e| match e {
            Error::Rpc { message, .. } => not_a_token(message).into(),
            other => other,
        })?;

        let deployment = TokenDeployment {
            address,
            symbol,
            decimals,
        };

        let previous = state.tokens.clone();
        match state
            .tokens
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            Some(token) => {
                token
                    .deployments
                    .retain(|c, _| !c.eq_ignore_ascii_case(&chain_cfg.name));
                token
                    .deployments
                    .insert(chain_cfg.name.clone(), deployment.clone());
            }
            None => state.tokens.push(TokenConfig {
                name: name.to_string(),
                deployments: [(chain_cfg.name.clone(), deployment.clone())].into(),
            }),
        }

        if let Err(e) = self.persist(&state).await {
            state.tokens = previous;
            return Err(e);
        }

        tracing::info!(
            token = %name,
            chain = %chain_cfg.name,
            symbol = %deployment.symbol,
            decimals = deployment.decimals,
            "Token registered"
        );
        Ok(deployment)
    }

    /// Remove a token from every chain.
    pub async fn remove_token(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state
            .tokens
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ConfigError::UnknownToken(name.to_string()))?;

        let removed = state.tokens.remove(index);
        if let Err(e) = self.persist(&state).await {
            state.tokens.insert(index, removed);
            return Err(e);
        }

        tracing::info!(token = %removed.name, "Token removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::in_memory(
            chains::default_chains(),
            tokens::default_tokens(),
            RpcConfig::with_urls([("base", "http://localhost:8545")]),
        )
    }

    #[tokio::test]
    async fn resolves_native_and_tokens() {
        let registry = registry();

        let eth = registry.resolve_asset("base", "eth").await.unwrap();
        assert!(eth.is_native());
        assert_eq!(eth.decimals(), 18);

        let usdc = registry.resolve_asset("Polygon", "usdc").await.unwrap();
        assert_eq!(usdc.symbol(), "USDC");
        assert_eq!(usdc.decimals(), 6);

        let matic = registry.resolve_asset("polygon", "MATIC").await.unwrap();
        assert!(matic.is_native());
    }

    #[tokio::test]
    async fn token_not_on_chain() {
        let registry = registry();
        let err = registry.resolve_asset("Ethereum", "DEGEN").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::TokenNotOnChain { .. })
        ));
    }

    #[tokio::test]
    async fn chain_lookup_fills_endpoint() {
        let registry = registry();
        let base = registry.chain("BASE").await.unwrap();
        assert_eq!(base.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(registry.chain("ethereum").await.unwrap().rpc_url, None);
    }

    #[tokio::test]
    async fn deployments_on_unknown_chains_are_dropped() {
        let mut tokens = tokens::default_tokens();
        let stray = tokens[1].deployments["Base"].clone();
        tokens[1].deployments.insert("Fantom".to_string(), stray);
        let registry = Registry::in_memory(
            chains::default_chains(),
            tokens,
            RpcConfig::default(),
        );
        let usdc = registry.token("USDC").await.unwrap();
        assert!(!usdc.is_on("Fantom"));
        assert_eq!(usdc.deployments.len(), 3);
    }

    #[tokio::test]
    async fn remove_token_is_unconditional() {
        let registry = registry();
        registry.remove_token("degen").await.unwrap();
        assert!(registry.token("Degen").await.is_none());
        assert!(registry.remove_token("degen").await.is_err());
    }
}
