//! Shared fixtures for integration tests: an in-memory chain, scripted collaborators
//! and an engine wired to them.
#![allow(dead_code)]

use alloy::primitives::{address, Address, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use multichain_swap_agent::chain::{
    ChainClient, ChainConnector, ConnectionManager, GasStrategy, GasTier, ReceiptSummary,
    SignedTransaction,
};
use multichain_swap_agent::config::ReceiptSettings;
use multichain_swap_agent::gate::{ConfirmationGate, PromptField, ValuePrompt};
use multichain_swap_agent::pricing::{PriceOracle, UsdPricer};
use multichain_swap_agent::registry::chains::default_chains;
use multichain_swap_agent::registry::tokens::default_tokens;
use multichain_swap_agent::registry::{ChainConfig, Registry};
use multichain_swap_agent::wallet::SecureWallet;
use multichain_swap_agent::{
    CommandDispatcher, EngineComponents, Error, Result, RpcConfig, TransactionEngine,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// First anvil development account
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const TEST_ADDRESS: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

pub const WETH: Address = address!("4200000000000000000000000000000000000006");
pub const DEGEN: Address = address!("4ed4e862860bed51a9570b96d89af5e1b0efefed");
pub const USDC: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");
pub const ROSS: Address = address!("89a7f83db9c1919b89370182002ffe5dfffc03e2");

pub const GWEI: u128 = 1_000_000_000;

/// `n * 10^decimals`
pub fn units(n: u64, decimals: u8) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(decimals))
}

pub fn base_chain() -> ChainConfig {
    default_chains().remove(0)
}

#[derive(Debug, Default)]
pub struct MockState {
    pub native_balance: U256,
    pub balances: HashMap<Address, U256>,
    /// Allowance the wallet has granted the router, per token
    pub allowances: HashMap<Address, U256>,
    /// (symbol, decimals) of contracts that behave like ERC-20s
    pub tokens: HashMap<Address, (String, u8)>,
    /// Value of one base unit in a shared numeraire; swap amounts follow the ratio
    pub values: HashMap<Address, U256>,
    pub factory: Address,
    pub weth: Address,
    pub gas_price: u128,
    pub fail_estimate: bool,
    /// Status of successive mined transactions; success once exhausted
    pub outcomes: VecDeque<bool>,
    pub broadcasts: Vec<SignedTransaction>,
    pub receipts: HashMap<TxHash, ReceiptSummary>,
    pub estimates: Vec<TransactionRequest>,
    /// Nonce reads and receipt deliveries in the order they happened
    pub events: Vec<ChainEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEvent {
    NonceRead(u64),
    ReceiptDelivered,
}

/// In-memory EVM chain with a constant-price router
pub struct MockChain {
    pub name: String,
    pub chain_id: u64,
    pub state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(name: &str, chain_id: u64) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            state: Mutex::new(MockState {
                gas_price: GWEI,
                ..MockState::default()
            }),
        }
    }

    /// Base with the seeded router, 1 ETH, 1000 DEGEN and 100 USDC.
    ///
    /// Prices: 1 DEGEN = 0.005 ETH, 1 USDC = 0.0005 ETH.
    pub fn base() -> Self {
        let chain = Self::new("Base", 8453);
        let dex = base_chain().dex.unwrap();
        {
            let mut state = chain.state.lock().unwrap();
            state.factory = dex.factory.unwrap();
            state.weth = WETH;
            state.native_balance = units(1, 18);
            state.balances.insert(DEGEN, units(1_000, 18));
            state.balances.insert(USDC, units(100, 6));
            state.tokens.insert(DEGEN, ("DEGEN".to_string(), 18));
            state.tokens.insert(USDC, ("USDC".to_string(), 6));
            state.values.insert(WETH, U256::from(1_000u64));
            state.values.insert(DEGEN, U256::from(5u64));
            state.values.insert(USDC, U256::from(500_000_000_000u64));
        }
        chain
    }

    pub fn with<F: FnOnce(&mut MockState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.state.lock().unwrap().events.clone()
    }

    fn value_of(&self, token: &Address) -> Result<U256> {
        self.state
            .lock()
            .unwrap()
            .values
            .get(token)
            .copied()
            .ok_or_else(|| self.revert("no liquidity"))
    }

    fn revert(&self, message: &str) -> Error {
        Error::Rpc {
            chain: self.name.clone(),
            message: format!("execution reverted: {}", message),
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn chain_name(&self) -> &str {
        &self.name
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(100 + self.state.lock().unwrap().broadcasts.len() as u64)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().native_balance)
    }

    async fn erc20_symbol(&self, token: Address) -> Result<String> {
        let state = self.state.lock().unwrap();
        match state.tokens.get(&token) {
            Some((symbol, _)) => Ok(symbol.clone()),
            None => Err(self.revert("symbol()")),
        }
    }

    async fn erc20_decimals(&self, token: Address) -> Result<u8> {
        let state = self.state.lock().unwrap();
        match state.tokens.get(&token) {
            Some((_, decimals)) => Ok(*decimals),
            None => Err(self.revert("decimals()")),
        }
    }

    async fn erc20_balance(&self, token: Address, _owner: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn amounts_out(
        &self,
        _router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>> {
        let value_in = self.value_of(&path[0])?;
        let value_out = self.value_of(&path[path.len() - 1])?;
        Ok(vec![amount_in, amount_in * value_in / value_out])
    }

    async fn amounts_in(
        &self,
        _router: Address,
        amount_out: U256,
        path: &[Address],
    ) -> Result<Vec<U256>> {
        let value_in = self.value_of(&path[0])?;
        let value_out = self.value_of(&path[path.len() - 1])?;
        // Rounds up like the V2 library so the input always covers the output
        let amount_in = (amount_out * value_out + value_in - U256::from(1u8)) / value_in;
        Ok(vec![amount_in, amount_out])
    }

    async fn router_factory(&self, _router: Address) -> Result<Address> {
        Ok(self.state.lock().unwrap().factory)
    }

    async fn router_weth(&self, _router: Address) -> Result<Address> {
        Ok(self.state.lock().unwrap().weth)
    }

    async fn pending_nonce(&self, _owner: Address) -> Result<u64> {
        let nonce = {
            let mut state = self.state.lock().unwrap();
            let nonce = state.broadcasts.len() as u64;
            state.events.push(ChainEvent::NonceRead(nonce));
            nonce
        };
        // Give concurrent flows a chance to interleave before the broadcast
        tokio::task::yield_now().await;
        Ok(nonce)
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.estimates.push(request.clone());
        if state.fail_estimate {
            return Err(self.revert("estimate"));
        }
        let plain_transfer = request.input.input().map_or(true, |input| input.is_empty());
        Ok(if plain_transfer { 21_000 } else { 100_000 })
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        let success = state.outcomes.pop_front().unwrap_or(true);
        let block = 100 + state.broadcasts.len() as u64;
        state.receipts.insert(
            tx.hash,
            ReceiptSummary {
                hash: tx.hash,
                success,
                block_number: Some(block),
                gas_used: 50_000,
                raw: format!(
                    r#"{{"transactionHash":"{:?}","status":"{}"}}"#,
                    tx.hash,
                    if success { "0x1" } else { "0x0" }
                ),
            },
        );
        state.broadcasts.push(tx.clone());
        Ok(tx.hash)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        let receipt = state.receipts.get(&hash).cloned();
        if receipt.is_some() {
            state.events.push(ChainEvent::ReceiptDelivered);
        }
        Ok(receipt)
    }
}

/// Hands out registered mock chains and counts dials
#[derive(Default)]
pub struct MockConnector {
    chains: Mutex<HashMap<String, Arc<MockChain>>>,
    dials: AtomicUsize,
}

impl MockConnector {
    pub fn with_chain(chain: Arc<MockChain>) -> Self {
        let connector = Self::default();
        connector.add(chain);
        connector
    }

    pub fn add(&self, chain: Arc<MockChain>) {
        self.chains
            .lock()
            .unwrap()
            .insert(chain.name.to_lowercase(), chain);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    async fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let found = self
            .chains
            .lock()
            .unwrap()
            .get(&chain.name.to_lowercase())
            .cloned();
        match found {
            Some(mock) => Ok(mock as Arc<dyn ChainClient>),
            None => Err(Error::Connectivity {
                chain: chain.name.clone(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

/// Gate with a fixed answer that keeps every preview it was shown
pub struct ScriptedGate {
    answer: bool,
    pub previews: Mutex<Vec<String>>,
}

impl ScriptedGate {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            previews: Mutex::new(Vec::new()),
        }
    }

    pub fn previews(&self) -> Vec<String> {
        self.previews.lock().unwrap().clone()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, preview: &str) -> bool {
        self.previews.lock().unwrap().push(preview.to_string());
        self.answer
    }
}

/// Prompt that replays queued answers; abandons once they run out
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    pub asked: Mutex<Vec<PromptField>>,
}

impl ScriptedPrompt {
    pub fn new<I: IntoIterator<Item = &'static str>>(answers: I) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(String::from).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<PromptField> {
        self.asked.lock().unwrap().clone()
    }
}

impl ValuePrompt for ScriptedPrompt {
    fn prompt(&self, field: PromptField, _options: &[String]) -> Option<String> {
        self.asked.lock().unwrap().push(field);
        self.answers.lock().unwrap().pop_front()
    }
}

pub fn fast_receipts() -> ReceiptSettings {
    ReceiptSettings {
        timeout_secs: 2,
        poll_interval_ms: 5,
    }
}

/// Engine over the seeded registry and a single mock Base chain
pub struct Harness {
    pub chain: Arc<MockChain>,
    pub connector: Arc<MockConnector>,
    pub connections: Arc<ConnectionManager>,
    pub registry: Arc<Registry>,
    pub gas: Arc<GasStrategy>,
    pub gate: Arc<ScriptedGate>,
    pub prompt: Arc<ScriptedPrompt>,
    pub engine: Arc<TransactionEngine>,
}

impl Harness {
    pub fn new(confirm: bool) -> Self {
        Self::with_prompt(confirm, ScriptedPrompt::default())
    }

    pub fn with_prompt(confirm: bool, prompt: ScriptedPrompt) -> Self {
        let chain = Arc::new(MockChain::base());
        let connector = Arc::new(MockConnector::with_chain(chain.clone()));
        let connections = Arc::new(ConnectionManager::new(connector.clone()));
        let registry = Arc::new(Registry::in_memory(
            default_chains(),
            default_tokens(),
            RpcConfig::default(),
        ));
        let gas = Arc::new(GasStrategy::new(GasTier::Medium));
        let gate = Arc::new(ScriptedGate::new(confirm));
        let prompt = Arc::new(prompt);

        let recipients: HashMap<String, Address> =
            HashMap::from([("Ross".to_string(), ROSS)]);

        let engine = TransactionEngine::new(EngineComponents {
            registry: registry.clone(),
            connections: connections.clone(),
            oracle: Arc::new(PriceOracle::new(UsdPricer::offline())),
            gas: gas.clone(),
            wallet: Arc::new(SecureWallet::from_hex(TEST_KEY).unwrap()),
            gate: gate.clone(),
            prompt: prompt.clone(),
            recipients: Arc::new(recipients),
            receipt: fast_receipts(),
        });

        Self {
            chain,
            connector,
            connections,
            registry,
            gas,
            gate,
            prompt,
            engine: Arc::new(engine),
        }
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(self.engine.clone(), self.prompt.clone())
    }
}
