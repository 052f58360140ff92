//! On-chain access
//!
//! Everything the engine needs from a node goes through [`ChainClient`], one instance
//! per chain. The production implementation is [`rpc::RpcChainClient`]; tests plug in
//! an in-memory chain through the same trait.
//!
//! SECURITY NOTE:
//! - Clients only ever see signed raw transactions, never key material
//! - RPC URLs are not logged (they usually embed provider keys)

pub mod connections;
pub mod contracts;
pub mod gas;
pub mod rpc;

use crate::registry::ChainConfig;
use crate::Result;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub use connections::ConnectionManager;
pub use gas::{GasStrategy, GasTier};

/// Fields of a legacy (EIP-155) transaction before signing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub gas_price: u128,
}

impl UnsignedTransaction {
    /// Request used for `eth_estimateGas`.
    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(self.to)
            .value(self.value)
            .input(self.input.clone().into())
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub hash: TxHash,
    /// EIP-2718 encoded envelope
    pub raw: Bytes,
    pub tx: UnsignedTransaction,
}

/// The parts of a receipt the engine acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Full receipt as returned by the node (JSON)
    pub raw: String,
}

/// Read and broadcast access to one chain
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Registry name of the chain this client talks to
    fn chain_name(&self) -> &str;

    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn erc20_symbol(&self, token: Address) -> Result<String>;

    async fn erc20_decimals(&self, token: Address) -> Result<u8>;

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn erc20_allowance(&self, token: Address, owner: Address, spender: Address)
        -> Result<U256>;

    /// Router `getAmountsOut(amountIn, path)`
    async fn amounts_out(&self, router: Address, amount_in: U256, path: &[Address])
        -> Result<Vec<U256>>;

    /// Router `getAmountsIn(amountOut, path)`
    async fn amounts_in(&self, router: Address, amount_out: U256, path: &[Address])
        -> Result<Vec<U256>>;

    async fn router_factory(&self, router: Address) -> Result<Address>;

    async fn router_weth(&self, router: Address) -> Result<Address>;

    /// Nonce including pending transactions
    async fn pending_nonce(&self, owner: Address) -> Result<u64>;

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64>;

    /// Broadcast; a node rejection keeps the node's message verbatim.
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxHash>;

    /// `None` while the transaction is not yet mined.
    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>>;
}

/// Opens clients for chain configurations
#[async_trait]
pub trait ChainConnector: Send + Sync {
    async fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>>;
}
