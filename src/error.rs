//! Error types for the swap engine

use alloy::primitives::TxHash;
use thiserror::Error;

/// Problems with the chain/token registry or with a user-supplied configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("token {token} is not deployed on {chain}")]
    TokenNotOnChain { token: String, chain: String },

    #[error("chain {0} is already registered")]
    DuplicateChain(String),

    #[error("chain id {chain_id} is already registered as {existing}")]
    DuplicateChainId { chain_id: u64, existing: String },

    #[error("chain {chain} is still referenced by token {token}")]
    ChainInUse { chain: String, token: String },

    #[error("chain id mismatch for {chain}: configured {expected}, endpoint reports {actual}")]
    ChainIdMismatch {
        chain: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("contract {address} on {chain} does not behave like an ERC-20 token: {reason}")]
    NotAToken {
        address: String,
        chain: String,
        reason: String,
    },

    #[error("no swap router configured for {0}")]
    NoRouter(String),

    #[error("router on {chain} reports factory {actual}, expected {expected}")]
    RouterMismatch {
        chain: String,
        expected: String,
        actual: String,
    },

    #[error("no RPC endpoint configured for {0}")]
    NoRpcUrl(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connectivity error on {chain}: {message}")]
    Connectivity { chain: String, message: String },

    #[error("RPC error on {chain}: {message}")]
    Rpc { chain: String, message: String },

    #[error("Broadcast rejected on {chain}: {message}")]
    Broadcast { chain: String, message: String },

    #[error("Insufficient {symbol} balance: need {required}, have {available}")]
    InsufficientBalance {
        symbol: String,
        required: String,
        available: String,
    },

    #[error("Approval transaction {hash} failed")]
    ApprovalFailure { hash: TxHash, receipt: String },

    #[error("Swap transaction {hash} failed")]
    SwapFailure { hash: TxHash, receipt: String },

    #[error("Transfer transaction {hash} failed")]
    TransferFailure { hash: TxHash, receipt: String },

    #[error("Timed out waiting for receipt of {hash}")]
    ReceiptTimeout { hash: TxHash },

    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("Invalid gas tier: {0} (expected low, medium or high)")]
    InvalidGasTier(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failure happened after something was broadcast.
    pub fn is_on_chain_failure(&self) -> bool {
        matches!(
            self,
            Error::ApprovalFailure { .. }
                | Error::SwapFailure { .. }
                | Error::TransferFailure { .. }
                | Error::ReceiptTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
