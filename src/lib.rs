//! Multi-chain swap agent
//!
//! Buys, sells and sends tokens on EVM chains through Uniswap-V2-style routers:
//! - Chain and token registries persisted as JSON, editable at runtime
//! - On-chain quotes with USD estimates and a slippage floor
//! - Every transaction previewed and explicitly confirmed before signing
//!
//! # Security Model
//!
//! - The private key is read once from the environment and never leaves `wallet`
//! - RPC URLs may embed API keys and are never persisted or logged
//! - Submissions per (wallet, chain) are serialized so nonces cannot collide
//! - Every flow is appended to a JSONL audit trail

pub mod audit;
pub mod chain;
pub mod commands;
pub mod config;
pub mod console;
pub mod engine;
pub mod gate;
pub mod pricing;
pub mod registry;
pub mod units;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use commands::{parse_command, Command, CommandDispatcher, CommandOutput};
pub use config::{Config, RpcConfig};
pub use engine::{EngineComponents, ExecutionOutcome, TransactionEngine, TransactionIntent};
pub use error::{ConfigError, Error, Result};
pub use registry::Registry;
