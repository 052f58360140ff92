//! JSON-RPC client backed by an alloy HTTP provider.
//!
//! Every call is bounded by the configured timeout. Transport failures and timeouts
//! become `Error::Connectivity`; error responses from the node become `Error::Rpc`
//! (or `Error::Broadcast` for `eth_sendRawTransaction`) with the node's message intact.

use super::contracts::{IUniswapV2Router02, IERC20};
use super::{ChainClient, ChainConnector, ReceiptSummary, SignedTransaction};
use crate::config::RpcConfig;
use crate::error::ConfigError;
use crate::registry::ChainConfig;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Chain client over HTTP JSON-RPC
pub struct RpcChainClient {
    chain: String,
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainClient {
    pub fn new(chain: &str, rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url: url::Url = rpc_url.parse().map_err(|e| Error::Connectivity {
            chain: chain.to_string(),
            message: format!("invalid RPC URL: {}", e),
        })?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            chain: chain.to_string(),
            provider,
            timeout,
        })
    }

    fn map_err(&self, what: &str, err: RpcError<TransportErrorKind>) -> Error {
        match err {
            RpcError::ErrorResp(payload) => Error::Rpc {
                chain: self.chain.clone(),
                message: format!("{}: {}", what, payload.message),
            },
            other => Error::Connectivity {
                chain: self.chain.clone(),
                message: format!("{}: {}", what, other),
            },
        }
    }

    async fn bounded<F, T>(&self, what: &str, fut: F) -> Result<T>
    where
        F: IntoFuture<Output = std::result::Result<T, RpcError<TransportErrorKind>>>,
    {
        match timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.map_err(what, e)),
            Err(_) => Err(Error::Connectivity {
                chain: self.chain.clone(),
                message: format!("{} timed out after {:?}", what, self.timeout),
            }),
        }
    }

    /// `eth_call` a view function and decode its return value.
    async fn view<C>(&self, to: Address, call: C) -> Result<C::Return>
    where
        C: SolCall + Send + Sync,
        C::Return: Send,
    {
        let what = C::SIGNATURE;
        let request = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(call.abi_encode()).into());
        let output: Bytes = self.bounded(what, self.provider.call(request)).await?;

        C::abi_decode_returns(&output).map_err(|e| Error::Rpc {
            chain: self.chain.clone(),
            message: format!("{} returned undecodable data from {}: {}", what, to, e),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_name(&self) -> &str {
        &self.chain
    }

    async fn chain_id(&self) -> Result<u64> {
        self.bounded("eth_chainId", self.provider.get_chain_id())
            .await
    }

    async fn block_number(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn gas_price(&self) -> Result<u128> {
        self.bounded("eth_gasPrice", self.provider.get_gas_price())
            .await
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.bounded("eth_getBalance", self.provider.get_balance(owner))
            .await
    }

    async fn erc20_symbol(&self, token: Address) -> Result<String> {
        self.view(token, IERC20::symbolCall {}).await
    }

    async fn erc20_decimals(&self, token: Address) -> Result<u8> {
        self.view(token, IERC20::decimalsCall {}).await
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.view(token, IERC20::balanceOfCall { account: owner })
            .await
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        self.view(token, IERC20::allowanceCall { owner, spender })
            .await
    }

    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>> {
        self.view(
            router,
            IUniswapV2Router02::getAmountsOutCall {
                amountIn: amount_in,
                path: path.to_vec(),
            },
        )
        .await
    }

    async fn amounts_in(
        &self,
        router: Address,
        amount_out: U256,
        path: &[Address],
    ) -> Result<Vec<U256>> {
        self.view(
            router,
            IUniswapV2Router02::getAmountsInCall {
                amountOut: amount_out,
                path: path.to_vec(),
            },
        )
        .await
    }

    async fn router_factory(&self, router: Address) -> Result<Address> {
        self.view(router, IUniswapV2Router02::factoryCall {}).await
    }

    async fn router_weth(&self, router: Address) -> Result<Address> {
        self.view(router, IUniswapV2Router02::WETHCall {}).await
    }

    async fn pending_nonce(&self, owner: Address) -> Result<u64> {
        self.bounded(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(owner).pending(),
        )
        .await
    }

    async fn estimate_gas(&self, request: &TransactionRequest) -> Result<u64> {
        self.bounded("eth_estimateGas", self.provider.estimate_gas(request.clone()))
            .await
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxHash> {
        let sent = timeout(self.timeout, self.provider.send_raw_transaction(&tx.raw)).await;
        match sent {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(RpcError::ErrorResp(payload))) => Err(Error::Broadcast {
                chain: self.chain.clone(),
                message: payload.message.to_string(),
            }),
            Ok(Err(e)) => Err(self.map_err("eth_sendRawTransaction", e)),
            Err(_) => Err(Error::Connectivity {
                chain: self.chain.clone(),
                message: format!("eth_sendRawTransaction timed out after {:?}", self.timeout),
            }),
        }
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>> {
        let receipt = self
            .bounded(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(hash),
            )
            .await?;

        Ok(receipt.map(|r| ReceiptSummary {
            hash,
            success: r.status(),
            block_number: r.block_number,
            gas_used: r.gas_used,
            raw: serde_json::to_string(&r).unwrap_or_default(),
        }))
    }
}

/// Opens [`RpcChainClient`]s, resolving endpoints through [`RpcConfig`]
pub struct RpcConnector {
    rpc: RpcConfig,
    timeout: Duration,
}

impl RpcConnector {
    pub fn new(rpc: RpcConfig, timeout: Duration) -> Self {
        Self { rpc, timeout }
    }
}

#[async_trait]
impl ChainConnector for RpcConnector {
    async fn connect(&self, chain: &ChainConfig) -> Result<Arc<dyn ChainClient>> {
        let url = chain
            .rpc_url
            .clone()
            .or_else(|| self.rpc.resolve(&chain.name))
            .ok_or_else(|| ConfigError::NoRpcUrl(chain.name.clone()))?;

        tracing::debug!(chain = %chain.name, "Dialing RPC endpoint");
        Ok(Arc::new(RpcChainClient::new(&chain.name, &url, self.timeout)?))
    }
}
