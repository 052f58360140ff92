//! Transaction engine
//!
//! Drives one request through
//! `Parsed -> Validated -> Quoted -> Previewed -> Confirmed | Cancelled ->
//! [Approving] -> Submitted -> Mined`.
//!
//! SECURITY NOTE:
//! - Nothing is signed before the confirmation gate says yes
//! - Nonce fetch through mined receipt runs inside the (wallet, chain) lane
//! - Every swap carries a slippage floor and a deadline

pub mod intent;
pub mod preview;
pub mod sequencer;

use crate::audit::{AuditEntry, AuditLog};
use crate::chain::contracts::{erc20_approve, erc20_transfer, SwapCall};
use crate::chain::{ChainClient, ConnectionManager, GasStrategy, ReceiptSummary, UnsignedTransaction};
use crate::config::ReceiptSettings;
use crate::gate::{ConfirmationGate, PromptField, RecipientDirectory, ValuePrompt};
use crate::pricing::{PriceOracle, PriceQuote, QuoteRequest, TradeSide};
use crate::registry::{Asset, ChainConfig, Registry};
use crate::units::{apply_bps, format_units};
use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, timeout};
use uuid::Uuid;

pub use intent::{Action, AmountSpec, Counterparty, TransactionIntent, ValidatedIntent};
pub use sequencer::NonceSequencer;

/// Allowed slippage: the swap reverts if it would return less than 99.5% of the quote
pub const SLIPPAGE_BPS: u64 = 50;
/// Swap deadline relative to submission
pub const DEADLINE_SECS: i64 = 300;

/// Gas limits used when `eth_estimateGas` fails
pub mod gas_limits {
    pub const NATIVE_TRANSFER: u64 = 21_000;
    pub const TOKEN_TRANSFER: u64 = 100_000;
    pub const APPROVE: u64 = 100_000;
    pub const SWAP: u64 = 250_000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    Parsed,
    Validated,
    Quoted,
    Previewed,
    Confirmed,
    Cancelled,
    Approving,
    Submitted,
    Mined,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Built,
    Signed,
    Broadcast,
    MinedSuccess,
    MinedFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPurpose {
    Approve,
    Swap,
    Transfer,
}

/// One transaction submitted by a flow
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    pub chain: String,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub purpose: TxPurpose,
    pub status: TxStatus,
}

/// Result of a successful flow
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub action: Action,
    pub chain: String,
    pub hash: TxHash,
    pub explorer_url: String,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Approval mined before the swap, if one was needed
    pub approval: Option<TxHash>,
    pub quote: Option<PriceQuote>,
    pub transactions: Vec<PendingTransaction>,
}

#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// Declined at the gate (with the preview shown) or abandoned while filling fields
    Cancelled { preview: Option<String> },
    Mined(Box<ExecutionReceipt>),
}

impl ExecutionOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionOutcome::Cancelled { .. })
    }
}

/// Address plus where it can receive funds
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveInfo {
    pub address: String,
    pub chains: Vec<ReceiveChain>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiveChain {
    pub name: String,
    pub chain_id: u64,
    pub native_symbol: String,
    pub explorer_url: String,
    /// (token name, symbol, contract)
    pub tokens: Vec<(String, String, Address)>,
}

impl fmt::Display for ReceiveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wallet address: {}", self.address)?;
        for chain in &self.chains {
            writeln!(
                f,
                "\n{} (chain id {}), native {}, explorer {}",
                chain.name, chain.chain_id, chain.native_symbol, chain.explorer_url
            )?;
            for (name, symbol, address) in &chain.tokens {
                writeln!(f, "  - {} ({}) at {:?}", name, symbol, address)?;
            }
        }
        Ok(())
    }
}

/// Everything the engine is wired to
pub struct EngineComponents {
    pub registry: Arc<Registry>,
    pub connections: Arc<ConnectionManager>,
    pub oracle: Arc<PriceOracle>,
    pub gas: Arc<GasStrategy>,
    pub wallet: Arc<SecureWallet>,
    pub gate: Arc<dyn ConfirmationGate>,
    pub prompt: Arc<dyn ValuePrompt>,
    pub recipients: Arc<dyn RecipientDirectory>,
    pub receipt: ReceiptSettings,
}

pub struct TransactionEngine {
    registry: Arc<Registry>,
    connections: Arc<ConnectionManager>,
    oracle: Arc<PriceOracle>,
    gas: Arc<GasStrategy>,
    wallet: Arc<SecureWallet>,
    gate: Arc<dyn ConfirmationGate>,
    prompt: Arc<dyn ValuePrompt>,
    recipients: Arc<dyn RecipientDirectory>,
    receipt: ReceiptSettings,
    sequencer: NonceSequencer,
    audit: Option<AuditLog>,
}

/// Amounts of a swap after quoting
struct SwapPlan {
    quote: PriceQuote,
    amount_in: U256,
    min_out: U256,
}

impl TransactionEngine {
    pub fn new(components: EngineComponents) -> Self {
        Self {
            registry: components.registry,
            connections: components.connections,
            oracle: components.oracle,
            gas: components.gas,
            wallet: components.wallet,
            gate: components.gate,
            prompt: components.prompt,
            recipients: components.recipients,
            receipt: components.receipt,
            sequencer: NonceSequencer::new(),
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn gas(&self) -> &Arc<GasStrategy> {
        &self.gas
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet.address()
    }

    /// Wallet address and the chains/tokens it can receive. Read-only, no RPC.
    pub async fn receive_info(&self) -> ReceiveInfo {
        let mut chains = Vec::new();
        for chain in self.registry.chains().await {
            let tokens = self
                .registry
                .tokens_on(&chain.name)
                .await
                .into_iter()
                .map(|(name, d)| (name, d.symbol, d.address))
                .collect();
            chains.push(ReceiveChain {
                name: chain.name,
                chain_id: chain.chain_id,
                native_symbol: chain.native_symbol,
                explorer_url: chain.explorer_url,
                tokens,
            });
        }
        ReceiveInfo {
            address: self.wallet.address_string(),
            chains,
        }
    }

    /// Run a request to a terminal state.
    ///
    /// `Ok(Cancelled)` means nothing was signed. Any `Err` that is not an on-chain
    /// failure was raised before the first broadcast.
    pub async fn execute(&self, intent: TransactionIntent) -> Result<ExecutionOutcome> {
        let flow_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(flow = %flow_id, state = %FlowState::Parsed, action = ?intent.action, "Transaction flow started");

        let result = self.run(flow_id, &intent).await;

        if let Err(Error::Connectivity { chain, .. }) = &result {
            self.connections.mark_unhealthy(chain).await;
        }
        match &result {
            Ok(ExecutionOutcome::Mined(receipt)) => tracing::info!(
                flow = %flow_id,
                state = %FlowState::Mined,
                tx_hash = %receipt.hash,
                explorer = %receipt.explorer_url,
                "Transaction flow finished"
            ),
            Ok(ExecutionOutcome::Cancelled { .. }) => {
                tracing::info!(flow = %flow_id, state = %FlowState::Cancelled, "Transaction flow cancelled")
            }
            Err(e) => tracing::warn!(flow = %flow_id, error = %e, "Transaction flow failed"),
        }

        self.audit(flow_id, &intent, &result, started).await;
        result
    }

    async fn run(&self, flow_id: Uuid, intent: &TransactionIntent) -> Result<ExecutionOutcome> {
        let Some(validated) = self.validate(intent).await? else {
            return Ok(ExecutionOutcome::Cancelled { preview: None });
        };
        tracing::info!(
            flow = %flow_id,
            state = %FlowState::Validated,
            chain = %validated.chain.name,
            token = %validated.token.symbol(),
            "Intent validated"
        );

        let client = self.connections.connect(&validated.chain).await?;

        match validated.action {
            Action::Buy | Action::Sell => self.run_swap(flow_id, &validated, client.as_ref()).await,
            Action::Transfer => self.run_transfer(flow_id, &validated, client.as_ref()).await,
        }
    }

    fn ask(&self, field: PromptField, options: Vec<String>) -> Option<String> {
        self.prompt
            .prompt(field, &options)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Fill missing fields through the prompt and resolve names against the registry.
    /// Touches no RPC endpoint and no key material. `None` means the prompt was abandoned.
    pub async fn validate(&self, intent: &TransactionIntent) -> Result<Option<ValidatedIntent>> {
        let Some(action) = intent.action else {
            return Err(Error::InvalidArgument("no action given".to_string()));
        };

        // Recipients resolve first so an unknown name fails before anything else
        let recipient = if action == Action::Transfer {
            let name = match &intent.recipient {
                Some(name) => name.trim().to_string(),
                None => match self.ask(PromptField::Recipient, Vec::new()) {
                    Some(name) => name,
                    None => return Ok(None),
                },
            };
            let address = self
                .recipients
                .resolve(&name)
                .ok_or_else(|| Error::UnknownRecipient(name.clone()))?;
            Some((name, address))
        } else {
            None
        };

        let chain_name = match &intent.chain {
            Some(chain) => chain.clone(),
            None => {
                let options = self.registry.chains().await.into_iter().map(|c| c.name).collect();
                match self.ask(PromptField::Chain, options) {
                    Some(chain) => chain,
                    None => return Ok(None),
                }
            }
        };
        let chain = self.registry.require_chain(&chain_name).await?;

        let token_name = match &intent.token {
            Some(token) => token.clone(),
            None => {
                let mut options: Vec<String> = self
                    .registry
                    .tokens_on(&chain.name)
                    .await
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect();
                if action == Action::Transfer {
                    options.insert(0, chain.native_symbol.clone());
                }
                match self.ask(PromptField::Token, options) {
                    Some(token) => token,
                    None => return Ok(None),
                }
            }
        };
        let token = self.registry.resolve_asset(&chain.name, &token_name).await?;

        let counterparty = match recipient {
            Some((name, address)) => Counterparty::Recipient { name, address },
            None => {
                let using_name = match &intent.using_token {
                    Some(using) => using.clone(),
                    None => {
                        let mut options = vec![chain.native_symbol.clone()];
                        options.extend(
                            self.registry
                                .tokens_on(&chain.name)
                                .await
                                .into_iter()
                                .filter(|(_, d)| Some(d.address) != token.address())
                                .map(|(name, _)| name),
                        );
                        if token.is_native() {
                            options.remove(0);
                        }
                        match self.ask(PromptField::UsingToken, options) {
                            Some(using) => using,
                            None => return Ok(None),
                        }
                    }
                };
                let using = self.registry.resolve_asset(&chain.name, &using_name).await?;
                if using == token {
                    return Err(Error::InvalidArgument(format!(
                        "cannot trade {} for itself",
                        token.symbol()
                    )));
                }
                Counterparty::Using(using)
            }
        };

        let amount = match &intent.amount {
            Some(amount) => amount.clone(),
            None => {
                let options = vec!["all".to_string(), "half".to_string()];
                match self.ask(PromptField::Amount, options) {
                    Some(text) => text.parse()?,
                    None => return Ok(None),
                }
            }
        };

        // A share of the balance always fixes the spent side
        let amount_is_target = if amount.is_relative() {
            action == Action::Buy
        } else {
            intent.amount_is_target && action != Action::Transfer
        };

        Ok(Some(ValidatedIntent {
            action,
            chain,
            token,
            counterparty,
            amount,
            amount_is_target,
        }))
    }

    async fn balance_of(&self, client: &dyn ChainClient, asset: &Asset) -> Result<U256> {
        let owner = self.wallet.address();
        match asset.address() {
            None => client.native_balance(owner).await,
            Some(token) => client.erc20_balance(token, owner).await,
        }
    }

    async fn ensure_balance(
        &self,
        client: &dyn ChainClient,
        asset: &Asset,
        required: U256,
        known: Option<U256>,
    ) -> Result<()> {
        let available = match known {
            Some(balance) => balance,
            None => self.balance_of(client, asset).await?,
        };
        if available < required {
            return Err(insufficient(asset.symbol(), asset.decimals(), required, available));
        }
        Ok(())
    }

    /// Native coin held back for the fee; zero unless `asset` is the native coin.
    ///
    /// Sized as the fallback limit plus the estimate margin at the current tier price.
    async fn fee_reserve(
        &self,
        client: &dyn ChainClient,
        asset: &Asset,
        fallback_gas: u64,
    ) -> Result<U256> {
        if !asset.is_native() {
            return Ok(U256::ZERO);
        }
        let gas_price = self.gas.current_price(client).await?;
        Ok(U256::from(with_margin(fallback_gas)) * U256::from(gas_price))
    }

    /// Base units of the intent amount plus the spent-asset balance if it was read.
    ///
    /// Shares of the balance are taken from what is left after `reserve`.
    async fn resolve_amount(
        &self,
        client: &dyn ChainClient,
        intent: &ValidatedIntent,
        reserve: U256,
    ) -> Result<(U256, Option<U256>)> {
        let asset = intent.amount_asset();
        let balance = if intent.amount.is_relative() {
            let spent = intent.spent_asset();
            let balance = self.balance_of(client, spent).await?;
            if balance <= reserve && !reserve.is_zero() {
                return Err(insufficient(spent.symbol(), spent.decimals(), reserve, balance));
            }
            Some(balance)
        } else {
            None
        };
        let spendable = balance.map(|b| b.saturating_sub(reserve));
        let amount = intent.amount.resolve(asset.decimals(), spendable)?;
        if amount.is_zero() {
            return Err(Error::InvalidArgument(format!(
                "amount resolves to zero {}",
                asset.symbol()
            )));
        }
        Ok((amount, balance))
    }

    async fn plan_swap(
        &self,
        client: &dyn ChainClient,
        intent: &ValidatedIntent,
        using: &Asset,
    ) -> Result<SwapPlan> {
        let reserve = self
            .fee_reserve(client, intent.spent_asset(), gas_limits::SWAP)
            .await?;
        let (amount, balance) = self.resolve_amount(client, intent, reserve).await?;
        let side = match intent.action {
            Action::Buy => TradeSide::Buy,
            _ => TradeSide::Sell,
        };

        let request = QuoteRequest {
            side,
            chain: intent.chain.clone(),
            token: intent.token.clone(),
            using: using.clone(),
            amount,
            amount_is_target: intent.amount_is_target,
        };
        let quote = self.oracle.quote(client, &request).await?;

        let amount_in = quote.input.raw;
        let min_out = apply_bps(quote.output.raw, 10_000 - SLIPPAGE_BPS);

        self.ensure_balance(
            client,
            request.input_asset(),
            amount_in.saturating_add(reserve),
            balance,
        )
        .await?;

        Ok(SwapPlan {
            quote,
            amount_in,
            min_out,
        })
    }

    async fn run_swap(
        &self,
        flow_id: Uuid,
        intent: &ValidatedIntent,
        client: &dyn ChainClient,
    ) -> Result<ExecutionOutcome> {
        let Counterparty::Using(using) = &intent.counterparty else {
            return Err(Error::InvalidArgument("swap without a counter asset".to_string()));
        };

        let plan = self.plan_swap(client, intent, using).await?;
        tracing::info!(flow = %flow_id, state = %FlowState::Quoted, "Swap quoted");

        let preview = preview::swap_preview(&plan.quote, plan.min_out, SLIPPAGE_BPS);
        tracing::info!(flow = %flow_id, state = %FlowState::Previewed, "Awaiting confirmation");
        if !self.gate.confirm(&preview) {
            return Ok(ExecutionOutcome::Cancelled {
                preview: Some(preview),
            });
        }
        tracing::info!(flow = %flow_id, state = %FlowState::Confirmed, "Swap confirmed");

        let input_asset = match intent.action {
            Action::Buy => using,
            _ => &intent.token,
        };
        let chain = &intent.chain;
        let router = plan.quote.route.router;
        let owner = self.wallet.address();
        let mut transactions = Vec::new();

        let _lane = self.sequencer.acquire(owner, chain.chain_id).await;

        let mut approval = None;
        if let Some(token) = input_asset.address() {
            let allowance = client.erc20_allowance(token, owner, router).await?;
            if allowance < plan.amount_in {
                tracing::info!(
                    flow = %flow_id,
                    state = %FlowState::Approving,
                    allowance = %allowance,
                    required = %plan.amount_in,
                    "Approving router"
                );
                let (tx, receipt) = self
                    .submit(
                        client,
                        chain,
                        TxPurpose::Approve,
                        token,
                        U256::ZERO,
                        erc20_approve(router, plan.amount_in),
                        gas_limits::APPROVE,
                    )
                    .await?;
                transactions.push(tx);
                if !receipt.success {
                    return Err(Error::ApprovalFailure {
                        hash: receipt.hash,
                        receipt: receipt.raw,
                    });
                }
                approval = Some(receipt.hash);
            }
        }

        let deadline = U256::from((Utc::now().timestamp() + DEADLINE_SECS).max(0) as u64);
        let path = plan.quote.route.path.clone();
        let call = match (input_asset.is_native(), plan.quote.output.address.is_none()) {
            (true, _) => SwapCall::ExactEthForTokens {
                amount_out_min: plan.min_out,
                path,
                to: owner,
                deadline,
            },
            (false, true) => SwapCall::ExactTokensForEth {
                amount_in: plan.amount_in,
                amount_out_min: plan.min_out,
                path,
                to: owner,
                deadline,
            },
            (false, false) => SwapCall::ExactTokensForTokens {
                amount_in: plan.amount_in,
                amount_out_min: plan.min_out,
                path,
                to: owner,
                deadline,
            },
        };
        let value = if input_asset.is_native() {
            plan.amount_in
        } else {
            U256::ZERO
        };

        tracing::info!(
            flow = %flow_id,
            state = %FlowState::Submitted,
            function = call.function_name(),
            min_out = %plan.min_out,
            "Submitting swap"
        );
        let (tx, receipt) = self
            .submit(
                client,
                chain,
                TxPurpose::Swap,
                router,
                value,
                call.encode(),
                gas_limits::SWAP,
            )
            .await?;
        transactions.push(tx);

        if !receipt.success {
            return Err(Error::SwapFailure {
                hash: receipt.hash,
                receipt: receipt.raw,
            });
        }

        Ok(ExecutionOutcome::Mined(Box::new(ExecutionReceipt {
            action: intent.action,
            chain: chain.name.clone(),
            hash: receipt.hash,
            explorer_url: chain.explorer_tx_url(receipt.hash),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            approval,
            quote: Some(plan.quote),
            transactions,
        })))
    }

    async fn run_transfer(
        &self,
        flow_id: Uuid,
        intent: &ValidatedIntent,
        client: &dyn ChainClient,
    ) -> Result<ExecutionOutcome> {
        let Counterparty::Recipient { name, address } = &intent.counterparty else {
            return Err(Error::InvalidArgument("transfer without a recipient".to_string()));
        };

        let reserve = self
            .fee_reserve(client, &intent.token, gas_limits::NATIVE_TRANSFER)
            .await?;
        let (amount, balance) = self.resolve_amount(client, intent, reserve).await?;
        self.ensure_balance(client, &intent.token, amount.saturating_add(reserve), balance)
            .await?;

        let preview = preview::transfer_preview(
            &intent.chain.name,
            &format_units(amount, intent.token.decimals()),
            intent.token.symbol(),
            name,
            *address,
        );
        tracing::info!(flow = %flow_id, state = %FlowState::Previewed, "Awaiting confirmation");
        if !self.gate.confirm(&preview) {
            return Ok(ExecutionOutcome::Cancelled {
                preview: Some(preview),
            });
        }
        tracing::info!(flow = %flow_id, state = %FlowState::Confirmed, "Transfer confirmed");

        let (to, value, input, fallback_gas) = match intent.token.address() {
            None => (*address, amount, Bytes::new(), gas_limits::NATIVE_TRANSFER),
            Some(token) => (
                token,
                U256::ZERO,
                erc20_transfer(*address, amount),
                gas_limits::TOKEN_TRANSFER,
            ),
        };

        let chain = &intent.chain;
        let _lane = self
            .sequencer
            .acquire(self.wallet.address(), chain.chain_id)
            .await;

        tracing::info!(flow = %flow_id, state = %FlowState::Submitted, "Submitting transfer");
        let (tx, receipt) = self
            .submit(client, chain, TxPurpose::Transfer, to, value, input, fallback_gas)
            .await?;

        if !receipt.success {
            return Err(Error::TransferFailure {
                hash: receipt.hash,
                receipt: receipt.raw,
            });
        }

        Ok(ExecutionOutcome::Mined(Box::new(ExecutionReceipt {
            action: Action::Transfer,
            chain: chain.name.clone(),
            hash: receipt.hash,
            explorer_url: chain.explorer_tx_url(receipt.hash),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            approval: None,
            quote: None,
            transactions: vec![tx],
        })))
    }

    /// Build, sign, broadcast and wait. The caller holds the lane.
    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        client: &dyn ChainClient,
        chain: &ChainConfig,
        purpose: TxPurpose,
        to: Address,
        value: U256,
        input: Bytes,
        fallback_gas: u64,
    ) -> Result<(PendingTransaction, ReceiptSummary)> {
        let owner = self.wallet.address();
        let nonce = client.pending_nonce(owner).await?;
        let gas_price = self.gas.current_price(client).await?;

        let mut unsigned = UnsignedTransaction {
            chain_id: chain.chain_id,
            nonce,
            to,
            value,
            input,
            gas_limit: fallback_gas,
            gas_price,
        };
        match client.estimate_gas(&unsigned.to_request(owner)).await {
            Ok(estimate) => unsigned.gas_limit = with_margin(estimate),
            Err(e) => tracing::warn!(
                chain = %chain.name,
                purpose = ?purpose,
                error = %e,
                fallback = fallback_gas,
                "Gas estimation failed, using fixed limit"
            ),
        }

        // Value plus fee must still be covered at the submitted gas price
        let required = value.saturating_add(U256::from(unsigned.gas_limit) * U256::from(gas_price));
        let available = client.native_balance(owner).await?;
        if available < required {
            return Err(insufficient(
                &chain.native_symbol,
                chain.native_decimals,
                required,
                available,
            ));
        }

        let mut pending = PendingTransaction {
            hash: TxHash::ZERO,
            chain: chain.name.clone(),
            nonce,
            gas_price,
            gas_limit: unsigned.gas_limit,
            purpose,
            status: TxStatus::Built,
        };

        let signed = self.wallet.sign_transaction(unsigned)?;
        pending.hash = signed.hash;
        pending.status = TxStatus::Signed;

        let hash = client.broadcast(&signed).await?;
        if hash != signed.hash {
            tracing::warn!(expected = %signed.hash, reported = %hash, "Node reported a different hash");
        }
        pending.status = TxStatus::Broadcast;
        tracing::info!(
            chain = %chain.name,
            tx_hash = %signed.hash,
            nonce,
            gas_price,
            gas_limit = pending.gas_limit,
            purpose = ?purpose,
            "Transaction broadcast"
        );

        let receipt = self.wait_for_receipt(client, signed.hash).await?;
        pending.status = if receipt.success {
            TxStatus::MinedSuccess
        } else {
            TxStatus::MinedFailed
        };
        tracing::info!(
            chain = %chain.name,
            tx_hash = %signed.hash,
            status = ?pending.status,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction mined"
        );

        Ok((pending, receipt))
    }

    /// Poll for the receipt, bounded by attempt count and overall timeout.
    async fn wait_for_receipt(&self, client: &dyn ChainClient, hash: TxHash) -> Result<ReceiptSummary> {
        let attempts = self.receipt.max_attempts();
        let poll = async {
            let mut ticker = interval(self.receipt.poll_interval());
            for attempt in 1..=attempts {
                ticker.tick().await;
                match client.receipt(hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => tracing::debug!(tx_hash = %hash, attempt, "Receipt not available yet"),
                    Err(e) => tracing::warn!(tx_hash = %hash, attempt, error = %e, "Receipt poll failed"),
                }
            }
            Err(Error::ReceiptTimeout { hash })
        };

        match timeout(self.receipt.timeout(), poll).await {
            Ok(result) => result,
            Err(_) => Err(Error::ReceiptTimeout { hash }),
        }
    }

    async fn audit(
        &self,
        flow_id: Uuid,
        intent: &TransactionIntent,
        result: &Result<ExecutionOutcome>,
        started: Instant,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };

        let (status, tx_hashes, error) = match result {
            Ok(ExecutionOutcome::Mined(receipt)) => (
                "mined",
                receipt
                    .transactions
                    .iter()
                    .map(|t| format!("{:?}", t.hash))
                    .collect(),
                None,
            ),
            Ok(ExecutionOutcome::Cancelled { .. }) => ("cancelled", Vec::new(), None),
            Err(e) => {
                let hashes = match e {
                    Error::ApprovalFailure { hash, .. }
                    | Error::SwapFailure { hash, .. }
                    | Error::TransferFailure { hash, .. }
                    | Error::ReceiptTimeout { hash } => vec![format!("{:?}", hash)],
                    _ => Vec::new(),
                };
                ("error", hashes, Some(e.to_string()))
            }
        };

        audit
            .record(AuditEntry {
                timestamp: Utc::now(),
                flow_id: flow_id.to_string(),
                action: intent.action.map(|a| a.to_string()),
                chain: intent.chain.clone(),
                intent: serde_json::to_value(intent).unwrap_or_default(),
                status,
                tx_hashes,
                error,
                duration_ms: started.elapsed().as_millis() as u64,
            })
            .await;
    }
}

/// Gas limit with the 20% estimate margin
fn with_margin(gas: u64) -> u64 {
    gas.saturating_mul(120) / 100
}

fn insufficient(symbol: &str, decimals: u8, required: U256, available: U256) -> Error {
    Error::InsufficientBalance {
        symbol: symbol.to_string(),
        required: format_units(required, decimals),
        available: format_units(available, decimals),
    }
}
