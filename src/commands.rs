//! Command grammar
//!
//! ```text
//! buy <amount> <token> using <token> on <chain>
//! buy <token> using <amount> <token> on <chain>
//! sell <amount> <token> for <token> on <chain>
//! sell <token> for <amount> <token> on <chain>
//! send <chain> <token> <amount> to <recipient>
//! gas <low|medium|high>
//! receive
//! new chain | new token
//! forget chain <name> | forget token <name>
//! ```
//!
//! Keywords are case-insensitive. Omitted swap fields (`on <chain>`, the amount, the
//! counter token) are left empty and filled by the engine's prompt.

use crate::chain::GasTier;
use crate::engine::{
    Action, AmountSpec, ExecutionOutcome, ReceiveInfo, TransactionEngine, TransactionIntent,
};
use crate::gate::{PromptField, ValuePrompt};
use crate::registry::{parse_address, ChainConfig, DexConfig, TokenDeployment};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Transaction(TransactionIntent),
    /// Tier name as typed; validated when applied
    SetGas(String),
    Receive,
    NewChain,
    NewToken,
    ForgetChain(String),
    ForgetToken(String),
    Help,
}

pub const HELP: &str = "\
Commands:
  buy <amount> <token> using <token> on <chain>
  buy <token> using <amount> <token> on <chain>
  sell <amount> <token> for <token> on <chain>
  sell <token> for <amount> <token> on <chain>
  send <chain> <token> <amount> to <recipient>
  gas <low|medium|high>
  receive
  new chain | new token
  forget chain <name> | forget token <name>
Amounts: a decimal number, all, half or N%";

fn invalid(line: &str) -> Error {
    Error::InvalidArgument(format!("unrecognized command: {} (try `help`)", line))
}

fn position(words: &[&str], keyword: &str) -> Option<usize> {
    words.iter().position(|w| w.eq_ignore_ascii_case(keyword))
}

/// `[amount] <token>` with the amount optional.
fn amount_and_token(
    words: &[&str],
    line: &str,
) -> Result<(Option<AmountSpec>, Option<String>)> {
    match words {
        [] => Ok((None, None)),
        [token] => Ok((None, Some(token.to_string()))),
        [amount, token] => Ok((Some(amount.parse()?), Some(token.to_string()))),
        _ => Err(invalid(line)),
    }
}

fn parse_swap(action: Action, words: &[&str], line: &str) -> Result<TransactionIntent> {
    let keyword = match action {
        Action::Buy => "using",
        _ => "for",
    };

    let (rest, chain) = match position(words, "on") {
        Some(i) if i + 1 < words.len() => (&words[..i], Some(words[i + 1..].join(" "))),
        Some(_) => return Err(invalid(line)),
        None => (words, None),
    };
    let (head, tail) = match position(rest, keyword) {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &rest[rest.len()..]),
    };

    let (amount, token) = amount_and_token(head, line)?;
    let (target_amount, using_token) = amount_and_token(tail, line)?;
    if token.is_none() {
        return Err(invalid(line));
    }

    let (amount, amount_is_target) = match (amount, target_amount) {
        (Some(_), Some(_)) => {
            return Err(Error::InvalidArgument(format!(
                "give the amount on one side only: {}",
                line
            )))
        }
        (Some(amount), None) => (Some(amount), false),
        (None, Some(amount)) => (Some(amount), true),
        (None, None) => (None, false),
    };

    Ok(TransactionIntent {
        action: Some(action),
        amount,
        amount_is_target,
        token,
        using_token,
        recipient: None,
        chain,
    })
}

fn parse_send(words: &[&str], line: &str) -> Result<TransactionIntent> {
    let to = position(words, "to").ok_or_else(|| invalid(line))?;
    let recipient = words[to + 1..].join(" ");
    match &words[..to] {
        [chain, token, amount] if !recipient.is_empty() => Ok(TransactionIntent::transfer(
            chain,
            token,
            amount.parse()?,
            &recipient,
        )),
        _ => Err(invalid(line)),
    }
}

/// Parse one command line.
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((verb, args)) = words.split_first() else {
        return Err(invalid(line));
    };

    match verb.to_lowercase().as_str() {
        "buy" => parse_swap(Action::Buy, args, line).map(Command::Transaction),
        "sell" => parse_swap(Action::Sell, args, line).map(Command::Transaction),
        "send" => parse_send(args, line).map(Command::Transaction),
        "gas" => match args {
            [tier] => Ok(Command::SetGas(tier.to_string())),
            _ => Err(invalid(line)),
        },
        "receive" if args.is_empty() => Ok(Command::Receive),
        "help" => Ok(Command::Help),
        "new" => match args.iter().map(|a| a.to_lowercase()).collect::<Vec<_>>().as_slice() {
            [what] if what == "chain" => Ok(Command::NewChain),
            [what] if what == "token" => Ok(Command::NewToken),
            _ => Err(invalid(line)),
        },
        "forget" => match args.split_first() {
            Some((what, name)) if !name.is_empty() => {
                let name = name.join(" ");
                match what.to_lowercase().as_str() {
                    "chain" => Ok(Command::ForgetChain(name)),
                    "token" => Ok(Command::ForgetToken(name)),
                    _ => Err(invalid(line)),
                }
            }
            _ => Err(invalid(line)),
        },
        _ => Err(invalid(line)),
    }
}

/// What a dispatched command produced
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Transaction(ExecutionOutcome),
    GasTier(GasTier),
    Receive(ReceiveInfo),
    ChainAdded(String),
    TokenAdded {
        name: String,
        chain: String,
        deployment: TokenDeployment,
    },
    ChainRemoved(String),
    TokenRemoved(String),
    /// A registration prompt was abandoned
    Abandoned,
    Help,
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Transaction(ExecutionOutcome::Cancelled { .. }) => {
                f.write_str("Transaction cancelled. Nothing was signed.")
            }
            CommandOutput::Transaction(ExecutionOutcome::Mined(receipt)) => {
                if let Some(approval) = &receipt.approval {
                    writeln!(f, "Approval mined: {:?}", approval)?;
                }
                write!(
                    f,
                    "{} confirmed on {} in block {}\n{}",
                    receipt.action,
                    receipt.chain,
                    receipt
                        .block_number
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    receipt.explorer_url
                )
            }
            CommandOutput::GasTier(tier) => write!(f, "Gas tier set to {}", tier.as_str()),
            CommandOutput::Receive(info) => write!(f, "{}", info),
            CommandOutput::ChainAdded(name) => write!(f, "Chain {} added", name),
            CommandOutput::TokenAdded {
                name,
                chain,
                deployment,
            } => write!(
                f,
                "Token {} ({}, {} decimals) added on {} at {:?}",
                name, deployment.symbol, deployment.decimals, chain, deployment.address
            ),
            CommandOutput::ChainRemoved(name) => write!(f, "Chain {} removed", name),
            CommandOutput::TokenRemoved(name) => write!(f, "Token {} removed", name),
            CommandOutput::Abandoned => f.write_str("Abandoned"),
            CommandOutput::Help => f.write_str(HELP),
        }
    }
}

/// Routes parsed commands to the engine, the gas strategy and the registry
pub struct CommandDispatcher {
    engine: Arc<TransactionEngine>,
    prompt: Arc<dyn ValuePrompt>,
}

impl CommandDispatcher {
    pub fn new(engine: Arc<TransactionEngine>, prompt: Arc<dyn ValuePrompt>) -> Self {
        Self { engine, prompt }
    }

    /// Parse and run one line.
    pub async fn dispatch_line(&self, line: &str) -> Result<CommandOutput> {
        let command = parse_command(line)?;
        self.dispatch(command).await
    }

    pub async fn dispatch(&self, command: Command) -> Result<CommandOutput> {
        match command {
            Command::Transaction(intent) => {
                Ok(CommandOutput::Transaction(self.engine.execute(intent).await?))
            }
            Command::SetGas(tier) => {
                let tier = self.engine.gas().set_tier(&tier).await?;
                Ok(CommandOutput::GasTier(tier))
            }
            Command::Receive => Ok(CommandOutput::Receive(self.engine.receive_info().await)),
            Command::NewChain => self.new_chain().await,
            Command::NewToken => self.new_token().await,
            Command::ForgetChain(name) => {
                self.engine
                    .registry()
                    .remove_chain(&name, self.engine.connections())
                    .await?;
                Ok(CommandOutput::ChainRemoved(name))
            }
            Command::ForgetToken(name) => {
                self.engine.registry().remove_token(&name).await?;
                Ok(CommandOutput::TokenRemoved(name))
            }
            Command::Help => Ok(CommandOutput::Help),
        }
    }

    fn ask(&self, field: PromptField, options: &[String]) -> Option<String> {
        self.prompt
            .prompt(field, options)
            .map(|v| v.trim().to_string())
    }

    fn ask_required(&self, field: PromptField) -> Option<String> {
        self.ask(field, &[]).filter(|v| !v.is_empty())
    }

    async fn new_chain(&self) -> Result<CommandOutput> {
        let answers = (|| {
            Some((
                self.ask_required(PromptField::ChainName)?,
                self.ask_required(PromptField::ChainId)?,
                self.ask_required(PromptField::RpcUrl)?,
                self.ask_required(PromptField::NativeSymbol)?,
                self.ask_required(PromptField::ExplorerUrl)?,
                self.ask(PromptField::DexName, &[])?,
            ))
        })();
        let Some((name, chain_id, rpc_url, native_symbol, explorer_url, dex_name)) = answers else {
            return Ok(CommandOutput::Abandoned);
        };

        let chain_id: u64 = chain_id
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("invalid chain id: {}", chain_id)))?;
        url::Url::parse(&rpc_url)
            .map_err(|e| Error::InvalidArgument(format!("invalid RPC URL: {}", e)))?;

        let dex = if dex_name.is_empty() {
            None
        } else {
            let Some(router) = self.ask_required(PromptField::RouterAddress) else {
                return Ok(CommandOutput::Abandoned);
            };
            let Some(factory) = self.ask(PromptField::FactoryAddress, &[]) else {
                return Ok(CommandOutput::Abandoned);
            };
            Some(DexConfig {
                name: dex_name,
                router: parse_address(&router)?,
                factory: if factory.is_empty() {
                    None
                } else {
                    Some(parse_address(&factory)?)
                },
                weth: None,
            })
        };

        let chain = ChainConfig {
            name: name.clone(),
            chain_id,
            rpc_url: Some(rpc_url),
            native_symbol,
            native_decimals: 18,
            explorer_url,
            dex,
        };
        self.engine
            .registry()
            .register_chain(chain, self.engine.connections())
            .await?;
        Ok(CommandOutput::ChainAdded(name))
    }

    async fn new_token(&self) -> Result<CommandOutput> {
        let chains: Vec<String> = self
            .engine
            .registry()
            .chains()
            .await
            .into_iter()
            .map(|c| c.name)
            .collect();

        let answers = (|| {
            Some((
                self.ask_required(PromptField::TokenName)?,
                self.ask(PromptField::Chain, &chains).filter(|v| !v.is_empty())?,
                self.ask_required(PromptField::TokenAddress)?,
            ))
        })();
        let Some((name, chain, address)) = answers else {
            return Ok(CommandOutput::Abandoned);
        };

        let deployment = self
            .engine
            .registry()
            .register_token(&name, &chain, &address, self.engine.connections())
            .await?;
        Ok(CommandOutput::TokenAdded {
            name,
            chain,
            deployment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(line: &str) -> TransactionIntent {
        match parse_command(line).unwrap() {
            Command::Transaction(intent) => intent,
            other => panic!("expected a transaction, got {:?}", other),
        }
    }

    #[test]
    fn parses_buy_forms() {
        let buy = intent("buy 10 DEGEN using ETH on Base");
        assert_eq!(
            buy,
            TransactionIntent::buy(AmountSpec::Exact("10".to_string()), "DEGEN", "ETH", "Base")
        );

        let target = intent("Buy DEGEN using 0.05 ETH on base");
        assert!(target.amount_is_target);
        assert_eq!(target.amount, Some(AmountSpec::Exact("0.05".to_string())));
        assert_eq!(target.using_token.as_deref(), Some("ETH"));
        assert_eq!(target.chain.as_deref(), Some("base"));
    }

    #[test]
    fn parses_sell_forms() {
        let sell = intent("sell half DEGEN for ETH on Base");
        assert_eq!(sell.action, Some(Action::Sell));
        assert_eq!(sell.amount, Some(AmountSpec::Percent(50)));
        assert!(!sell.amount_is_target);

        let target = intent("sell DEGEN for 0.1 ETH on Base");
        assert!(target.amount_is_target);
    }

    #[test]
    fn missing_swap_fields_are_left_for_the_prompt() {
        let partial = intent("buy DEGEN");
        assert_eq!(partial.token.as_deref(), Some("DEGEN"));
        assert_eq!(partial.amount, None);
        assert_eq!(partial.using_token, None);
        assert_eq!(partial.chain, None);
    }

    #[test]
    fn rejects_amount_on_both_sides() {
        assert!(parse_command("buy 10 DEGEN using 1 ETH on Base").is_err());
        assert!(parse_command("buy using ETH on Base").is_err());
        assert!(parse_command("buy 10 DEGEN using ETH on").is_err());
    }

    #[test]
    fn parses_send_with_multi_word_recipient() {
        let send = intent("send Base ETH 0.1 to Ross Peili");
        assert_eq!(
            send,
            TransactionIntent::transfer("Base", "ETH", AmountSpec::Exact("0.1".to_string()), "Ross Peili")
        );
        assert!(parse_command("send Base ETH 0.1").is_err());
        assert!(parse_command("send Base ETH 0.1 to").is_err());
    }

    #[test]
    fn parses_admin_commands() {
        assert_eq!(parse_command("gas ultra").unwrap(), Command::SetGas("ultra".to_string()));
        assert_eq!(parse_command("receive").unwrap(), Command::Receive);
        assert_eq!(parse_command("NEW Chain").unwrap(), Command::NewChain);
        assert_eq!(parse_command("new token").unwrap(), Command::NewToken);
        assert_eq!(
            parse_command("forget chain Arbitrum One").unwrap(),
            Command::ForgetChain("Arbitrum One".to_string())
        );
        assert_eq!(
            parse_command("forget token Degen").unwrap(),
            Command::ForgetToken("Degen".to_string())
        );
        assert!(parse_command("forget wallet x").is_err());
        assert!(parse_command("").is_err());
        assert!(parse_command("moon DEGEN").is_err());
    }

    #[test]
    fn bad_amount_is_reported() {
        assert!(parse_command("buy lots DEGEN using ETH on Base").is_err());
    }
}
