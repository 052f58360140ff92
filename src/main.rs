//! Swap agent CLI
//!
//! Runs buy/sell/send commands against the configured EVM chains.

use clap::{Parser, Subcommand};
use multichain_swap_agent::audit::AuditLog;
use multichain_swap_agent::chain::rpc::RpcConnector;
use multichain_swap_agent::chain::{ConnectionManager, GasStrategy};
use multichain_swap_agent::console::{read_line, TerminalGate, TerminalPrompt};
use multichain_swap_agent::gate::{JsonRecipientDirectory, RecipientDirectory, ValuePrompt};
use multichain_swap_agent::pricing::{
    CoinGeckoFeed, PriceOracle, StaticPriceTable, UsdPriceFeed, UsdPricer,
};
use multichain_swap_agent::registry::{Registry, RegistryStore};
use multichain_swap_agent::wallet::SecureWallet;
use multichain_swap_agent::{
    CommandDispatcher, Config, EngineComponents, Result, RpcConfig, TransactionEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "swap-agent")]
#[command(about = "Multi-chain EVM token swap and transfer agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read commands from the terminal until `exit`
    Shell,

    /// Run a single command, e.g. `exec buy 10 DEGEN using ETH on Base`
    Exec {
        #[arg(required = true, trailing_var_arg = true)]
        words: Vec<String>,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let json_layer = cli
        .log_json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!cli.log_json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Exec { words } => {
            let dispatcher = build_dispatcher(&config).await?;
            let output = dispatcher.dispatch_line(&words.join(" ")).await?;
            println!("{}", output);
        }
        Commands::Shell => {
            let dispatcher = build_dispatcher(&config).await?;
            run_shell(&dispatcher).await;
        }
    }

    Ok(())
}

async fn build_dispatcher(config: &Config) -> Result<CommandDispatcher> {
    let rpc = RpcConfig::from_env();
    let connections = Arc::new(ConnectionManager::new(Arc::new(RpcConnector::new(
        rpc.clone(),
        config.rpc_timeout(),
    ))));
    let registry =
        Arc::new(Registry::load_or_seed(RegistryStore::new(&config.data_dir), rpc).await?);

    let feed: Option<Arc<dyn UsdPriceFeed>> = if config.price_feed.enabled {
        Some(Arc::new(CoinGeckoFeed::new(&config.price_feed)?))
    } else {
        None
    };
    let oracle = Arc::new(PriceOracle::new(UsdPricer::new(
        feed,
        StaticPriceTable::default(),
    )));

    let wallet = SecureWallet::from_env(&config.wallet_key_env)?;
    tracing::info!(address = %wallet.address_string(), "Loaded wallet");

    let recipients: Arc<dyn RecipientDirectory> = match &config.recipients_path {
        Some(path) => Arc::new(JsonRecipientDirectory::load(path)?),
        None => Arc::new(JsonRecipientDirectory::default()),
    };
    let prompt: Arc<dyn ValuePrompt> = Arc::new(TerminalPrompt);

    let mut engine = TransactionEngine::new(EngineComponents {
        registry,
        connections,
        oracle,
        gas: Arc::new(GasStrategy::new(config.gas_tier)),
        wallet: Arc::new(wallet),
        gate: Arc::new(TerminalGate),
        prompt: prompt.clone(),
        recipients,
        receipt: config.receipt.clone(),
    });
    if let Some(path) = &config.audit_log_path {
        engine = engine.with_audit_log(AuditLog::new(path));
    }

    Ok(CommandDispatcher::new(Arc::new(engine), prompt))
}

async fn run_shell(dispatcher: &CommandDispatcher) {
    println!("Type `help` for commands, `exit` to quit.");
    while let Some(line) = read_line("> ") {
        match line.as_str() {
            "" => continue,
            "exit" | "quit" => break,
            _ => {}
        }
        match dispatcher.dispatch_line(&line).await {
            Ok(output) => println!("{}", output),
            Err(e) => println!("Error: {}", e),
        }
    }
}
