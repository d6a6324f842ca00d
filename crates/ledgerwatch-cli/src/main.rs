//! ledgerwatch CLI
//!
//! Follows ledger closes and an account's balance over a single WebSocket
//! connection, and sends one-off requests through the same machinery.

mod display;

use clap::{Parser, Subcommand};
use ledgerwatch_client::{MonitorWorker, Notification, Request, WorkerConfig};
use ledgerwatch_config::{Config, ConfigError, DEFAULT_CONFIG_PATH};
use miette::{IntoDiagnostic, WrapErr};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledgerwatch")]
#[command(about = "Headless ledger and account monitor")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// WebSocket URL (overrides config setting)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Follow ledger closes and the watched account's balance
    Watch {
        /// Account to watch (overrides config setting)
        #[arg(short, long)]
        account: Option<String>,

        /// Do not subscribe to the ledger close stream
        #[arg(long)]
        no_ledger_stream: bool,
    },

    /// Send a JSON request and print the response
    Request {
        /// Request object, e.g. '{"command": "server_info"}'
        json: String,
    },

    /// Submit a signed transaction blob
    Submit {
        /// Hex-encoded signed transaction
        tx_blob: String,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let loaded = ledgerwatch_config::load_config(&cli.config);
    let log_level = loaded
        .as_ref()
        .map(|config| config.global.log_level)
        .unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter())),
        )
        .init();

    // wss:// connections need a process-wide rustls crypto provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    if let Commands::Validate = cli.command {
        return cmd_validate(&cli.config, loaded);
    }

    let mut config = loaded?;
    if let Some(url) = cli.url {
        config.connection.url = url;
    }

    match cli.command {
        Commands::Validate => Ok(()),
        Commands::Watch {
            account,
            no_ledger_stream,
        } => cmd_watch(config, account, no_ledger_stream),
        Commands::Request { json } => cmd_request(config, &json),
        Commands::Submit { tx_blob } => cmd_submit(config, tx_blob),
    }
}

fn cmd_validate(path: &str, loaded: Result<Config, ConfigError>) -> miette::Result<()> {
    let expanded = ledgerwatch_config::expand_path(path);
    println!("Validating configuration: {}", expanded.display());

    let config = loaded?;
    if !expanded.exists() {
        println!("No configuration file, defaults apply");
    }
    println!("Configuration is valid!");
    println!("  Log level: {}", config.global.log_level.as_filter());
    println!("  URL: {}", config.connection.url);
    println!(
        "  Receive timeout: {} ms",
        config.connection.receive_timeout.as_millis()
    );
    println!("  Command field: {}", config.connection.command_field.as_str());
    println!(
        "  Account: {}",
        config.monitor.account.as_deref().unwrap_or("<none>")
    );
    println!("  Ledger stream: {}", config.monitor.ledger_stream);
    Ok(())
}

fn cmd_watch(
    mut config: Config,
    account: Option<String>,
    no_ledger_stream: bool,
) -> miette::Result<()> {
    if let Some(account) = account {
        config.monitor.account = Some(account.trim().to_string());
    }
    if no_ledger_stream {
        config.monitor.ledger_stream = false;
    }
    if config.monitor.account.is_none() && !config.monitor.ledger_stream {
        return Err(miette::miette!(
            "Nothing to watch: no account is configured and the ledger stream is disabled"
        ));
    }

    println!("Connecting to {}", config.connection.url);
    let (worker, mut notifications) =
        MonitorWorker::spawn(WorkerConfig::from(&config)).into_diagnostic()?;

    while let Some(notification) = notifications.blocking_recv() {
        match notification {
            Notification::Ledger(ledger) => println!("{}", display::describe_ledger(&ledger)),
            Notification::AccountInfo(info) => println!("{}", display::describe_account(&info)),
            Notification::Response(response) => println!("{}", response),
            Notification::Stopped { reason } => {
                tracing::warn!("Monitor worker stopped: {}", reason);
                break;
            }
        }
    }

    match worker.join() {
        Ok(()) => Err(miette::miette!("Monitor worker exited unexpectedly")),
        Err(e) => Err(e).into_diagnostic().wrap_err("Monitor worker stopped"),
    }
}

fn cmd_request(config: Config, json: &str) -> miette::Result<()> {
    let value: serde_json::Value = serde_json::from_str(json)
        .into_diagnostic()
        .wrap_err("Request is not valid JSON")?;
    let request = Request::from_value(value).into_diagnostic()?;
    send_one(config, request)
}

fn cmd_submit(config: Config, tx_blob: String) -> miette::Result<()> {
    send_one(config, Request::new("submit").param("tx_blob", tx_blob))
}

/// Run a worker with no subscriptions, send one request and print the reply
fn send_one(mut config: Config, request: Request) -> miette::Result<()> {
    request.validate().into_diagnostic()?;

    config.monitor.account = None;
    config.monitor.ledger_stream = false;

    let (worker, mut notifications) =
        MonitorWorker::spawn(WorkerConfig::from(&config)).into_diagnostic()?;
    worker.request(request).into_diagnostic()?;

    while let Some(notification) = notifications.blocking_recv() {
        match notification {
            Notification::Response(response) => {
                let pretty = serde_json::to_string_pretty(&response).into_diagnostic()?;
                println!("{}", pretty);
                return Ok(());
            }
            Notification::Stopped { reason } => {
                return Err(miette::miette!("Request failed: {}", reason));
            }
            other => tracing::debug!(?other, "Ignoring notification"),
        }
    }

    Err(miette::miette!("Monitor worker exited without a response"))
}
