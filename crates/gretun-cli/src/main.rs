//! gretun CLI
//!
//! Interactive console frontend for the tunnel provisioning engine. Each
//! line of input is one conversational turn; `/back` and `/home` map to the
//! step-back and abandon controls available at every stage.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gretun_core::config::{self, AppConfig};
use gretun_core::types::OwnerId;
use gretun_engine::{Engine, Input, Reply, TunnelStore};
use gretun_remote::SshExecutor;

#[derive(Parser)]
#[command(name = "gretun")]
#[command(author, version, about = "Provisions GRE-over-IPv6 tunnels secured with IPsec")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Operator identity, used for access control and tunnel ownership
    #[arg(short, long, env = "GRETUN_OPERATOR")]
    operator: i64,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = load_configuration(cli.config.as_deref())?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let store = TunnelStore::open(&config.db_path)
        .with_context(|| format!("Failed to open tunnel store at {:?}", config.db_path))?;

    let executor = Arc::new(SshExecutor::new(
        config.connect_timeout(),
        config.command_timeout(),
    ));

    let operator = OwnerId(cli.operator);
    let engine = Engine::new(config, store, executor);

    run_console(&engine, operator).await
}

fn load_configuration(path: Option<&std::path::Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            AppConfig::default()
        }))
    } else {
        tracing::info!("Using default configuration");
        Ok(AppConfig::default())
    }
}

/// Read turns from stdin until EOF, printing each reply
async fn run_console(engine: &Engine, operator: OwnerId) -> Result<()> {
    let session_id = format!("console-{}", operator);

    println!("gretun interactive console. /back steps back, /home returns to the menu, Ctrl-D exits.");
    print_reply(
        &engine
            .handle_turn(&session_id, operator, Input::Home)
            .await?,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let input = match line {
            "/back" => Input::StepBack,
            "/home" => Input::Home,
            text => Input::Text(text.to_string()),
        };

        let reply = engine.handle_turn(&session_id, operator, input).await?;
        print_reply(&reply);
    }

    Ok(())
}

fn print_reply(reply: &Reply) {
    println!();
    println!("{}", reply.text);
    if !reply.options.is_empty() {
        println!("  [{}]", reply.options.join(" | "));
    }
}
