//! Tandem API server
//!
//! Starts the HTTP server for buddy lists and mutual-buddy queries.

use anyhow::{bail, Context};
use std::env;
use std::process;
use tandem_api::{config::ServerConfig, session::SessionManager, start_server};
use tandem_domain::traits::Directory;
use tandem_domain::UserId;
use tandem_store::SqliteStore;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path = None;
    let mut issue_token_for = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(iter.next().context("--config needs a path")?),
            "--issue-token" => {
                issue_token_for = Some(iter.next().context("--issue-token needs a user id")?)
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            other => bail!("Unknown argument: {}", other),
        }
    }

    let config = match config_path {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path))?,
        None => {
            eprintln!("Warning: No config file specified, using default development configuration");
            eprintln!("Usage: tandem-api --config <path-to-config.toml>");
            eprintln!();
            ServerConfig::default_dev_config()
        }
    };

    if let Some(user_id) = issue_token_for {
        return issue_token(&config, user_id);
    }

    start_server(config).await?;

    Ok(())
}

/// Print a session token for an existing directory user
fn issue_token(config: &ServerConfig, user_id: &str) -> anyhow::Result<()> {
    let user_id = UserId::from_string(user_id).map_err(anyhow::Error::msg)?;
    let store = SqliteStore::open(&config.database_path)?;
    let user = store
        .user_by_id(user_id)?
        .with_context(|| format!("No user {} in {}", user_id, config.database_path))?;
    store.close()?;

    let manager = SessionManager::new(&config.jwt_secret, config.token_expiry_secs);
    println!("{}", manager.generate_token(&user)?);
    Ok(())
}

fn print_help() {
    println!("Tandem API - Buddy lists and mutual buddy queries");
    println!();
    println!("USAGE:");
    println!("    tandem-api --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>         Load configuration from TOML file");
    println!("    --issue-token <user>    Print a session token for a user and exit");
    println!("    --help                  Print this help message");
    println!();
    println!("CONFIGURATION:");
    println!("    The TOML config file should contain:");
    println!("    - bind_address: IP address to bind (e.g., '127.0.0.1')");
    println!("    - bind_port: Port number (e.g., 8080)");
    println!("    - database_path: SQLite database file (default: 'tandem.db')");
    println!("    - jwt_secret: Secret key for JWT token verification");
    println!("    - token_expiry_secs: Token expiry in seconds (default: 3600)");
    println!("    - request_timeout_secs: Per-request store deadline (default: 10)");
    println!("    - log_filter: Tracing filter when RUST_LOG is unset (default: 'info')");
    println!();
}
