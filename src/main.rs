//! Comfort Cloud - Panasonic Comfort Cloud command-line client

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use comfort_cloud::{
    ComfortCloudClient, Result,
    cli::{Cli, Command},
    config::Config,
    oauth::{Credentials, SessionState, Token, TokenStorage},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Load configuration (also loads env files)
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(ref path) = cli.token_file {
        config.token_file = Some(path.clone());
    }

    match cli.command {
        Command::Token => show_token(&config),
        ref command => {
            let Some(credentials) = credentials(&cli) else {
                eprintln!("❌ Missing credentials: set PANASONIC_USER and PANASONIC_PASSWORD");
                return ExitCode::FAILURE;
            };
            let client = match ComfortCloudClient::new(&config, credentials) {
                Ok(c) => c,
                Err(e) => {
                    error!("Failed to create client: {e}");
                    return ExitCode::FAILURE;
                }
            };
            run_command(&client, command).await
        }
    }
}

/// Credentials from flags, falling back to variables loaded from env files
fn credentials(cli: &Cli) -> Option<Credentials> {
    let username = cli
        .username
        .clone()
        .or_else(|| std::env::var("PANASONIC_USER").ok())
        .filter(|u| !u.is_empty())?;
    let password = cli
        .password
        .clone()
        .or_else(|| std::env::var("PANASONIC_PASSWORD").ok())
        .filter(|p| !p.is_empty())?;
    Some(Credentials::new(username, password))
}

async fn run_command(client: &ComfortCloudClient, command: &Command) -> ExitCode {
    match execute(client, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(client: &ComfortCloudClient, command: &Command) -> Result<()> {
    let freshness = client.login().await?;
    info!(?freshness, "Session ready");

    match command {
        Command::Login => {
            println!(
                "✅ Logged in, token saved to {}",
                client.storage().path().display()
            );
        }
        Command::Logout => {
            client.logout().await?;
            println!("✅ Logged out");
        }
        Command::Devices { format } => {
            let groups = client.fetch_groups_and_devices().await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else if groups.is_empty() {
                println!("No device groups found.");
            } else {
                for group in &groups {
                    println!("{} ({} device(s))", group.group_name, group.device_list.len());
                    for device in &group.device_list {
                        println!("   {}  {}", device.id(), device.device_name);
                    }
                }
            }
        }
        Command::Device { id } => {
            let (device, status) = client.get_device(id).await?;
            info!(device = %device.device_name, "Fetched device status");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Token => {}
    }
    Ok(())
}

/// Print the stored token's state without revealing it
fn show_token(config: &Config) -> ExitCode {
    let storage = match config.token_path() {
        Ok(path) => TokenStorage::new(path),
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    let Some(token) = storage.load() else {
        println!("No token stored at {}", storage.path().display());
        return ExitCode::SUCCESS;
    };

    println!("Token file: {}", storage.path().display());
    println!("State:      {:?}", SessionState::assess(Some(&token)));
    println!("{}", expiry_line(&token, Utc::now().timestamp()));
    println!(
        "Client id:  {}",
        if token.acc_client_id.is_empty() {
            "(none)"
        } else {
            &token.acc_client_id
        }
    );
    ExitCode::SUCCESS
}

fn expiry_line(token: &Token, now: i64) -> String {
    match token.claims() {
        Ok(claims) if claims.expires_at >= now => {
            format!("Expires in: {}s", claims.expires_at - now)
        }
        Ok(claims) => format!("Expired:    {}s ago", now - claims.expires_at),
        Err(_) => "Expiry:     unknown".to_string(),
    }
}
