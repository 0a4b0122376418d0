//! Transfer CLI
//!
//! Runs the rendezvous relay and manages its settings file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use transfer_server::{RelayServer, ServerConfig};
use transfer_settings::{default_settings_path, expand_path, Settings};

/// Transfer - one-shot HTTP rendezvous relay
#[derive(Parser)]
#[command(name = "transfer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Listen address (host:port)
        #[arg(short, long)]
        listen: Option<String>,

        /// Seconds a new session waits for its first connection
        #[arg(long)]
        first_timeout: Option<u64>,

        /// Seconds a half-connected session waits for the other side
        #[arg(long)]
        second_timeout: Option<u64>,

        /// HTML file served at `/`
        #[arg(long)]
        landing_page: Option<PathBuf>,
    },

    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings as JSON
    Show,
    /// Write the default settings file if none exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    transfer_logging::init_logging(cli.verbose);

    let settings_path = cli
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_settings_path);

    match cli.command {
        Commands::Serve {
            listen,
            first_timeout,
            second_timeout,
            landing_page,
        } => {
            let mut settings = Settings::load_from(&settings_path)
                .with_context(|| format!("Failed to load {:?}", settings_path))?;
            if let Some(listen) = listen {
                settings.server.listen_addr = listen;
            }
            if let Some(secs) = first_timeout {
                settings.session.first_connection_timeout_secs = secs;
            }
            if let Some(secs) = second_timeout {
                settings.session.second_connection_timeout_secs = secs;
            }
            if let Some(page) = landing_page {
                settings.server.landing_page = Some(page);
            }
            serve(&settings).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&settings_path)?,
            ConfigAction::Init { force } => init_config(&settings_path, force)?,
        },
    }

    Ok(())
}

// ============================================================================
// Server
// ============================================================================

fn server_config(settings: &Settings) -> Result<ServerConfig> {
    let listen_addr = settings
        .server
        .socket_addr()
        .context("Invalid listen address")?;
    Ok(ServerConfig {
        listen_addr,
        landing_page: settings.server.landing_page.as_deref().map(expand_path),
        timeouts: settings.session.timeouts(),
    })
}

async fn serve(settings: &Settings) -> Result<()> {
    let config = server_config(settings)?;
    info!(
        "Session timeouts: first {}s, second {}s",
        config.timeouts.first_connection.as_secs(),
        config.timeouts.second_connection.as_secs()
    );

    let server = RelayServer::bind(config).await?;
    info!(
        "Relay running on {}. Press Ctrl+C to stop.",
        server.local_addr()?
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
        signal.cancel();
    });

    server.run(shutdown).await?;
    Ok(())
}

// ============================================================================
// Settings
// ============================================================================

fn show_config(path: &PathBuf) -> Result<()> {
    let settings = Settings::load_from(path)?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn init_config(path: &PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Settings already exist at {}", path.display());
        return Ok(());
    }
    Settings::default().save_to(path)?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use transfer_core::SessionTimeouts;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from([
            "transfer",
            "-v",
            "serve",
            "--listen",
            "127.0.0.1:9000",
            "--first-timeout",
            "5",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Serve {
                listen,
                first_timeout,
                second_timeout,
                ..
            } => {
                assert_eq!(listen.as_deref(), Some("127.0.0.1:9000"));
                assert_eq!(first_timeout, Some(5));
                assert_eq!(second_timeout, None);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_server_config_from_settings() {
        let mut settings = Settings::default();
        settings.server.listen_addr = "127.0.0.1:9000".to_string();
        settings.session.second_connection_timeout_secs = 10;

        let config = server_config(&settings).unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.timeouts, SessionTimeouts::from_secs(60, 10));
    }

    #[test]
    fn test_server_config_rejects_bad_address() {
        let mut settings = Settings::default();
        settings.server.listen_addr = "nowhere".to_string();
        assert!(server_config(&settings).is_err());
    }

    #[test]
    fn test_init_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        init_config(&path, false).unwrap();
        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.server.listen_addr, "0.0.0.0:8085");
    }
}
