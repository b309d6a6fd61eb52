//! fleetd: the fleetgrid daemon.
//!
//! Single binary that assembles the fleet coordinator:
//! - State store (redb) holding the registry snapshot
//! - Worker registry + health evaluation
//! - Failover controller driving an optional local process
//! - Staleness sweeper and snapshot publisher
//! - REST API, worker WebSocket, Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! fleetd run --config /etc/fleetd.toml --port 8450 --data-dir /var/lib/fleetgrid
//! fleetd check-config --config /etc/fleetd.toml
//! ```

mod daemon;
mod executor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fleet_core::FleetConfig;

#[derive(Parser)]
#[command(name = "fleetd", about = "fleetgrid worker-fleet coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator.
    Run {
        /// Path to fleetd.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides `server.port`).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides `server.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Emit logs as JSON.
        #[arg(long)]
        log_json: bool,
    },
    /// Parse and validate a config file, then print it with defaults filled in.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            log_json,
        } => {
            init_tracing(log_json);
            let mut config = load_config(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            daemon::run(config).await
        }
        Command::CheckConfig { config } => {
            let config = load_config(Some(&config))?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleetd=debug,fleet=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<FleetConfig> {
    let config = match path {
        Some(path) => FleetConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("load {}: {e}", path.display()))?,
        None => FleetConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "fleetd", "run", "--config", "f.toml", "--port", "9000", "--log-json",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                config,
                port,
                data_dir,
                log_json,
            } => {
                assert_eq!(config, Some(PathBuf::from("f.toml")));
                assert_eq!(port, Some(9000));
                assert!(data_dir.is_none());
                assert!(log_json);
            }
            Command::CheckConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn check_config_requires_path() {
        assert!(Cli::try_parse_from(["fleetd", "check-config"]).is_err());
    }

    #[test]
    fn missing_config_without_upstreams_fails_validation() {
        assert!(load_config(None).is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetd.toml");
        std::fs::write(&path, include_str!("../fleetd.example.toml")).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.failover.upstreams.len(), 2);
        assert!(config.local_process.is_some());
    }
}
