//! `gatevisor` command line.
//!
//! ## Commands
//!
//! - `up`: load a manifest and bring every service up in dependency order
//! - `check`: validate a manifest and print the start order
//!
//! ## Exit codes
//!
//! | code | meaning              |
//! |------|----------------------|
//! | 0    | success              |
//! | 2    | invalid spec         |
//! | 3    | dependency unhealthy |
//! | 4    | service failed       |
//! | 5    | start failed         |
//! | 6    | multiple failures    |
//! | 130  | cancelled            |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};

use gatevisor::manifest::parse_duration;
use gatevisor::{load_registry, telemetry, DeploymentError, LogWriter, Subscribe, Supervisor, SupervisorConfig};

#[derive(Parser)]
#[command(name = "gatevisor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Start services in dependency order, gated on readiness probes", long_about = None)]
struct Cli {
    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring every service of a manifest up; stops waiting on SIGINT/SIGTERM
    Up {
        /// Path to the YAML manifest
        manifest: PathBuf,

        /// Services brought up at the same time (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        max_concurrent: usize,

        /// Bound on each start directive, e.g. 30s (0 = none)
        #[arg(long, value_parser = parse_duration)]
        start_timeout: Option<Duration>,
    },

    /// Validate a manifest and print the start order
    Check {
        /// Path to the YAML manifest
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, cli.log_level);

    match cli.command {
        Commands::Check { manifest } => match load_registry(&manifest) {
            Ok(registry) => {
                for name in registry.order() {
                    println!("{name}");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(label = e.as_label(), error = %e, "invalid manifest");
                ExitCode::from(2)
            }
        },
        Commands::Up {
            manifest,
            max_concurrent,
            start_timeout,
        } => {
            let registry = match load_registry(&manifest) {
                Ok(registry) => Arc::new(registry),
                Err(e) => {
                    error!(label = e.as_label(), error = %e, "invalid manifest");
                    return ExitCode::from(2);
                }
            };
            info!(services = registry.len(), manifest = %manifest.display(), "manifest loaded");

            let cfg = SupervisorConfig {
                max_concurrent,
                start_timeout: start_timeout.unwrap_or(Duration::ZERO),
                ..SupervisorConfig::default()
            };
            let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
            let sup = Supervisor::builder(cfg).with_subscribers(subscribers).build();

            let res = sup.run_until_signal(registry).await;
            sup.close().await;

            match res {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(label = e.as_label(), error = %e, "deployment failed");
                    ExitCode::from(exit_code(&e))
                }
            }
        }
    }
}

fn exit_code(err: &DeploymentError) -> u8 {
    match err {
        DeploymentError::InvalidSpec(_) => 2,
        DeploymentError::DependencyUnhealthy { .. } => 3,
        DeploymentError::ServiceFailed { .. } => 4,
        DeploymentError::StartFailed { .. } => 5,
        DeploymentError::Multiple(_) => 6,
        DeploymentError::Cancelled => 130,
        _ => 1,
    }
}
