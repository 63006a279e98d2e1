//! carrier-agent - host telemetry agent
//!
//! # Usage
//!
//! ```bash
//! # Run the agent (default)
//! carrier-agent
//! carrier-agent --config configs/agent.toml
//!
//! # Validate a configuration file and exit
//! carrier-agent check --config configs/agent.toml
//! ```

mod serve;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for configuration problems.
const EXIT_BAD_CONFIG: u8 = 1;

/// Exit code for an unusable ingress listener.
const EXIT_BAD_LISTENER: u8 = 2;

/// carrier-agent - host telemetry agent
#[derive(Parser, Debug)]
#[command(name = "carrier-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "configs/agent.toml", global = true)]
    config: std::path::PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent (default when no subcommand is given)
    Serve,

    /// Validate the configuration file and exit
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match carrier_config::Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("carrier-agent: {e}");
            return ExitCode::from(EXIT_BAD_CONFIG);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    if let Err(e) = init_logging(level) {
        eprintln!("carrier-agent: {e}");
        return ExitCode::from(EXIT_BAD_CONFIG);
    }

    match cli.command {
        Some(Command::Check) => {
            println!("configuration ok: {}", cli.config.display());
            ExitCode::SUCCESS
        }
        Some(Command::Serve) | None => match serve::run(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(serve::ServeError::Listener(e)) => {
                tracing::error!(error = %e, "ingress listener unusable");
                ExitCode::from(EXIT_BAD_LISTENER)
            }
            Err(serve::ServeError::Startup(e)) => {
                tracing::error!(error = %e, "fatal startup error");
                ExitCode::from(EXIT_BAD_CONFIG)
            }
        },
    }
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {e}"))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
