use anyhow::Context;
use clap::{Parser, Subcommand};
use forgeflow_core::cli::RepresentationFormat;
use forgeflow_core::conf::{load_config, lower_config};
use forgeflow_core::logging::init_logging;
use forgeflow_core::ControlPlane;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "forgeflow",
    version,
    about = "ForgeFlow: resilience control plane"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the control plane until interrupted
    Run {
        /// Path to the ForgeFlow config file
        #[arg(long, default_value = "forgeflow.hcl")]
        config: PathBuf,
    },

    /// Validate configuration and exit
    Check {
        /// Path to the ForgeFlow config file
        #[arg(long, default_value = "forgeflow.hcl")]
        config: PathBuf,

        /// Plain output without colors
        #[arg(short, long)]
        plain: bool,
    },

    /// Print the effective configuration as JSON
    Dump {
        /// Path to the ForgeFlow config file
        #[arg(long, default_value = "forgeflow.hcl")]
        config: PathBuf,

        /// What to print: "config" or "levels"
        #[arg(long, default_value = "config")]
        repr: RepresentationFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { config, plain } => forgeflow_core::cli::check(&config, plain),
        Command::Dump { config, repr } => forgeflow_core::cli::dump(&config, repr),
        Command::Run { config } => run(&config).await,
    }
}

async fn run(path: &Path) -> anyhow::Result<()> {
    let cfg = load_config(path)
        .with_context(|| format!("failed to load ForgeFlow config from {}", path.display()))?;
    let _log_guard = init_logging(&cfg.logging);

    let params = lower_config(&cfg)?;
    let plane = ControlPlane::builder()
        .params(params)
        .breaker_health(true)
        .build()
        .context("failed to build control plane")?;

    let relayed = forgeflow_core::cli::serve_until(&plane, tokio::signal::ctrl_c()).await;
    info!(relayed, "control plane stopped");
    Ok(())
}
