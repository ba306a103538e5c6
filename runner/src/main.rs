use anyhow::{Context, Result};
use payslip_core::AppConfig;
use payslip_runner::{init_tracing, RunContext, RunSummary};
use std::process::ExitCode;
use tracing::{error, info};

async fn run() -> Result<RunSummary> {
    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    config
        .ensure_directories()
        .context("failed to create application directories")?;
    init_tracing(&config)?;

    info!("Starting payslip run v{}", env!("CARGO_PKG_VERSION"));

    let ctx = RunContext::from_config(config)?;
    ctx.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(summary) if summary.has_failures() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing::dispatcher::has_been_set() {
                error!("{:#}", e);
            } else {
                eprintln!("payslip-run: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}
