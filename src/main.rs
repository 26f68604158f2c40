use std::process::ExitCode;

use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;

use xml_to_csv::error::{ConvertError, Result};
use xml_to_csv::{Cli, Output, PlatformPolicy, RunConfig, RunOutcome, pipeline, platform};

const DEFAULT_LOG_FILTER: &str = "xml_to_csv=warn";

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {:#}", e);
    }

    let policy = platform::detect();
    let output = Output::new();

    let code = match execute(&cli, policy.as_ref()) {
        Ok(outcome) => {
            print!("{}", output.format_outcome(&outcome));
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "run failed");
            println!("{}", output.format_error(&e));
            ExitCode::from(e.exit_code())
        }
    };

    policy.before_exit();
    code
}

fn execute(cli: &Cli, policy: &dyn PlatformPolicy) -> Result<RunOutcome> {
    let config = RunConfig::load(cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| ConvertError::Concurrency {
            details: format!("Failed to start runtime: {}", e),
        })?;

    let result = runtime.block_on(pipeline::run(&config, policy));

    // Extractions still running after the deadline are not waited for.
    runtime.shutdown_background();
    result
}

fn init_tracing() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to initialise logging")
}
