mod cli;
mod commands;
mod context;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use workboard_common::WorkboardError;

use crate::cli::Args;
use crate::context::Context;

fn init_tracing(override_level: Option<&str>, config_level: &str) {
    let filter = match override_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("workboard={config_level}").into()),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(args: &Args) -> Result<workboard_config::WorkboardConfig, WorkboardError> {
    let mut config = workboard_config::load_config(args.config.as_deref())?;
    if let Some(origin) = &args.origin {
        config.api.origin = origin.clone();
        workboard_config::validation::validate(&config)?;
    }
    Ok(config)
}

async fn run(args: Args) -> Result<(), WorkboardError> {
    let config = load(&args)?;
    init_tracing(args.log_level.as_deref(), config.logging.level.as_str());
    tracing::debug!(origin = %config.api.origin, "workboard starting");

    let ctx = Context::new(config)?;
    commands::dispatch(&ctx, args.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
