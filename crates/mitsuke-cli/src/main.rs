mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use mitsuke_core::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{Cli, GlobalArgs};
use crate::commands::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.global);

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Cancelled) => ExitCode::from(130),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays parseable. The returned guard flushes
/// the file writer on drop.
fn init_logging(global: &GlobalArgs) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(global.default_log_filter()));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    if !global.log_file {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(AppConfig::log_dir(), "mitsuke.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}
