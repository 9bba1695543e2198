//! certsync - certificate renewal orchestration
//!
//! Runs as an AWS Lambda function by default. `invoke` replays a single event locally and
//! `validate` checks a configuration document offline.

mod commands;
mod settings;

use clap::{Parser, Subcommand};
use commands::{InvokeCommand, LambdaCommand, ValidateCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CERTSYNC_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full, json
    #[arg(
        long,
        default_value = "compact",
        env = "CERTSYNC_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve Lambda invocations (the default)
    Lambda(LambdaCommand),
    /// Run a single invocation from a JSON event
    Invoke(InvokeCommand),
    /// Check a configuration document without touching AWS
    Validate(ValidateCommand),
}

fn env_filter(log_level: &str) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    // RUST_LOG takes full control when set
    if std::env::var("RUST_LOG").is_ok() {
        return tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e));
    }

    Ok(tracing_subscriber::EnvFilter::new(format!(
        "certsync={level},\
         certsync_cli={level},\
         certsync_core={level},\
         certsync_storage={level},\
         certsync_issuer={level},\
         certsync_certstore={level},\
         certsync_notifications={level},\
         certsync_renewal={level},\
         lambda_runtime=warn,\
         aws_config=warn,\
         aws_smithy_runtime=warn,\
         hyper=warn,\
         rustls=warn",
        level = log_level
    )))
}

fn init_tracing(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    let filter = env_filter(log_level)?;

    let fmt_layer = match log_format {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed(),
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Some(Commands::Lambda(cmd)) => cmd.execute(),
        Some(Commands::Invoke(cmd)) => cmd.execute(),
        Some(Commands::Validate(cmd)) => cmd.execute(),
        None => LambdaCommand::from_env().execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_defaults_to_lambda() {
        let cli = Cli::try_parse_from(["certsync"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, "compact");
    }

    #[test]
    fn test_invoke_arguments() {
        let cli = Cli::try_parse_from([
            "certsync",
            "--log-level",
            "debug",
            "invoke",
            "--event",
            "event.json",
            "--bucket",
            "certs",
            "--topic-arn",
            "arn:aws:sns:eu-west-1:000000000000:certs",
            "--no-notify",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Some(Commands::Invoke(cmd)) => {
                assert_eq!(cmd.event, "event.json");
                assert!(cmd.no_notify);
                assert_eq!(cmd.settings.bucket.as_deref(), Some("certs"));
            }
            _ => panic!("expected invoke"),
        }
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["certsync", "validate"]).is_err());
    }
}
