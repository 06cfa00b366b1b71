mod config;

use clap::{Args, Parser, Subcommand};
use config::{CommonConfig, Config, ConfigError};
use metrics_exporter_statsd::StatsdBuilder;
use notifier::errors::RelayError;
use notifier::test_notification::{TestNotificationError, TestNotificationRequest};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notification-relay", about = "Relays chat notification requests to FCM")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the relay and admin listeners
    Serve(ConfigArgs),
    /// Send a test notification to a user, like `/testNotification`
    SendTest(SendTestArgs),
    /// Load and validate the config file, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, default_value = "config.yaml")]
    config_file_path: PathBuf,
}

#[derive(Args)]
struct SendTestArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long)]
    receiver_id: String,
    #[arg(long)]
    message: String,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("test notification failed: {0}")]
    TestNotification(#[from] TestNotificationError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("could not install metrics recorder: {0}")]
    Metrics(String),
    #[error("invalid sentry DSN: {0}")]
    Sentry(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Serve(args) => serve(&args.config_file_path),
        CliCommand::SendTest(args) => send_test(args),
        CliCommand::CheckConfig(args) => Config::from_file(&args.config_file_path)
            .map(|_| println!("{}: ok", args.config_file_path.display()))
            .map_err(CliError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(path: &Path) -> Result<(), CliError> {
    let config = Config::from_file(path)?;
    let _sentry = init_logging(&config.common)?;
    init_metrics(&config.common)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(notifier::run(config.relay))?;
    Ok(())
}

fn send_test(args: SendTestArgs) -> Result<(), CliError> {
    let config = Config::from_file(&args.config.config_file_path)?;
    let _sentry = init_logging(&config.common)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let message_id = runtime.block_on(async {
        let relay = notifier::Relay::from_config(&config.relay)?;
        let request = TestNotificationRequest {
            receiver_id: Some(args.receiver_id),
            message: Some(args.message),
        };
        Ok::<_, CliError>(relay.test_notifier.send(&request).await?)
    })?;

    println!("{message_id}");
    Ok(())
}

/// Installs the tracing subscriber, with the sentry layer when a DSN is configured.
fn init_logging(common: &CommonConfig) -> Result<Option<sentry::ClientInitGuard>, CliError> {
    let dsn = common
        .logging
        .as_ref()
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            dsn.parse::<sentry::types::Dsn>()
                .map_err(|e| CliError::Sentry(e.to_string()))
        })
        .transpose()?;

    let guard = dsn.map(|dsn| {
        sentry::init(sentry::ClientOptions {
            dsn: Some(dsn),
            release: sentry::release_name!(),
            ..Default::default()
        })
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .init();

    Ok(guard)
}

fn init_metrics(common: &CommonConfig) -> Result<(), CliError> {
    let Some(metrics) = &common.metrics else {
        return Ok(());
    };

    let recorder = StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
        .build(Some("notification_relay"))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(notifier::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %metrics.statsd_host,
        port = metrics.statsd_port,
        "Reporting metrics to statsd"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_send_test() {
        let cli = Cli::try_parse_from([
            "notification-relay",
            "send-test",
            "--config-file-path",
            "relay.yaml",
            "--receiver-id",
            "bob",
            "--message",
            "ping",
        ])
        .unwrap();

        let CliCommand::SendTest(args) = cli.command else {
            panic!("expected send-test");
        };
        assert_eq!(args.config.config_file_path, PathBuf::from("relay.yaml"));
        assert_eq!(args.receiver_id, "bob");
        assert_eq!(args.message, "ping");
    }

    #[test]
    fn config_path_defaults() {
        let cli = Cli::try_parse_from(["notification-relay", "serve"]).unwrap();
        let CliCommand::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.config_file_path, PathBuf::from("config.yaml"));

        assert!(Cli::try_parse_from(["notification-relay", "send-test"]).is_err());
    }
}
