use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::watch;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use otpgate::config::{LogFormat, Settings};
use otpgate::console::{Command, Console, USAGE};
use otpgate::login::{has_email_shape, LogMailer, LoginFlow};
use otpgate::otp::OtpEngine;
use otpgate::store::MemoryStore;

/// One-time passcode service for passwordless email login.
#[derive(Debug, Parser)]
#[command(name = "otpgate", version, about)]
struct Cli {
    /// YAML settings file; `OTPGATE__*` environment variables override it
    #[arg(short, long, env = "OTPGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format, overriding the settings file
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_ref())?;
    init_tracing(&settings, cli.log_format);

    info!("Starting otpgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        code_ttl_secs = settings.otp.code_ttl_secs,
        cooldown_secs = settings.otp.cooldown_secs,
        hourly_limit = settings.otp.hourly_limit,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(OtpEngine::new(store, settings.otp.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let janitor_task = if settings.janitor.enabled {
        let engine = engine.clone();
        let period = Duration::from_secs(settings.janitor.interval_secs);
        let mut rx = shutdown_rx;
        Some(tokio::spawn(async move {
            let clock = engine.clock().clone();
            engine
                .janitor()
                .run(clock.as_ref(), period, async move {
                    let _ = rx.wait_for(|stop| *stop).await;
                })
                .await;
        }))
    } else {
        warn!("Janitor disabled; expired passcodes will accumulate");
        None
    };

    let console = Console::new(LoginFlow::new(
        engine,
        Arc::new(LogMailer),
        has_email_shape,
        settings,
    ));

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut stdout = tokio::io::stdout();
    eprintln!("{}", USAGE);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            _ = &mut shutdown => break,
            line = lines.next() => line,
        };

        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                error!(error = %e, "Failed to read command");
                break;
            }
            None => {
                info!("Input closed");
                break;
            }
        };

        if matches!(Command::parse(&line), Some(Ok(Command::Quit))) {
            break;
        }

        if let Some(reply) = console.handle_line(&line).await {
            let mut out = reply.to_string();
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(task) = janitor_task {
        task.await?;
    }

    info!("otpgate stopped");
    Ok(())
}

fn init_tracing(settings: &Settings, format_override: Option<LogFormat>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format_override.unwrap_or(settings.logging.format) {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_arg_reads_env() {
        let cmd = Cli::command();
        let config = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(config.get_env(), Some(std::ffi::OsStr::new("OTPGATE_CONFIG")));

        let cli = Cli::try_parse_from(["otpgate", "--config", "otp.yaml", "--log-format", "json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("otp.yaml")));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}
