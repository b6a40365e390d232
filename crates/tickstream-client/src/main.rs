/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Logged ticks, market status and connection state until shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tickstream_client::{ClientConfig, ConnectionManager, StreamEvent};

#[derive(Parser, Debug)]
#[command(name = "tickstream", version, about = "Resilient market price stream client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    /// Comma-separated symbols, replacing the configured set
    #[arg(long = "symbols", value_name = "SYMBOLS", value_delimiter = ',')]
    symbols: Vec<String>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Also write logs to a daily-rotated file in this directory
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = init_tracing(&args.log_level, args.log_dir.as_deref())?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting tickstream"
    );

    let mut config = load_config(&args.config_path)?;
    if !args.symbols.is_empty() {
        config.symbols = args.symbols.clone();
    }
    config.validate().context("validate config")?;
    info!(
        url = %config.url,
        symbols = ?config.symbols,
        auto_reconnect = config.auto_reconnect,
        max_attempts = config.max_attempts,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let manager = ConnectionManager::new(&config).context("create connection manager")?;
    let mut events = manager.subscribe_events();

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    manager.connect().context("start connection")?;

    let outcome = loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown signal received");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(err) = log_event(event) {
                        break Err(err);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged");
                }
                Err(RecvError::Closed) => break Err(anyhow!("connection manager stopped")),
            }
        }
    };

    let stats = manager.stats();
    manager
        .shutdown()
        .await
        .context("shutdown connection manager")?;
    info!(
        frames = stats.frames_received,
        ticks = stats.ticks_emitted,
        unrecognized = stats.frames_unrecognized,
        queue_dropped = stats.queue_dropped,
        connections = stats.connections_opened,
        "tickstream stopped"
    );

    outcome
}

/// Log one event. Returns an error once the client has given up reconnecting.
fn log_event(event: StreamEvent) -> Option<anyhow::Error> {
    match event {
        StreamEvent::Tick(tick) => {
            info!(
                symbol = %tick.symbol(),
                price = %tick.price(),
                direction = tick.direction.as_str(),
                previous = ?tick.previous_price,
                "tick"
            );
        }
        StreamEvent::MarketStatus(status) => {
            info!(
                is_open = status.is_open,
                current_time = %status.current_time,
                timezone = %status.timezone,
                message = ?status.message,
                "market status"
            );
        }
        StreamEvent::StateChanged(snapshot) => {
            info!(
                state = ?snapshot.state,
                attempt = snapshot.attempt,
                max_attempts = ?snapshot.max_attempts,
                reason = ?snapshot.reason,
                "connection state"
            );
        }
        StreamEvent::RetryScheduled { attempt, delay } => {
            warn!(attempt, ?delay, "reconnecting");
        }
        StreamEvent::GaveUp { attempts } => {
            return Some(anyhow!("gave up after {attempts} reconnect attempts"));
        }
    }
    None
}

fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tickstream.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(guard)
}

fn load_config(path: &Path) -> Result<ClientConfig> {
    ClientConfig::from_file(path).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
