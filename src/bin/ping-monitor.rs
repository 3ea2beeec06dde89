use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use ping_monitor::{
    EngineBuilder, EngineHandle,
    config::LogLevel,
    storage::{SettingsStore, file::JsonFileBackend},
    util::{get_api_addr, get_api_token, get_settings_path},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{
    Layer, Registry, filter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Start monitoring every configured host right away
    #[arg(long)]
    start_all: bool,

    /// Do not write per-host CSV sample logs
    #[arg(long)]
    no_sample_log: bool,

    /// Override the log level from the settings
    #[arg(long, value_enum, ignore_case = true)]
    log_level: Option<LogLevel>,

    /// Serve the HTTP API on this address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Bearer token required by the HTTP API
    #[arg(short, long)]
    token: Option<String>,
}

fn targets(level: LogLevel) -> filter::Targets {
    let level = LevelFilter::from(level);
    filter::Targets::new().with_targets(vec![("ping_monitor", level), ("tower_http", level)])
}

/// Install the subscriber; the returned handle swaps the level once settings are loaded
fn init(level: LogLevel) -> reload::Handle<filter::Targets, Registry> {
    let (filter, handle) = reload::Layer::new(targets(level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false)
                .with_filter(filter),
        )
        .init();
    handle
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let log_handle = init(args.log_level.unwrap_or_default());
    trace!("started with args: {args:?}");

    let backend = match args.settings.clone().or_else(get_settings_path) {
        Some(path) => JsonFileBackend::new(path),
        None => JsonFileBackend::at_default_location()?,
    };
    let settings_path = backend.path().to_path_buf();
    let store = SettingsStore::open(Box::new(backend)).await?;

    if args.log_level.is_none() {
        let level = store.settings().log_level;
        if let Err(e) = log_handle.reload(targets(level)) {
            warn!("failed to apply log level {level:?}: {e}");
        }
    }
    info!(
        "loaded {} hosts from {}",
        store.settings().hosts.len(),
        settings_path.display()
    );

    let mut builder = EngineBuilder::new(store);
    if !args.no_sample_log {
        let log_dir = settings_path
            .parent()
            .map(|dir| dir.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        debug!("sample logs go to {}", log_dir.display());
        builder = builder.sample_log_dir(log_dir);
    }
    let engine = builder.spawn();
    let logger = tokio::spawn(log_snapshots(engine.clone()));

    if args.start_all {
        engine.start_all().await?;
    }

    if let Some(addr) = args.listen.or_else(get_api_addr) {
        serve_api(&engine, addr, args.token.clone().or_else(get_api_token)).await?;
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    engine.shutdown().await?;
    logger.abort();

    Ok(())
}

#[cfg(feature = "api")]
async fn serve_api(engine: &EngineHandle, addr: SocketAddr, token: Option<String>) -> anyhow::Result<()> {
    use ping_monitor::api::{ApiConfig, ApiState, spawn_api_server};

    if token.is_none() {
        warn!("API token not set, the HTTP API is unauthenticated");
    }

    let config = ApiConfig {
        bind_addr: addr,
        auth_token: token,
        ..ApiConfig::default()
    };
    spawn_api_server(config, ApiState::new(engine.clone())).await?;

    Ok(())
}

#[cfg(not(feature = "api"))]
async fn serve_api(_engine: &EngineHandle, addr: SocketAddr, _token: Option<String>) -> anyhow::Result<()> {
    warn!("built without the `api` feature, not listening on {addr}");
    Ok(())
}

async fn log_snapshots(engine: EngineHandle) {
    let mut snapshots = engine.subscribe();

    loop {
        match snapshots.recv().await {
            Ok(event) => {
                let snapshot = &event.snapshot;
                match snapshot.current {
                    Some(latency) => info!(
                        "{}: {latency:.1} ms (avg {:.1}, loss {:.1}%) {:?}",
                        event.host_name, snapshot.mean, snapshot.packet_loss_rate, snapshot.labels
                    ),
                    None => warn!(
                        "{}: unreachable ({})",
                        event.host_name,
                        snapshot
                            .last_failure
                            .map(|f| f.to_string())
                            .unwrap_or_default()
                    ),
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!("snapshot log skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
