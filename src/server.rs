//! Tracing setup and server startup for HostBridge.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hostbridge_api::{InterfaceConfig, InterfaceServer};
use hostbridge_config::{Config, ConfigLoader, LoggingConfig};
use hostbridge_runloop::BridgeConfig;

use crate::demo_host::{self, DemoHost};

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing with console output and, when `file_dir` is set,
/// daily-rotated log files.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let file_layer = match &logging.file_dir {
        Some(dir) => {
            let dir = PathBuf::from(ConfigLoader::expand_path(&dir.to_string_lossy()));
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("hostbridge")
                .filename_suffix("log")
                .max_log_files(30)
                .build(&dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console_text = (!logging.json).then(|| fmt::layer().with_target(true).with_ansi(true));
    let console_json = logging.json.then(|| fmt::layer().json().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Run the bridge with the demo host until Ctrl+C or SIGTERM.
pub(crate) async fn run_server(config: Config) -> anyhow::Result<()> {
    let bridge = demo_host::builder(BridgeConfig::from(&config)).start(|| Ok(DemoHost::new()))?;
    let cleanup = bridge.spawn_cleanup();

    let server = InterfaceServer::new(
        InterfaceConfig::new(config.server.host.clone(), config.server.port),
        bridge.clone(),
    );
    let listener = server
        .bind()
        .await
        .with_context(|| format!("binding {}", server.addr()))?;
    info!(
        "HostBridge ready with {} commands ({:?} results)",
        bridge.commands().len(),
        config.results.mode
    );

    let stopping = bridge.clone();
    server
        .serve(listener, async move {
            shutdown_signal().await;
            stopping.shutdown().await;
        })
        .await?;

    if let Err(e) = cleanup.await {
        warn!("Cleanup task ended abnormally: {}", e);
    }
    info!("HostBridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
