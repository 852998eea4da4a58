//! Serve flowsim sessions over HTTP and WebSocket.
//!
//! ```bash
//! flowsim-server --listen 0.0.0.0:8080 --tick-ms 500 --max-sessions 64
//! ```

use anyhow::{Context as _, Result};
use clap::Parser;
use flowsim::{EngineConfig, RegistryConfig, SessionRegistry};
use flowsim_server::{AppState, router};
use std::{future::pending, net::SocketAddr, time::Duration};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flowsim-server")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Wall clock milliseconds between two ticks of a session
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Maximum number of live sessions
    #[arg(long, default_value = "1024")]
    max_sessions: usize,

    /// Stop sessions without commands nor subscribers after this many seconds
    #[arg(long, default_value = "300")]
    idle_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let engine = EngineConfig::default()
        .with_tick_period(Duration::from_millis(cli.tick_ms))
        .with_idle_timeout(Duration::from_secs(cli.idle_timeout_secs));
    let registry = SessionRegistry::new(
        RegistryConfig::default()
            .with_engine(engine)
            .with_max_sessions(cli.max_sessions),
    );
    let reaper = registry.spawn_reaper();

    let listener = TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", cli.listen))?;
    info!(addr = %cli.listen, "flowsim server listening");

    axum::serve(listener, router(AppState::new(registry.clone())))
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("HTTP server error")?;

    reaper.await.context("session reaper panicked")?;
    info!("flowsim server stopped");
    Ok(())
}

/// Resolves on ctrl-c once every session is stopped, which also closes
/// the open WebSockets so the graceful shutdown can complete.
async fn shutdown_signal(registry: SessionRegistry) {
    if let Err(error) = signal::ctrl_c().await {
        error!(%error, "cannot listen for ctrl-c, serving until killed");
        pending::<()>().await;
    }

    info!("shutting down");
    if let Err(error) = registry.shutdown().await {
        error!(error = ?error, "sessions did not stop cleanly");
    }
}
