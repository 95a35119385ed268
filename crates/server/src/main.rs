//! Voice-order Server Entry Point

use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_order_config::{load_settings, Settings};
use voice_order_server::{create_router, init_metrics, AppState, ConnectionServices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing needs the observability settings, so load configuration first
    let env = std::env::var("VOICE_ORDER_ENV").ok();
    let config = load_settings(env.as_deref())?;

    init_tracing(&config);
    tracing::info!("Starting voice-order server v{}", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let services = ConnectionServices::from_settings(&config)?;
    let writer = services.writer.clone();
    let state = AppState::new(config.clone(), services);
    let connections = state.connections.clone();

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, ws_path = %config.server.ws_path, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Upgraded sockets outlive `serve`; let their finals reach the writer
    let live = connections.count();
    if live > 0 {
        tracing::info!(connections = live, "Waiting for live connections to finish");
        if !connections.wait_drained(config.server.shutdown_grace()).await {
            tracing::warn!(
                connections = connections.count(),
                "Shutdown grace elapsed with connections still open"
            );
        }
    }

    if let Some(writer) = writer {
        writer.shutdown().await;
        tracing::info!("Transcript writer flushed");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing with an env filter and a plain or JSON formatter
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("voice_order={},tower_http=info", level).into()
    });

    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

