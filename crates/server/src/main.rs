//! FTSO price server
//!
//! Main entry point for the HTTP API

use std::env;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ftso_core::AppConfig;
use ftso_server::{HttpServerBuilder, HttpServerConfig, PriceServiceImpl};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting FTSO price server v{}", env!("CARGO_PKG_VERSION"));

    let config_path = env::var("FTSO_CONFIG").unwrap_or_else(|_| "ftso".to_string());
    let config = AppConfig::load(Some(&config_path))?;
    info!(
        resolver_rpc = %config.resolver.oracle.http_url,
        feed_rpc = %config.feed.oracle.http_url,
        poll_interval_ms = config.feed.poll_interval_ms,
        "Configuration loaded"
    );

    let service = PriceServiceImpl::from_config(&config)?;

    // Start background services
    service.start().await?;

    let server = HttpServerBuilder::new()
        .config(HttpServerConfig::from(&config.server))
        .service(service.clone())
        .build()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(());
    });

    info!("HTTP server listening on {}", server.address());

    let result = server.start_with_shutdown(shutdown_rx).await;
    service.stop().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("Server shutdown complete");
    Ok(())
}
