//! HTTP server configuration and startup

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use ftso_core::ServerConfig;

use crate::service::PriceServiceImpl;

/// Server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl From<&ServerConfig> for HttpServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// HTTP server wrapper
pub struct HttpServer {
    config: HttpServerConfig,
    service: PriceServiceImpl,
}

impl HttpServer {
    pub fn with_service(config: HttpServerConfig, service: PriceServiceImpl) -> Self {
        Self { config, service }
    }

    async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr: SocketAddr = self.address().parse()?;
        Ok(TcpListener::bind(addr).await?)
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        info!(
            "Starting HTTP server on {} (with graceful shutdown)",
            listener.local_addr()?
        );

        axum::serve(listener, self.service.router())
            .with_graceful_shutdown(async {
                shutdown.await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }

    /// Get server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

/// Builder for server configuration
pub struct HttpServerBuilder {
    config: HttpServerConfig,
    service: Option<PriceServiceImpl>,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpServerConfig::default(),
            service: None,
        }
    }

    pub fn config(mut self, config: HttpServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn service(mut self, service: PriceServiceImpl) -> Self {
        self.service = Some(service);
        self
    }

    pub fn build(self) -> anyhow::Result<HttpServer> {
        let service = self
            .service
            .ok_or_else(|| anyhow::anyhow!("HTTP server needs a price service"))?;
        Ok(HttpServer::with_service(self.config, service))
    }
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
