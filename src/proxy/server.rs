use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::prompts::PromptRegistry;
use crate::proxy::error::ProxyError;
use crate::proxy::router::{build_router, GatewayEngine};
use crate::proxy::shutdown::ShutdownManager;

pub struct GatewayServer {
    bind_addr: String,
    engine: GatewayEngine,
    shutdown: Arc<ShutdownManager>,
    grace: Duration,
}

impl GatewayServer {
    pub fn new(config: &Config, prompts: PromptRegistry) -> Result<Self, ProxyError> {
        let shutdown = Arc::new(ShutdownManager::new());
        let engine = GatewayEngine::new(config, prompts, shutdown.clone())?;
        Ok(Self {
            bind_addr: format!("{}:{}", config.server.host, config.server.port),
            engine,
            shutdown,
            grace: Duration::from_secs(config.server.shutdown_grace_seconds),
        })
    }

    pub fn engine(&self) -> &GatewayEngine {
        &self.engine
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Bind the configured address and serve until SIGINT/SIGTERM.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.bind_addr).await?;

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = shutdown.wait_for_signal().await {
                tracing::error!(error = %err, "failed to install signal handler");
            }
        });

        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown is signalled, then
    /// give in-flight exchanges the grace period to finish.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!("gateway listening on {}", addr);

        let app = build_router(self.engine.clone());
        let shutdown = self.shutdown.clone();
        let mut server = tokio::spawn(
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
                .into_future(),
        );

        tokio::select! {
            joined = &mut server => {
                return joined.unwrap_or_else(|err| Err(std::io::Error::other(err)));
            }
            _ = self.shutdown.wait_for_shutdown() => {}
        }

        tracing::info!(grace_seconds = self.grace.as_secs(), "shutting down gracefully");
        let deadline = tokio::time::Instant::now() + self.grace;

        match tokio::time::timeout_at(deadline, &mut server).await {
            Ok(joined) => joined.unwrap_or_else(|err| Err(std::io::Error::other(err)))?,
            Err(_) => {
                tracing::warn!("connections still open after grace period, closing");
                server.abort();
            }
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        self.shutdown.wait_for_in_flight(remaining).await;
        tracing::info!("gateway stopped");

        Ok(())
    }
}

#[derive(Clone)]
pub struct GatewayHandle {
    shutdown: Arc<ShutdownManager>,
}

impl GatewayHandle {
    pub fn shutdown(&self) {
        self.shutdown.signal_shutdown();
    }
}
