//! TCP listener and server main loop

use super::connection::{handle_client, ConnectionLimits};
use crate::config::Config;
use crate::router::Router;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// TCP chat server listener
pub struct ServerListener {
    listener: TcpListener,
    router: Router,
    limits: ConnectionLimits,
}

impl ServerListener {
    /// Bind the configured address with a fresh router
    pub async fn bind(config: &Config) -> Result<Self> {
        let router = Router::with_policy(config.identity.policy());
        Self::bind_with_router(config, router).await
    }

    /// Bind the configured address around an existing router
    pub async fn bind_with_router(config: &Config, router: Router) -> Result<Self> {
        config.validate()?;

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Self {
            listener,
            router,
            limits: ConnectionLimits {
                outbox_capacity: config.server.outbox_capacity,
                max_line_len: config.server.max_line_len,
            },
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        tracing::info!("Server listening on {}", self.local_addr()?);

        // Main server loop
        loop {
            tokio::select! {
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                // Accept new connections
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let router = self.router.clone();
                            let limits = self.limits;
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, addr.to_string(), router, limits).await {
                                    tracing::error!("Client {} error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}
