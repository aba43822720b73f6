use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use helmsman_engine::Controller;

pub struct Server {
    addr: SocketAddr,
    app: Router,
    controller: Arc<Controller>,
}

impl Server {
    pub fn new(addr: SocketAddr, app: Router, controller: Arc<Controller>) -> Self {
        Self {
            addr,
            app,
            controller,
        }
    }

    /// Serves until a shutdown signal arrives, then cancels every
    /// reconciliation loop.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.controller.shutdown();
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
