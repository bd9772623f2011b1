//! RPC server implementation.

use super::routes::create_router;
use super::state::{NodeStatusState, RpcState};
use parking_lot::RwLock;
use racecontrol_core::Event;
use racecontrol_types::{DelayState, SessionId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors from the RPC server.
#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Handle for controlling a running RPC server.
pub struct RpcServerHandle {
    /// Task handle for the server.
    task: JoinHandle<()>,
    /// Actual bound address (resolves port 0).
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Abort the server.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the server to finish.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// HTTP server exposing the director and observability surface.
pub struct RpcServer {
    config: RpcServerConfig,
    state: RpcState,
}

impl RpcServer {
    /// Create a new RPC server.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `event_tx` - Channel into the runner's event loop
    /// * `delay_states` - Mirror maintained by the runner
    /// * `node_status` - Counters refreshed by the runner's metrics tick
    pub fn new(
        config: RpcServerConfig,
        event_tx: mpsc::Sender<Event>,
        delay_states: Arc<RwLock<HashMap<SessionId, DelayState>>>,
        node_status: Arc<RwLock<NodeStatusState>>,
    ) -> Self {
        let state = RpcState {
            event_tx,
            delay_states,
            node_status,
            start_time: Instant::now(),
        };

        Self { config, state }
    }

    /// Start the server and return a handle for control.
    pub async fn start(self) -> Result<RpcServerHandle, RpcServerError> {
        let addr = self.config.listen_addr;
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "RPC server listening");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = ?e, "RPC server error");
            }
        });

        Ok(RpcServerHandle { task, local_addr })
    }

    /// Start and serve until shutdown (convenience method).
    pub async fn serve(self) -> Result<(), RpcServerError> {
        let handle = self.start().await?;
        let _ = handle.join().await;
        Ok(())
    }
}
