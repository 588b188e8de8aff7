//! Hub state and the WebSocket listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use farsight_sdk::client::SUBPROTOCOL;
use farsight_sdk::proto::Frame;

use crate::audit::{self, AUDIT_BUFFER, AuditEvent};
use crate::config::HubConfig;
use crate::connection;
use crate::registry::Registry;

/// Everything the connection handlers share.
pub struct SharedState {
    /// The one exclusive-lock home of all session state.
    pub registry: RwLock<Registry>,
    /// peer id → sender for that peer's writer task.
    pub connections: Mutex<HashMap<String, mpsc::Sender<Frame>>>,
    /// Session lifecycle records, drained by the audit actor.
    pub audit: mpsc::Sender<AuditEvent>,
}

pub struct Server {
    config: HubConfig,
}

impl Server {
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    /// Bind and serve until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("binding {}", self.config.listen_addr))?;
        tracing::info!(addr = %listener.local_addr()?, "signaling hub listening");
        let app = self.into_router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("received SIGINT, shutting down");
            })
            .await?;
        Ok(())
    }

    /// Bind and serve in a background task; returns the bound address.
    /// Used by the protocol tests against an ephemeral port.
    pub async fn spawn(self) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("binding {}", self.config.listen_addr))?;
        let addr = listener.local_addr()?;
        let app = self.into_router();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!(%err, "hub serve failed");
            }
        });
        Ok((addr, handle))
    }

    fn into_router(self) -> Router {
        let (audit_tx, audit_rx) = mpsc::channel(AUDIT_BUFFER);
        tokio::spawn(audit::run(self.config.events_url.clone(), audit_rx));
        let state = Arc::new(SharedState {
            registry: RwLock::new(Registry::new()),
            connections: Mutex::new(HashMap::new()),
            audit: audit_tx,
        });
        Router::new().route("/ws", get(ws_handler)).with_state(state)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    tracing::debug!(%addr, "incoming connection");
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| connection::handle(socket, addr, state))
}
