//! WebSocket listener served by axum
//!
//! Any path accepts a WebSocket upgrade; anything else gets `501`. Upgraded
//! sockets are handed to the [`Bridge`](super::Bridge) through a channel, and
//! once the first socket has been accepted, later upgrades get `503`.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::errors::{AppError, TransportError};
use crate::logging;
use crate::transport::{Connection, Listener};

#[derive(Clone)]
pub struct UpgradeState {
    sockets: mpsc::Sender<WebSocket>,
}

impl UpgradeState {
    pub fn new(sockets: mpsc::Sender<WebSocket>) -> Self {
        Self { sockets }
    }
}

pub fn build_app(state: UpgradeState) -> Router {
    Router::new()
        .fallback(upgrade_handler)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

async fn upgrade_handler(
    State(state): State<UpgradeState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(upgrade) = upgrade else {
        return AppError::not_implemented("upgrade_required", "websocket upgrade required")
            .into_response();
    };

    if state.sockets.is_closed() {
        return AppError::busy("connection_in_use", "bridge already serves a connection")
            .into_response();
    }

    upgrade
        .on_upgrade(move |socket| async move {
            if state.sockets.send(socket).await.is_err() {
                warn!("upgraded socket dropped, bridge no longer accepting");
            }
        })
        .into_response()
}

pub struct WebSocketListener {
    local_addr: SocketAddr,
    sockets: mpsc::Receiver<WebSocket>,
    accepted: bool,
    stop: Option<oneshot::Sender<()>>,
}

impl WebSocketListener {
    /// Binds the HTTP listener and starts serving upgrades in a background
    /// task. Port `0` picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (sockets_tx, sockets) = mpsc::channel(1);
        let (stop, stopped) = oneshot::channel::<()>();
        let app = build_app(UpgradeState::new(sockets_tx));

        tokio::spawn(async move {
            let shutdown = async {
                let _ = stopped.await;
            };
            if let Err(err) = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "websocket listener failed");
            }
        });

        Ok(Self {
            local_addr,
            sockets,
            accepted: false,
            stop: Some(stop),
        })
    }
}

impl Drop for WebSocketListener {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

#[async_trait]
impl Listener for WebSocketListener {
    type Conn = WebSocketConnection;

    fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Yields the first upgraded socket, then stops accepting. Sockets that
    /// were queued before the channel closed are dropped unserved.
    async fn accept(&mut self) -> Result<Option<Self::Conn>, TransportError> {
        if self.accepted {
            return Ok(None);
        }
        self.accepted = true;

        let socket = self.sockets.recv().await;
        self.sockets.close();
        while self.sockets.try_recv().is_ok() {
            debug!("dropping socket upgraded after the first connection");
        }
        Ok(socket.map(WebSocketConnection::new))
    }
}

pub struct WebSocketConnection {
    socket: WebSocket,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.socket.recv().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(bytes) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }

        Ok(None)
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.socket.send(Message::Text(frame.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Err(err) = self.socket.send(Message::Close(None)).await {
            debug!(error = %err, "close frame not sent, socket already closed");
        }
        Ok(())
    }
}
