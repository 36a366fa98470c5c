//! Transports moving JSON-RPC frames across the process boundary
//!
//! Every transport implements [`Listener`] and [`Connection`]; the [`Bridge`]
//! drives any of them with the same loop. It announces itself with a
//! single [`Handshake`] line, serves one connection frame by frame and
//! publishes its [`ListenerState`].

use std::{future::Future, io::Write, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::errors::TransportError;
use crate::rpc::server::RpcServer;

pub mod stdio;
pub mod websocket;

#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame, or `None` once the peer closed.
    async fn receive(&mut self) -> Result<Option<String>, TransportError>;

    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[async_trait]
pub trait Listener: Send {
    type Conn: Connection;

    /// Address a client uses to connect, as announced in the handshake.
    fn url(&self) -> String;

    /// Waits for the next connection, or `None` once no more will arrive.
    async fn accept(&mut self) -> Result<Option<Self::Conn>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handshake {
    pub url: String,
    pub methods: Vec<String>,
    pub runtime: String,
}

impl Handshake {
    pub fn new(url: String, methods: Vec<String>) -> Self {
        Self {
            url,
            methods,
            runtime: runtime_identifier(),
        }
    }

    /// Writes the handshake as one JSON line and flushes.
    pub fn emit<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

pub fn runtime_identifier() -> String {
    format!(
        "{} {} (tokio)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Listening,
    Closed,
}

/// Feeds every inbound frame through [`RpcServer::serve`] and writes the
/// reply back, one frame at a time.
pub async fn serve_connection<C: Connection>(
    server: &RpcServer,
    connection: &mut C,
) -> Result<(), TransportError> {
    while let Some(frame) = connection.receive().await? {
        let reply = server.serve(&frame).await;
        connection.send(reply).await?;
    }

    connection.close().await
}

pub struct Bridge<L: Listener> {
    listener: L,
    server: Arc<RpcServer>,
    state: watch::Sender<ListenerState>,
}

impl<L: Listener> Bridge<L> {
    pub fn new(listener: L, server: Arc<RpcServer>) -> Self {
        let (state, _) = watch::channel(ListenerState::Listening);
        Self {
            listener,
            server,
            state,
        }
    }

    pub fn handshake(&self) -> Handshake {
        Handshake::new(self.listener.url(), self.server.methods())
    }

    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Serves connections until the listener runs dry or `abort` resolves,
    /// then moves to [`ListenerState::Closed`].
    pub async fn run<F>(mut self, abort: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send,
    {
        info!(url = %self.listener.url(), "listening");

        let outcome = tokio::select! {
            outcome = serve_all(&mut self.listener, &self.server) => outcome,
            _ = abort => {
                info!("abort signal received");
                Ok(())
            }
        };

        self.state.send_replace(ListenerState::Closed);
        info!("listener closed");
        outcome
    }
}

async fn serve_all<L: Listener>(listener: &mut L, server: &RpcServer) -> Result<(), TransportError> {
    while let Some(mut connection) = listener.accept().await? {
        debug!("connection accepted");
        match serve_connection(server, &mut connection).await {
            Ok(()) => info!("connection closed"),
            Err(err) => warn!(error = %err, "connection failed"),
        }
    }

    Ok(())
}
