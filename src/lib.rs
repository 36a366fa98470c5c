use std::sync::Arc;

use tracing::{info, warn};

pub mod catalog;
pub mod config;
pub mod errors;
pub mod logging;
pub mod module;
pub mod rpc;
pub mod transport;

use catalog::ModuleCatalog;
use config::{Config, TransportKind};
use errors::{BridgeError, TransportError};
use rpc::server::RpcServer;
use transport::{stdio::StdioListener, websocket::WebSocketListener, Bridge, Listener};

/// Loads the configured module, starts the configured transport, prints the
/// handshake line and serves until the connection closes or Ctrl-C.
pub async fn run(config: Config) -> Result<(), BridgeError> {
    let module = ModuleCatalog::default().load(&config.module)?;
    info!(module = %module.name(), "module loaded");
    let server = Arc::new(RpcServer::new(module));

    match config.transport {
        TransportKind::WebSocket => {
            let listener = WebSocketListener::bind(config.bind_socket()?).await?;
            serve(Bridge::new(listener, server)).await
        }
        TransportKind::Stdio => serve(Bridge::new(StdioListener::new(), server)).await,
    }
}

async fn serve<L: Listener>(bridge: Bridge<L>) -> Result<(), BridgeError> {
    bridge
        .handshake()
        .emit(std::io::stdout().lock())
        .map_err(TransportError::from)?;
    bridge.run(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_module_fails_before_binding() {
        let config = Config {
            module: "missing.js".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 0,
            transport: TransportKind::WebSocket,
        };

        let err = run(config).await.expect_err("unknown module must fail");
        assert!(matches!(err, BridgeError::UnknownModule { .. }));
    }
}
