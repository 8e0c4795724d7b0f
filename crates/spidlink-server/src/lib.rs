//! Spidlink production server.
//!
//! This crate provides the network surface of the association service:
//! - Tokio TCP listener, one task per connection
//! - Length-prefixed CBOR frames (`spidlink_proto::FrameCodec`)
//! - System RNG for entity identifiers
//!
//! ## Architecture
//!
//! ```text
//! spidlink-server
//!   ├─ Server                  (accept loop, connection cap)
//!   │    └─ connection task    (decode → handle → encode, sequential)
//!   ├─ RequestHandler          (Request → coordinator/registry → Response)
//!   │    ├─ AssociationCoordinator
//!   │    └─ EntityRegistry
//!   ├─ SystemEnv               (production Environment impl)
//!   └─ MemoryStore             (shared across connections)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handler;
mod system_env;

use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
pub use error::ServerError;
pub use handler::{RequestHandler, error_kind};
use spidlink_core::{EntityStore, Environment, MemoryStore, SameStatePolicy};
use spidlink_proto::{DEFAULT_MAX_FRAME_SIZE, ErrorKind, FrameCodec, ProtoError, Request, Response};
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Semaphore,
};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:50051")
    pub bind_address: String,
    /// Maximum concurrent connections; further connections are dropped
    pub max_connections: usize,
    /// Maximum frame payload in bytes
    pub max_frame_size: usize,
    /// Treatment of lock requests for the current state
    pub lock_policy: SameStatePolicy,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
            max_connections: 10_000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            lock_policy: SameStatePolicy::Accept,
        }
    }
}

/// Production Spidlink server.
///
/// Every connection shares one [`RequestHandler`] and therefore one store.
pub struct Server<S = MemoryStore, E = SystemEnv> {
    listener: TcpListener,
    handler: Arc<RequestHandler<S, E>>,
    codec: FrameCodec,
    connections: Arc<Semaphore>,
}

impl Server {
    /// Create and bind a server over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns error if binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let store = Arc::new(MemoryStore::new());
        let handler = Arc::new(RequestHandler::new(store, SystemEnv::new(), config.lock_policy));
        Self::with_handler(config, handler).await
    }
}

impl<S, E> Server<S, E>
where
    S: EntityStore + 'static,
    E: Environment,
{
    /// Bind a server that dispatches to `handler`.
    pub async fn with_handler(
        config: ServerRuntimeConfig,
        handler: Arc<RequestHandler<S, E>>,
    ) -> Result<Self, ServerError> {
        if config.max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".to_string()));
        }

        let listener = TcpListener::bind(&config.bind_address).await?;

        Ok(Self {
            listener,
            handler,
            codec: FrameCodec::new(config.max_frame_size),
            connections: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the task is cancelled or accepting fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.listener.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    continue;
                },
            };

            let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
                tracing::warn!(%peer, "connection limit reached, dropping connection");
                drop(stream);
                continue;
            };

            let handler = Arc::clone(&self.handler);
            let codec = self.codec;

            tokio::spawn(async move {
                tracing::debug!(%peer, "connection accepted");
                if let Err(e) = handle_connection(stream, handler, codec).await {
                    tracing::warn!(%peer, "Connection error: {}", e);
                }
                tracing::debug!(%peer, "connection closed");
                drop(permit);
            });
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Serve one connection until the peer closes it.
///
/// Requests are handled strictly in arrival order. A payload that is not a
/// valid request gets an `InvalidRequest` reply; an oversized frame closes
/// the connection since the stream can no longer be resynchronised.
async fn handle_connection<S, E>(
    mut stream: TcpStream,
    handler: Arc<RequestHandler<S, E>>,
    codec: FrameCodec,
) -> Result<(), ServerError>
where
    S: EntityStore,
    E: Environment,
{
    let mut read_buf = BytesMut::with_capacity(4096);
    let mut write_buf = BytesMut::with_capacity(4096);

    loop {
        loop {
            let response = match codec.decode::<Request>(&mut read_buf) {
                Ok(Some(request)) => handler.handle(request),
                Ok(None) => break,
                Err(ProtoError::Decode(reason)) => {
                    tracing::debug!(%reason, "undecodable request");
                    Response::Error {
                        operation: "decode request".to_string(),
                        kind: ErrorKind::InvalidRequest,
                        message: format!("failed to decode request: {reason}"),
                    }
                },
                Err(e) => return Err(e.into()),
            };

            codec.encode(&response, &mut write_buf)?;
            stream.write_all(&write_buf).await?;
            write_buf.clear();
        }

        if stream.read_buf(&mut read_buf).await? == 0 {
            if read_buf.is_empty() {
                return Ok(());
            }
            return Err(ServerError::Truncated { buffered: read_buf.len() });
        }
    }
}
