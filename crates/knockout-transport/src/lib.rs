//! Transport abstraction for Knockout.
//!
//! Provides the [`Transport`] and [`Connection`] traits the server loop
//! is written against, plus the default WebSocket implementation. The
//! wire payload is JSON text frames; framing and liveness are the
//! transport's problem, game semantics are not — a closed connection
//! surfaces to the lobby as a disconnect event and nothing else.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use knockout_protocol::ConnectionId;

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport is listening on. Useful when bound to
    /// an ephemeral port.
    fn local_addr(&self) -> Result<std::net::SocketAddr, Self::Error>;
}

/// A single connection carrying JSON text frames.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// The unique identifier for this connection. This doubles as the
    /// player's identity for its whole lifetime.
    fn id(&self) -> ConnectionId;
}
