//! `KnockoutServer` builder and accept loop.
//!
//! This is the entry point for running a Knockout server. It ties the
//! layers together: transport → protocol → lobby → match.

use std::sync::Arc;

use knockout_lobby::{LobbyConfig, Matchmaker};
use knockout_match::MatchConfig;
use knockout_protocol::JsonCodec;
use knockout_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::KnockoutError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The lobby
/// sits behind a `Mutex`; match state itself is actor-owned, so the lock
/// only covers queue membership and registry lookups.
pub(crate) struct ServerState {
    pub(crate) lobby: Mutex<Matchmaker>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Knockout server.
///
/// # Example
///
/// ```rust,ignore
/// let server = KnockoutServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct KnockoutServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
}

impl KnockoutServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            lobby_config: LobbyConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the lobby configuration.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Sets the template for matches created by queue promotion.
    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.lobby_config.match_config = config;
        self
    }

    /// Binds the transport and builds the server.
    pub async fn build(self) -> Result<KnockoutServer, KnockoutError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            lobby: Mutex::new(Matchmaker::new(self.lobby_config)),
            codec: JsonCodec,
        });

        Ok(KnockoutServer { transport, state })
    }
}

impl Default for KnockoutServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Knockout server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KnockoutServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl KnockoutServer {
    /// Creates a new builder.
    pub fn builder() -> KnockoutServerBuilder {
        KnockoutServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, KnockoutError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KnockoutError> {
        tracing::info!("Knockout server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
