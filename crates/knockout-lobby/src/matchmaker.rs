//! Matchmaker: the queue of waiting connections and the routing layer
//! between connection handlers and match actors.
//!
//! All methods take `&mut self`; the server wraps the matchmaker in a
//! mutex, so queue membership and the connection→match index only ever
//! change under one caller at a time. Joins still go through the match
//! actor's own re-check, because a snapshot taken during the scan can go
//! stale before the commit lands.

use std::collections::{HashMap, HashSet};

use knockout_match::MatchConfig;
use knockout_protocol::{
    ConnectionId, MatchId, MatchSnapshot, ServerEvent,
};
use tracing::{debug, info, warn};

use crate::registry::MatchRegistry;
use crate::{EventSender, LobbyConfig, LobbyError, MatchHandle};

/// Matchmaking queue + match registry, the lobby's top-level object.
pub struct Matchmaker {
    config: LobbyConfig,
    registry: MatchRegistry,
    /// Outbound channels for every connected client, queued or not.
    senders: HashMap<ConnectionId, EventSender>,
    /// Connections currently waiting for a match.
    queue: HashSet<ConnectionId>,
}

impl Matchmaker {
    pub fn new(config: LobbyConfig) -> Self {
        let config = config.validated();
        let registry = MatchRegistry::new(config.flush_jitter_us);
        Self {
            config,
            registry,
            senders: HashMap::new(),
            queue: HashSet::new(),
        }
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    /// Registers a connection's outbound channel. Must happen before any
    /// other call for this connection.
    pub fn register(&mut self, conn: ConnectionId, sender: EventSender) {
        self.senders.insert(conn, sender);
        debug!(%conn, connections = self.senders.len(), "connection registered");
    }

    /// Tears a connection down: out of the queue, out of its match (as
    /// an elimination if it was still playing), channel dropped.
    pub async fn disconnect(&mut self, conn: ConnectionId) {
        self.senders.remove(&conn);
        if self.queue.remove(&conn) {
            self.broadcast_queue_size();
        }
        if let Some(match_id) = self.registry.unbind(conn) {
            if let Ok(handle) = self.registry.get(match_id) {
                if let Err(err) = handle.disconnect(conn).await {
                    warn!(%conn, %match_id, %err, "disconnect not delivered");
                }
            }
        }
        info!(%conn, "connection closed");
    }

    // -----------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------

    /// Adds a connection to the matchmaking queue and runs the promotion
    /// policy.
    ///
    /// An existing joinable match is offered to the new queuer alone; if
    /// there is none and the queue has reached the configured minimum, a
    /// fresh match is created and offered to the whole queue. Joining
    /// the offered match still requires an explicit `join_match`.
    pub async fn join_queue(&mut self, conn: ConnectionId) {
        if !self.senders.contains_key(&conn) {
            warn!(%conn, "queue join from unregistered connection");
            return;
        }
        self.queue.insert(conn);

        if let Some(snapshot) = self.find_joinable().await {
            self.send_to(conn, ServerEvent::MatchReady { snapshot });
        } else if self.queue.len() >= self.config.min_queue_players {
            let handle = self
                .registry
                .create_match(self.config.match_config.clone());
            info!(
                match_id = %handle.match_id(),
                queued = self.queue.len(),
                "queue promoted to new match"
            );
            if let Ok(snapshot) = handle.snapshot().await {
                self.broadcast_queue(ServerEvent::MatchReady { snapshot });
            }
        }

        self.broadcast_queue_size();
    }

    pub fn leave_queue(&mut self, conn: ConnectionId) {
        if self.queue.remove(&conn) {
            self.broadcast_queue_size();
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// First match that still accepts players, if any.
    async fn find_joinable(&self) -> Option<MatchSnapshot> {
        for handle in self.registry.handles() {
            if let Ok(info) = handle.info().await {
                if info.joinable {
                    if let Ok(snapshot) = handle.snapshot().await {
                        return Some(snapshot);
                    }
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Match membership
    // -----------------------------------------------------------------

    /// Joins a connection into a specific match.
    ///
    /// Membership is committed inside the match actor; only a committed
    /// join updates the index and removes the connection from the queue,
    /// so a join lost to a fill race leaves the lobby state untouched.
    pub async fn join_match(
        &mut self,
        conn: ConnectionId,
        match_id: MatchId,
        display_name: Option<String>,
    ) -> Result<MatchSnapshot, LobbyError> {
        if let Some(existing) = self.registry.match_of(conn) {
            warn!(%conn, current = %existing, requested = %match_id,
                "join refused, connection already in a match");
            return Err(LobbyError::AlreadyInMatch(conn, existing));
        }
        let handle = self.registry.get(match_id)?.clone();
        let sender = self
            .senders
            .get(&conn)
            .cloned()
            .ok_or(LobbyError::Unavailable(match_id))?;

        let snapshot = handle.join(conn, display_name, sender).await?;

        if let Err(err) = self.registry.bind(conn, match_id) {
            // lost an index race we cannot represent; undo the commit
            let _ = handle.leave(conn).await;
            return Err(err);
        }
        if self.queue.remove(&conn) {
            self.broadcast_queue_size();
        }
        info!(%conn, %match_id, "joined match");
        Ok(snapshot)
    }

    /// Voluntary departure from the connection's current match. Not
    /// being in a match is a logged no-op.
    pub async fn leave_match(&mut self, conn: ConnectionId) {
        let Some(match_id) = self.registry.unbind(conn) else {
            debug!(%conn, "leave with no current match");
            return;
        };
        if let Ok(handle) = self.registry.get(match_id) {
            if let Err(err) = handle.leave(conn).await {
                warn!(%conn, %match_id, %err, "leave not delivered");
            }
        }
    }

    /// Gives the player up without leaving the match or the connection.
    pub async fn self_eliminate(&mut self, conn: ConnectionId) {
        let Some(match_id) = self.registry.match_of(conn) else {
            debug!(%conn, "self-eliminate with no current match");
            return;
        };
        if let Ok(handle) = self.registry.get(match_id) {
            if let Err(err) = handle.self_eliminate(conn).await {
                warn!(%conn, %match_id, %err, "self-eliminate not delivered");
            }
        }
    }

    /// Routes a score report to the addressed match.
    pub async fn report_update(
        &mut self,
        conn: ConnectionId,
        match_id: MatchId,
        points: f64,
        field: Option<serde_json::Value>,
    ) -> Result<(), LobbyError> {
        let handle = self.registry.get(match_id)?;
        handle.update(conn, points, field).await
    }

    // -----------------------------------------------------------------
    // Registry passthrough
    // -----------------------------------------------------------------

    /// Creates a match outside the queue flow (extended-start matches,
    /// tests).
    pub fn create_match(&mut self, config: MatchConfig) -> MatchHandle {
        self.registry.create_match(config)
    }

    pub fn match_count(&self) -> usize {
        self.registry.match_count()
    }

    pub fn current_match(&self, conn: ConnectionId) -> Option<MatchId> {
        self.registry.match_of(conn)
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    fn send_to(&self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            let _ = sender.send(event);
        }
    }

    fn broadcast_queue(&self, event: ServerEvent) {
        for conn in &self.queue {
            self.send_to(*conn, event.clone());
        }
    }

    fn broadcast_queue_size(&self) {
        self.broadcast_queue(ServerEvent::MatchmakingUpdate {
            players_in_queue: self.queue.len(),
        });
    }
}
