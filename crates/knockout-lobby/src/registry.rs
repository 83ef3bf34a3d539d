//! Match registry: creates and tracks match actors, and maps each
//! connection to the one match it belongs to.

use std::collections::HashMap;

use knockout_match::{Match, MatchConfig};
use knockout_protocol::{ConnectionId, MatchId};
use tokio::time::Instant;

use crate::actor::spawn_match;
use crate::{LobbyError, MatchHandle};

/// First id handed out; leaves room below for reserved values.
const FIRST_MATCH_ID: u64 = 1000;

/// Owns every match actor handle and the connection→match index.
///
/// The index enforces the "at most one match per connection" invariant:
/// a second concurrent membership is refused and logged, never fatal.
/// Terminal matches stay registered so late snapshot requests still
/// resolve.
pub struct MatchRegistry {
    matches: HashMap<MatchId, MatchHandle>,
    connections: HashMap<ConnectionId, MatchId>,
    /// Monotonic id source, owned here rather than process-global so two
    /// registries never share id state.
    next_match_id: u64,
    flush_jitter_us: u64,
}

impl MatchRegistry {
    pub fn new(flush_jitter_us: u64) -> Self {
        Self {
            matches: HashMap::new(),
            connections: HashMap::new(),
            next_match_id: FIRST_MATCH_ID,
            flush_jitter_us,
        }
    }

    /// Spawns a match actor with the given config and registers it.
    pub fn create_match(&mut self, config: MatchConfig) -> MatchHandle {
        let match_id = MatchId(self.next_match_id);
        self.next_match_id += 1;

        let state = Match::new(match_id, config, Instant::now());
        let handle = spawn_match(state, self.flush_jitter_us);
        self.matches.insert(match_id, handle.clone());
        handle
    }

    pub fn get(&self, match_id: MatchId) -> Result<&MatchHandle, LobbyError> {
        self.matches
            .get(&match_id)
            .ok_or(LobbyError::MatchNotFound(match_id))
    }

    /// Records a connection's match membership after a committed join.
    pub fn bind(
        &mut self,
        conn: ConnectionId,
        match_id: MatchId,
    ) -> Result<(), LobbyError> {
        if let Some(existing) = self.connections.get(&conn) {
            tracing::warn!(
                %conn,
                current = %existing,
                requested = %match_id,
                "connection already bound to a match"
            );
            return Err(LobbyError::AlreadyInMatch(conn, *existing));
        }
        self.connections.insert(conn, match_id);
        Ok(())
    }

    /// Clears a connection's membership, returning the match it was in.
    pub fn unbind(&mut self, conn: ConnectionId) -> Option<MatchId> {
        self.connections.remove(&conn)
    }

    pub fn match_of(&self, conn: ConnectionId) -> Option<MatchId> {
        self.connections.get(&conn).copied()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Cloned handles to every registered match, for scans that must not
    /// borrow the registry across awaits.
    pub fn handles(&self) -> Vec<MatchHandle> {
        self.matches.values().cloned().collect()
    }
}
