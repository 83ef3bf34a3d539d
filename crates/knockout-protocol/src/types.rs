//! Core protocol types for Knockout's wire format.
//!
//! Everything here travels on the wire as camelCase JSON — these shapes
//! are a contract with the client SDK, pinned by the tests at the bottom
//! of this file. Timestamps are UNIX epoch milliseconds so clients can
//! render countdowns against `currentServerTime`.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a client connection.
///
/// The connection IS the player's identity for the lifetime of the
/// connection (there is no account system). Newtype over `u64` so a
/// `ConnectionId` can never be confused with a [`MatchId`].
///
/// `#[serde(transparent)]` makes `ConnectionId(42)` serialize as plain
/// `42`, which is what the client SDK expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A unique identifier for a match (one elimination competition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Player status enums
// ---------------------------------------------------------------------------

/// Whether the player's transport connection is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// The player's progress through the match.
///
/// `Playing` is the only non-terminal state: a player transitions to
/// `Eliminated` or `Won` exactly once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayStatus {
    Playing,
    Eliminated,
    Won,
}

/// A UI hint for the scoreboard, recomputed on every ranking pass.
///
/// `Endangered` marks players inside the cutoff of the next scheduled
/// elimination round. `Spotlighted` is reserved for clients; the server
/// never assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreboardStatus {
    Regular,
    Endangered,
    Spotlighted,
}

// ---------------------------------------------------------------------------
// Snapshots — the serialized match state pushed to clients
// ---------------------------------------------------------------------------

/// One player's public fields inside a [`MatchSnapshot`].
///
/// `placement` is `null` until the first ranking pass has run — a player
/// who leaves before the match starts is never ranked at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub display_name: String,
    pub connection_id: ConnectionId,
    pub points: f64,
    pub placement: Option<u32>,
    pub connection_status: ConnectionStatus,
    pub scoreboard_status: ScoreboardStatus,
    pub play_status: PlayStatus,
    /// Opaque application payload (e.g. the player's last reported game
    /// board). Passed through unmodified, never merged.
    pub field: Option<serde_json::Value>,
}

/// An immutable snapshot of a match, ordered by placement.
///
/// This is the wire artifact broadcast by the coalescer. Internal match
/// state (dirty flag, placement counters, deadlines) never appears here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub id: MatchId,
    /// Server wall clock at serialization time, epoch milliseconds.
    pub current_server_time: u64,
    pub players: Vec<PlayerSnapshot>,
    /// When the pre-game window ends and eliminations may begin.
    pub start_time: u64,
    /// After this instant no new players may join. Always ≤ `start_time`.
    pub join_until: u64,
    /// When the next elimination round fires, or `null` if none is
    /// scheduled (pre-game, or the match has concluded).
    pub next_elimination: Option<u64>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Messages clients send to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "joinMatch", "matchId": 1000, "displayName": "ada" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Enter the matchmaking queue.
    JoinQueue,

    /// Leave the matchmaking queue.
    LeaveQueue,

    /// Join a specific match. Answered with a [`ServerEvent::JoinResult`].
    #[serde(rename_all = "camelCase")]
    JoinMatch {
        match_id: MatchId,
        /// Player-supplied name; the server substitutes a default if absent.
        display_name: Option<String>,
    },

    /// Voluntary departure from the current match.
    LeaveMatch,

    /// Voluntary elimination without dropping the connection — the player
    /// keeps watching the match.
    SelfEliminate,

    /// Report a new score and (optionally) a fresh game-state payload.
    #[serde(rename_all = "camelCase")]
    MatchUpdate {
        match_id: MatchId,
        points: f64,
        field: Option<serde_json::Value>,
    },
}

/// Messages the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Broadcast to the matchmaking queue whenever its size changes.
    #[serde(rename_all = "camelCase")]
    MatchmakingUpdate { players_in_queue: usize },

    /// A joinable match is available. Joining still requires an explicit
    /// [`ClientEvent::JoinMatch`].
    MatchReady {
        #[serde(rename = "match")]
        snapshot: MatchSnapshot,
    },

    /// Direct reply to a successful join.
    MatchInfo {
        #[serde(rename = "match")]
        snapshot: MatchSnapshot,
    },

    /// Periodic room broadcast from the coalescer.
    MatchUpdate {
        #[serde(rename = "match")]
        snapshot: MatchSnapshot,
    },

    /// Reply to [`ClientEvent::JoinMatch`]. On failure `message` carries
    /// the reason and `match` is absent.
    #[serde(rename_all = "camelCase")]
    JoinResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
        snapshot: Option<MatchSnapshot>,
    },

    /// Something went wrong. `code` follows HTTP-style conventions
    /// (400 = bad request, 404 = not found).
    Error { code: u16, message: String },
}

// =========================================================================
// Tests
// =========================================================================
