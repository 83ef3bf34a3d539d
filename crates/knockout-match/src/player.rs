//! The per-connection player record inside a match.

use knockout_protocol::{
    ConnectionId, ConnectionStatus, PlayStatus, PlayerSnapshot,
    ScoreboardStatus,
};

/// Fallback display name for players who don't supply one.
const DEFAULT_DISPLAY_NAME: &str = "player";

/// One player inside a [`Match`](crate::Match).
///
/// Owned by the match's player collection. Routing of player-originated
/// events (leave, self-eliminate) goes through the lobby's
/// connection-to-match index, so there is no back-reference here.
#[derive(Debug, Clone)]
pub struct MatchPlayer {
    /// Stable identity key for the current connection. Immutable for the
    /// player's lifetime within the match.
    pub connection_id: ConnectionId,
    pub display_name: String,
    /// Externally reported score. The server never validates it.
    pub points: f64,
    /// Rank, 1 = best. `None` until the first ranking pass; a player who
    /// leaves pre-game stays unranked forever.
    pub placement: Option<u32>,
    pub connection_status: ConnectionStatus,
    pub scoreboard_status: ScoreboardStatus,
    pub play_status: PlayStatus,
    /// Opaque application payload, replaced wholesale on update.
    pub field: Option<serde_json::Value>,
}

impl MatchPlayer {
    /// Creates a fresh, still-playing player for a connection.
    pub fn new(
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> Self {
        let display_name = display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
        Self {
            connection_id,
            display_name,
            points: 0.0,
            placement: None,
            connection_status: ConnectionStatus::Connected,
            scoreboard_status: ScoreboardStatus::Regular,
            play_status: PlayStatus::Playing,
            field: None,
        }
    }

    /// The player's public fields for the wire.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            display_name: self.display_name.clone(),
            connection_id: self.connection_id,
            points: self.points,
            placement: self.placement,
            connection_status: self.connection_status,
            scoreboard_status: self.scoreboard_status,
            play_status: self.play_status,
            field: self.field.clone(),
        }
    }
}
