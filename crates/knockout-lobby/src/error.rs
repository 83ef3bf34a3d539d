//! Lobby error types.

use knockout_protocol::{ConnectionId, MatchId};
use thiserror::Error;

/// Errors from lobby operations: registry lookups, joins, routing.
///
/// These are request-scoped failures owed to one client, never reasons
/// to take the process down.
#[derive(Debug, Error)]
pub enum LobbyError {
    /// No match with this id exists in the registry.
    #[error("match {0} does not exist")]
    MatchNotFound(MatchId),

    /// The match exists but is full, past its join window, or concluded.
    #[error("match {0} is not joinable")]
    NotJoinable(MatchId),

    /// The connection already belongs to another match.
    #[error("{0} is already in match {1}")]
    AlreadyInMatch(ConnectionId, MatchId),

    /// The match actor's channel is closed or it failed to reply.
    #[error("match {0} is unavailable")]
    Unavailable(MatchId),
}

impl LobbyError {
    /// The sentence clients see in `joinResult.message` and error events.
    pub fn client_message(&self) -> String {
        match self {
            Self::MatchNotFound(_) => "Match does not exist.".into(),
            Self::NotJoinable(_) | Self::Unavailable(_) => {
                "Match is not joinable anymore.".into()
            }
            Self::AlreadyInMatch(_, _) => {
                "Already in a match.".into()
            }
        }
    }
}
