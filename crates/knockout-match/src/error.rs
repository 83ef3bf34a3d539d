//! Error types for the match state machine.

use knockout_protocol::MatchId;

/// Errors that can occur during match operations.
///
/// Everything here is a request-scoped failure: a rejected join degrades
/// to a reported reason, never a crash. Unknown-player updates are not an
/// error at all (a disconnect/update race is expected) and are handled as
/// logged no-ops inside the match.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The match already holds `max_players` players.
    #[error("match {0} is full")]
    MatchFull(MatchId),

    /// The join window has closed.
    #[error("match {0} is no longer joinable")]
    JoinWindowClosed(MatchId),
}
