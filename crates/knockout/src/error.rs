//! Unified error type for the Knockout server.

use knockout_lobby::LobbyError;
use knockout_match::MatchError;
use knockout_protocol::ProtocolError;
use knockout_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `knockout` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KnockoutError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A match state machine error (full, join window closed).
    #[error(transparent)]
    Match(#[from] MatchError),

    /// A lobby error (not found, not joinable, already in a match).
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use knockout_protocol::MatchId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Transport(_)));
        assert!(knockout_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Protocol(_)));
    }

    #[test]
    fn test_from_match_error() {
        let err = MatchError::MatchFull(MatchId(1000));
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Match(_)));
    }

    #[test]
    fn test_from_lobby_error() {
        let err = LobbyError::MatchNotFound(MatchId(1));
        let knockout_err: KnockoutError = err.into();
        assert!(matches!(knockout_err, KnockoutError::Lobby(_)));
    }
}
