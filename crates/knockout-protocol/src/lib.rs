//! Wire protocol for Knockout.
//!
//! This crate defines the "language" that clients and the match server
//! speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`MatchSnapshot`], etc.)
//!   — the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the lobby
//! (matchmaking and match routing). It doesn't know about connections or
//! matches — it only knows how to serialize and deserialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Lobby (matchmaking, matches)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ConnectionId, ConnectionStatus, MatchId, MatchSnapshot,
    PlayStatus, PlayerSnapshot, ScoreboardStatus, ServerEvent,
};
