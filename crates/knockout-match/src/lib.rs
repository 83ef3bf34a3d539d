//! The elimination match state machine for Knockout.
//!
//! A match is a timed competition: players join during a pre-game window,
//! report scores while the match runs, and a self-driven schedule of
//! elimination rounds removes the lowest-ranked players until one remains.
//!
//! Everything in this crate is synchronous and deterministic: every
//! operation takes `now` explicitly, and timer-driven behavior is modeled
//! as a pair of functions — [`Match::next_deadline`] tells the caller when
//! the next transition is due, [`Match::handle_deadline`] performs it.
//! The async actor that drives a match against real time lives in
//! `knockout-lobby`.
//!
//! # Key types
//!
//! - [`Match`] — the state machine (joins, ranking, elimination rounds)
//! - [`MatchPlayer`] — per-connection player record inside a match
//! - [`MatchConfig`] — timing and capacity settings
//! - [`MatchClock`] — monotonic-to-wall-clock conversion for snapshots

mod clock;
mod config;
mod error;
mod player;
mod state;

pub use clock::MatchClock;
pub use config::MatchConfig;
pub use error::MatchError;
pub use player::MatchPlayer;
pub use state::{Elimination, Match, MatchPhase};
