//! Match orchestration for Knockout.
//!
//! Each match runs as an isolated Tokio task (actor model) owning one
//! state machine, its broadcast coalescer, and its deadline timer. The
//! matchmaker on top holds the waiting queue and the connection→match
//! index, and routes client events to the right actor.
//!
//! # Key types
//!
//! - [`Matchmaker`] — queue, promotion policy, event routing
//! - [`MatchRegistry`] — match actors and the connection→match index
//! - [`MatchHandle`] — send commands to a running match actor
//! - [`LobbyConfig`] — queue threshold and flush jitter

mod actor;
mod config;
mod error;
mod matchmaker;
mod registry;

pub use actor::{EventSender, MatchHandle, MatchInfo};
pub use config::LobbyConfig;
pub use error::LobbyError;
pub use matchmaker::Matchmaker;
pub use registry::MatchRegistry;
