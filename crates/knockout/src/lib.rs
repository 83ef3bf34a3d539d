//! # Knockout
//!
//! A server for live timed elimination competitions: players queue up,
//! get promoted into a match, report scores while periodic elimination
//! rounds cut the bottom of the scoreboard, and the last player standing
//! wins.
//!
//! The meta crate wires the layers together — WebSocket transport, JSON
//! protocol, lobby orchestration, and the match state machine — behind a
//! single builder:
//!
//! ```rust,no_run
//! use knockout::prelude::*;
//!
//! # async fn run() -> Result<(), KnockoutError> {
//! let server = KnockoutServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::KnockoutError;
pub use server::{KnockoutServer, KnockoutServerBuilder};

/// Common imports for server binaries and tests.
pub mod prelude {
    pub use crate::{KnockoutError, KnockoutServer, KnockoutServerBuilder};
    pub use knockout_lobby::LobbyConfig;
    pub use knockout_match::MatchConfig;
    pub use knockout_protocol::{ClientEvent, ServerEvent};
}
