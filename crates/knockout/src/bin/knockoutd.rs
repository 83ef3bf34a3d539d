//! The Knockout server daemon.
//!
//! Configuration comes from the environment:
//!
//! - `KNOCKOUT_ADDR` — bind address (default `127.0.0.1:8080`)
//! - `KNOCKOUT_START_SECS` — pre-game window in seconds (default 30);
//!   the join window scales to three quarters of it
//! - `RUST_LOG` — log filter (default `info`)

use std::time::Duration;

use knockout::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), KnockoutError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("KNOCKOUT_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let mut match_config = MatchConfig::default();
    if let Ok(secs) = std::env::var("KNOCKOUT_START_SECS") {
        match secs.parse::<u64>() {
            Ok(secs) => {
                match_config =
                    MatchConfig::with_start_offset(Duration::from_secs(secs));
            }
            Err(_) => {
                tracing::warn!(
                    value = %secs,
                    "ignoring unparsable KNOCKOUT_START_SECS"
                );
            }
        }
    }

    let server = KnockoutServer::builder()
        .bind(&addr)
        .match_config(match_config)
        .build()
        .await?;

    tracing::info!(%addr, "knockoutd listening");
    server.run().await
}
