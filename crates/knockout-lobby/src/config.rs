//! Lobby tuning knobs.

use knockout_match::MatchConfig;

/// Configuration for the matchmaker and the per-match actors.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Template applied to matches created by queue promotion.
    pub match_config: MatchConfig,
    /// Queue size at which a new match is created when no joinable one
    /// exists.
    pub min_queue_players: usize,
    /// Random jitter (0–max µs) added to a match's *first* broadcast
    /// flush to desynchronize matches created at the same instant.
    pub flush_jitter_us: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            match_config: MatchConfig::default(),
            min_queue_players: 1,
            flush_jitter_us: 2_000, // 0–2 ms
        }
    }
}

impl LobbyConfig {
    /// Clamps nonsensical values instead of failing.
    pub fn validated(mut self) -> Self {
        if self.min_queue_players == 0 {
            tracing::warn!("min_queue_players of 0 raised to 1");
            self.min_queue_players = 1;
        }
        self.match_config = self.match_config.validated();
        self
    }
}
