//! Match configuration.

use std::time::Duration;

use tracing::warn;

/// Timing and capacity settings for a match.
///
/// The defaults reproduce the reference behavior: a 30 s pre-game window
/// with joins allowed during its first three quarters, a fixed 30 s
/// elimination round interval, and 10 % of the playing field at risk per
/// round. The round interval is deliberately independent of the remaining
/// player count.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Maximum players allowed in the match.
    pub max_players: usize,

    /// Length of the pre-game window. Eliminations may begin once it ends.
    pub start_offset: Duration,

    /// Joins are accepted for this long after creation.
    /// Forced ≤ `start_offset` by [`validated`](Self::validated).
    pub join_offset: Duration,

    /// Fixed interval between elimination rounds.
    pub round_interval: Duration,

    /// Fraction of the playing field removed per round (floor, min 1).
    pub elimination_fraction: f64,

    /// Broadcast coalescer tick. At most one snapshot push per interval
    /// per match, no matter how fast the match mutates.
    pub flush_interval: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_players: 40,
            start_offset: Duration::from_secs(30),
            join_offset: Duration::from_millis(22_500),
            round_interval: Duration::from_secs(30),
            elimination_fraction: 0.1,
            flush_interval: Duration::from_millis(200),
        }
    }
}

impl MatchConfig {
    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by `Match::new`. Rules:
    /// - `max_players` raised to at least 1.
    /// - `join_offset` forced ≤ `start_offset` (the join window can never
    ///   outlive the pre-game window).
    /// - `elimination_fraction` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            warn!("max_players of 0 is unusable — raising to 1");
            self.max_players = 1;
        }
        if self.join_offset > self.start_offset {
            warn!(
                join_offset_ms = self.join_offset.as_millis() as u64,
                start_offset_ms = self.start_offset.as_millis() as u64,
                "join_offset exceeds start_offset — clamping"
            );
            self.join_offset = self.start_offset;
        }
        self.elimination_fraction = self.elimination_fraction.clamp(0.0, 1.0);
        self
    }

    /// Create a config with a custom pre-game length, joins open for the
    /// first three quarters of it. Used for long-startup matches.
    pub fn with_start_offset(start_offset: Duration) -> Self {
        Self {
            start_offset,
            join_offset: start_offset.mul_f64(0.75),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MatchConfig::default();
        assert_eq!(config.max_players, 40);
        assert_eq!(config.start_offset, Duration::from_secs(30));
        assert_eq!(config.join_offset, Duration::from_millis(22_500));
        assert_eq!(config.round_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_validated_clamps_join_offset() {
        let config = MatchConfig {
            start_offset: Duration::from_secs(10),
            join_offset: Duration::from_secs(60),
            ..MatchConfig::default()
        }
        .validated();
        assert_eq!(config.join_offset, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_raises_zero_capacity() {
        let config = MatchConfig {
            max_players: 0,
            ..MatchConfig::default()
        }
        .validated();
        assert_eq!(config.max_players, 1);
    }

    #[test]
    fn test_with_start_offset_scales_join_window() {
        let config = MatchConfig::with_start_offset(Duration::from_secs(300));
        assert_eq!(config.start_offset, Duration::from_secs(300));
        assert_eq!(config.join_offset, Duration::from_secs(225));
    }
}
