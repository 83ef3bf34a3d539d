//! Monotonic-to-wall-clock conversion for match snapshots.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Pairs a wall-clock epoch with a monotonic epoch so scheduling can use
/// monotonic [`Instant`]s while snapshots report absolute epoch
/// milliseconds (the wire contract clients render countdowns against).
///
/// The pairing is captured once at match creation; all later conversions
/// are pure offset arithmetic, so they stay consistent under
/// `tokio::time::pause` in tests.
#[derive(Debug, Clone, Copy)]
pub struct MatchClock {
    wall_epoch_ms: u64,
    mono_epoch: Instant,
}

impl MatchClock {
    /// Captures the current wall clock against the given monotonic instant.
    pub fn new(now: Instant) -> Self {
        let wall_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            wall_epoch_ms,
            mono_epoch: now,
        }
    }

    /// Converts a monotonic instant to epoch milliseconds.
    ///
    /// Instants before the epoch pair saturate toward zero rather than
    /// panicking; they can only arise from caller bugs.
    pub fn wall_ms(&self, at: Instant) -> u64 {
        if at >= self.mono_epoch {
            let offset = at.saturating_duration_since(self.mono_epoch);
            self.wall_epoch_ms.saturating_add(offset.as_millis() as u64)
        } else {
            let offset = self.mono_epoch.saturating_duration_since(at);
            self.wall_epoch_ms.saturating_sub(offset.as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wall_ms_advances_with_monotonic_time() {
        let base = Instant::now();
        let clock = MatchClock::new(base);

        let at_epoch = clock.wall_ms(base);
        let later = clock.wall_ms(base + Duration::from_secs(30));
        assert_eq!(later - at_epoch, 30_000);
    }

    #[test]
    fn test_wall_ms_before_epoch_saturates() {
        let base = Instant::now() + Duration::from_secs(10);
        let clock = MatchClock::new(base);

        let earlier = clock.wall_ms(base - Duration::from_secs(5));
        assert!(earlier <= clock.wall_ms(base));
    }
}
