//! The match state machine: joins, ranking, and elimination rounds.

use std::cmp::Ordering;
use std::time::Duration;

use knockout_protocol::{
    ConnectionId, ConnectionStatus, MatchId, MatchSnapshot, PlayStatus,
    ScoreboardStatus,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{MatchClock, MatchConfig, MatchError, MatchPlayer};

/// A scheduled elimination round: when it fires and how many of the
/// currently-playing players it removes.
#[derive(Debug, Clone, Copy)]
pub struct Elimination {
    pub scheduled_at: Instant,
    pub cutoff_count: usize,
}

/// The implicit match-level phase.
///
/// *Forming* — before `start_time`: joins allowed, no eliminations.
/// *Active* — eliminations run until one player remains.
/// *Concluded* — a Won player exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Forming,
    Active,
    Concluded,
}

/// One timed elimination competition.
///
/// Owns its players and the elimination schedule. All mutation is
/// synchronous; the lobby actor serializes access, so there is no locking
/// here. Timer behavior is the [`next_deadline`](Self::next_deadline) /
/// [`handle_deadline`](Self::handle_deadline) pair — the actor re-arms
/// from current state on every iteration, so a superseded deadline can
/// never mutate a concluded match.
pub struct Match {
    id: MatchId,
    config: MatchConfig,
    clock: MatchClock,
    start_time: Instant,
    join_until: Instant,
    /// All players ever committed, in join order until the first ranking
    /// pass, placement order after.
    all_players: Vec<MatchPlayer>,
    /// Derived subset of still-playing connection ids, re-filtered lazily
    /// before each ranking pass. Rank order after a pass.
    playing: Vec<ConnectionId>,
    next_elimination: Option<Elimination>,
    /// Countdown counter for terminal placements. Initialized once, on
    /// the first early exit after start, and never reused.
    next_placement: Option<u32>,
    /// Pre-game deadline consumed — the first elimination round has been
    /// scheduled.
    started: bool,
    concluded: bool,
    /// Broadcast-pending flag, consumed by the coalescer.
    dirty: bool,
}

impl Match {
    pub fn new(id: MatchId, config: MatchConfig, now: Instant) -> Self {
        let config = config.validated();
        let start_time = now + config.start_offset;
        let join_until = now + config.join_offset;
        info!(
            %id,
            max_players = config.max_players,
            start_in_ms = config.start_offset.as_millis() as u64,
            "match created"
        );
        Self {
            id,
            clock: MatchClock::new(now),
            start_time,
            join_until,
            config,
            all_players: Vec::new(),
            playing: Vec::new(),
            next_elimination: None,
            next_placement: None,
            started: false,
            concluded: false,
            dirty: false,
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn player_count(&self) -> usize {
        self.all_players.len()
    }

    /// Number of still-playing players as of the last ranking pass.
    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }

    pub fn phase(&self, now: Instant) -> MatchPhase {
        if self.concluded {
            MatchPhase::Concluded
        } else if now < self.start_time {
            MatchPhase::Forming
        } else {
            MatchPhase::Active
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// The winning player, once the match has concluded.
    pub fn winner(&self) -> Option<&MatchPlayer> {
        self.all_players
            .iter()
            .find(|p| p.play_status == PlayStatus::Won)
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&MatchPlayer> {
        self.all_players.iter().find(|p| p.connection_id == conn)
    }

    pub fn next_elimination(&self) -> Option<&Elimination> {
        self.next_elimination.as_ref()
    }

    /// True iff the join window is still open and a slot is free.
    /// Not state-mutating.
    pub fn is_joinable(&self, now: Instant) -> bool {
        !self.concluded
            && now < self.join_until
            && self.all_players.len() < self.config.max_players
    }

    /// Consumes the broadcast-pending flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // -----------------------------------------------------------------
    // Player events
    // -----------------------------------------------------------------

    /// Commits a player into the match.
    ///
    /// A player with the same connection id is treated as a stale
    /// reconnect and fully removed first. Triggers a full ranking pass.
    pub fn add_player(
        &mut self,
        player: MatchPlayer,
        now: Instant,
    ) -> Result<(), MatchError> {
        if self.all_players.len() >= self.config.max_players
            || self.concluded
        {
            return Err(MatchError::MatchFull(self.id));
        }
        if now >= self.join_until {
            return Err(MatchError::JoinWindowClosed(self.id));
        }

        let conn = player.connection_id;
        if self.all_players.iter().any(|p| p.connection_id == conn) {
            debug!(match_id = %self.id, %conn, "replacing stale player entry");
            self.remove_player(conn);
        }

        self.all_players.push(player);
        self.playing.push(conn);
        self.rank(now);
        debug!(
            match_id = %self.id,
            %conn,
            players = self.all_players.len(),
            "player joined match"
        );

        // A lone joiner of a bigger match is not a winner — the field may
        // still fill up. Only a full match can resolve immediately.
        if self.all_players.len() == self.config.max_players {
            self.check_for_winner();
        }
        self.dirty = true;
        Ok(())
    }

    /// Excises a player entirely. Pre-game departures only; mid-game
    /// players are marked Eliminated instead so placement history stays
    /// intact.
    fn remove_player(&mut self, conn: ConnectionId) {
        self.all_players.retain(|p| p.connection_id != conn);
        self.playing.retain(|id| *id != conn);
        self.dirty = true;
    }

    /// Applies an externally reported score/state update.
    ///
    /// An unknown connection id is a logged no-op — a disconnect racing
    /// an in-flight update is expected, not an error. Unchanged points
    /// skip the ranking pass.
    pub fn receive_player_update(
        &mut self,
        conn: ConnectionId,
        points: f64,
        field: Option<serde_json::Value>,
        now: Instant,
    ) {
        let Some(player) = self
            .all_players
            .iter_mut()
            .find(|p| p.connection_id == conn)
        else {
            warn!(match_id = %self.id, %conn, "update for unknown player");
            return;
        };

        let points_changed = player.points != points;
        player.points = points;
        if let Some(field) = field {
            player.field = Some(field);
        }
        if points_changed {
            self.rank(now);
        }
        self.dirty = true;
    }

    /// Explicit early-exit path: disconnect or self-elimination.
    ///
    /// Before `start_time` the player is removed without ranking
    /// consequence. Afterwards a still-playing player receives the next
    /// countdown placement and transitions to `terminal_status`.
    pub fn determine_placement(
        &mut self,
        conn: ConnectionId,
        terminal_status: PlayStatus,
        now: Instant,
    ) {
        if now < self.start_time {
            self.remove_player(conn);
            self.rank(now);
            return;
        }

        let Some(player) = self
            .all_players
            .iter_mut()
            .find(|p| p.connection_id == conn)
        else {
            return;
        };
        if player.play_status != PlayStatus::Playing {
            return;
        }

        let counter = self
            .next_placement
            .get_or_insert(self.playing.len() as u32);
        let assigned = *counter;
        *counter = counter.saturating_sub(1);

        player.placement = Some(assigned);
        player.play_status = terminal_status;
        player.scoreboard_status = ScoreboardStatus::Regular;
        debug!(
            match_id = %self.id,
            %conn,
            placement = assigned,
            status = ?terminal_status,
            "placement determined"
        );

        self.playing.retain(|id| *id != conn);
        self.dirty = true;
        self.rank(now);
        self.check_for_winner();
    }

    /// Transport-level disconnect: the connection is gone for good, so
    /// the player is marked disconnected and, if still playing,
    /// eliminated on the spot. Before `start_time` this removes the
    /// player entirely via the pre-start path.
    pub fn handle_disconnect(&mut self, conn: ConnectionId, now: Instant) {
        let Some(player) = self
            .all_players
            .iter_mut()
            .find(|p| p.connection_id == conn)
        else {
            return;
        };
        player.connection_status = ConnectionStatus::Disconnected;
        let was_playing = player.play_status == PlayStatus::Playing;
        self.dirty = true;
        if was_playing {
            self.determine_placement(conn, PlayStatus::Eliminated, now);
        }
    }

    // -----------------------------------------------------------------
    // Ranking
    // -----------------------------------------------------------------

    /// The ranking pass.
    ///
    /// Sorts the playing subset by points descending with a deterministic
    /// tie-break on ascending display name, assigns placements 1..n, and
    /// recomputes scoreboard status. `all_players` is then resorted by
    /// placement so the serialized list stays rank-ordered (terminal
    /// players keep their final placement).
    fn rank(&mut self, now: Instant) {
        let all = &self.all_players;
        self.playing.retain(|id| {
            all.iter().any(|p| {
                p.connection_id == *id
                    && p.play_status == PlayStatus::Playing
            })
        });

        let mut ranked = std::mem::take(&mut self.playing);
        ranked.sort_by(|a, b| {
            match (self.player(*a), self.player(*b)) {
                (Some(pa), Some(pb)) => pb
                    .points
                    .partial_cmp(&pa.points)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| pa.display_name.cmp(&pb.display_name)),
                _ => Ordering::Equal,
            }
        });

        let field_size = ranked.len() as u32;
        // Endangered only while a future round is actually scheduled.
        let at_risk = self
            .next_elimination
            .filter(|e| e.scheduled_at > now)
            .map(|e| e.cutoff_count as u32);

        for (index, conn) in ranked.iter().enumerate() {
            let placement = index as u32 + 1;
            if let Some(player) = self
                .all_players
                .iter_mut()
                .find(|p| p.connection_id == *conn)
            {
                player.placement = Some(placement);
                player.scoreboard_status = match at_risk {
                    Some(cutoff)
                        if placement
                            > field_size.saturating_sub(cutoff) =>
                    {
                        ScoreboardStatus::Endangered
                    }
                    _ => ScoreboardStatus::Regular,
                };
            }
        }
        self.playing = ranked;

        self.all_players
            .sort_by_key(|p| p.placement.unwrap_or(u32::MAX));
    }

    // -----------------------------------------------------------------
    // Elimination schedule
    // -----------------------------------------------------------------

    /// Schedules the next elimination round: `cutoff_count` is at least
    /// one player, the round fires after the fixed interval plus
    /// `offset`.
    pub fn schedule_next_elimination(
        &mut self,
        now: Instant,
        offset: Duration,
    ) {
        if self.concluded {
            return;
        }
        let remaining = self
            .all_players
            .iter()
            .filter(|p| p.play_status == PlayStatus::Playing)
            .count();
        let cutoff_count = ((remaining as f64
            * self.config.elimination_fraction)
            .floor() as usize)
            .max(1);
        let scheduled_at = now + self.config.round_interval + offset;

        self.next_elimination = Some(Elimination {
            scheduled_at,
            cutoff_count,
        });
        self.dirty = true;
        debug!(
            match_id = %self.id,
            remaining,
            cutoff_count,
            fires_in_ms =
                (self.config.round_interval + offset).as_millis() as u64,
            "elimination round scheduled"
        );
    }

    /// Fires the due elimination round.
    ///
    /// Every still-playing player ranked below the cutoff is eliminated.
    /// When the cutoff reaches 1 this is the last round: the surviving
    /// top-ranked player is marked Won directly and nothing further is
    /// scheduled.
    fn execute_elimination(&mut self, now: Instant) {
        let Some(round) = self.next_elimination.take() else {
            debug!(match_id = %self.id, "stale elimination timer ignored");
            return;
        };
        if self.concluded {
            return;
        }

        let remaining = self
            .all_players
            .iter()
            .filter(|p| p.play_status == PlayStatus::Playing)
            .count();
        // The floor of 1 guarantees at least one survivor per round.
        let cutoff = remaining.saturating_sub(round.cutoff_count).max(1);
        let last_round = cutoff == 1;

        let victims: Vec<ConnectionId> = self
            .all_players
            .iter()
            .filter(|p| {
                p.play_status == PlayStatus::Playing
                    && p.placement.is_some_and(|pl| pl as usize > cutoff)
            })
            .map(|p| p.connection_id)
            .collect();

        info!(
            match_id = %self.id,
            remaining,
            cutoff,
            eliminated = victims.len(),
            last_round,
            "elimination round fired"
        );

        for conn in victims {
            self.determine_placement(conn, PlayStatus::Eliminated, now);
        }

        if last_round {
            // Winner is marked directly, bypassing the countdown path.
            // check_for_winner may already have done this while the last
            // victim was processed.
            if let Some(survivor) = self
                .all_players
                .iter_mut()
                .find(|p| p.play_status == PlayStatus::Playing)
            {
                survivor.play_status = PlayStatus::Won;
                survivor.scoreboard_status = ScoreboardStatus::Regular;
            }
            self.concluded = true;
            self.next_elimination = None;
            self.dirty = true;
        } else {
            self.schedule_next_elimination(now, Duration::ZERO);
        }
    }

    /// Declares a winner as soon as exactly one playing player remains.
    ///
    /// Called after every placement-affecting mutation — not only from
    /// the round schedule — so voluntary departures can end the match
    /// early. Cancels any pending round.
    fn check_for_winner(&mut self) {
        if self.concluded || self.playing.len() != 1 {
            return;
        }
        let conn = self.playing[0];
        if let Some(winner) = self
            .all_players
            .iter_mut()
            .find(|p| p.connection_id == conn)
        {
            winner.play_status = PlayStatus::Won;
            winner.scoreboard_status = ScoreboardStatus::Regular;
            info!(
                match_id = %self.id,
                %conn,
                name = %winner.display_name,
                "winner declared"
            );
        }
        self.next_elimination = None;
        self.concluded = true;
        self.dirty = true;
    }

    // -----------------------------------------------------------------
    // Deadlines — the timer surface the lobby actor drives
    // -----------------------------------------------------------------

    /// When the next scheduled transition is due: the end of the pre-game
    /// window while forming, the next elimination round while active,
    /// nothing once concluded.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.concluded {
            return None;
        }
        if !self.started {
            return Some(self.start_time);
        }
        self.next_elimination.map(|e| e.scheduled_at)
    }

    /// Performs the transition for a due deadline. Safe to call early or
    /// spuriously — a deadline that is not actually due is a no-op.
    pub fn handle_deadline(&mut self, now: Instant) {
        if self.concluded {
            return;
        }
        if !self.started {
            if now >= self.start_time {
                self.started = true;
                self.schedule_next_elimination(now, Duration::ZERO);
                self.rank(now);
            }
            return;
        }
        if self
            .next_elimination
            .is_some_and(|e| now >= e.scheduled_at)
        {
            self.execute_elimination(now);
        }
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Produces the immutable wire snapshot: rank-ordered players and
    /// absolute timestamps. Internal state (dirty flag, counters,
    /// deadlines) never leaks here.
    pub fn snapshot(&self, now: Instant) -> MatchSnapshot {
        MatchSnapshot {
            id: self.id,
            current_server_time: self.clock.wall_ms(now),
            players: self
                .all_players
                .iter()
                .map(MatchPlayer::snapshot)
                .collect(),
            start_time: self.clock.wall_ms(self.start_time),
            join_until: self.clock.wall_ms(self.join_until),
            next_elimination: self
                .next_elimination
                .map(|e| self.clock.wall_ms(e.scheduled_at)),
        }
    }
}
