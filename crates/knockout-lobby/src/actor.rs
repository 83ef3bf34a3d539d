//! Match actor: an isolated Tokio task that owns one [`Match`].
//!
//! Each match runs in its own task, communicating with the outside world
//! through an mpsc channel — no shared mutable state, just message
//! passing. The task multiplexes three event sources:
//!
//! 1. commands from connection handlers,
//! 2. the broadcast flush tick (coalesces bursts of mutations into at
//!    most one `matchUpdate` per interval),
//! 3. the match's next deadline (game start, elimination rounds).
//!
//! The deadline is re-read from match state on every loop iteration, so
//! a round canceled by an early winner simply stops being armed — a
//! superseded deadline can never fire.

use std::collections::HashMap;

use knockout_match::{Match, MatchPlayer};
use knockout_protocol::{
    ConnectionId, MatchId, MatchSnapshot, PlayStatus, ServerEvent,
};
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior};

use crate::LobbyError;

/// Channel sender for delivering server events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Command channel size per match actor.
const CHANNEL_SIZE: usize = 64;

/// Commands sent to a match actor through its channel.
pub(crate) enum MatchCommand {
    /// Commit a player into the match. The joinability re-check happens
    /// here, inside the actor, so a pre-check racing another join cannot
    /// overfill the match.
    Join {
        conn: ConnectionId,
        display_name: Option<String>,
        sender: EventSender,
        reply: oneshot::Sender<Result<MatchSnapshot, LobbyError>>,
    },

    /// Voluntary departure. The connection stays alive but stops
    /// receiving this match's broadcasts.
    Leave { conn: ConnectionId },

    /// The connection dropped: mark it disconnected and eliminate it if
    /// it was still playing.
    Disconnect { conn: ConnectionId },

    /// Give up without leaving — the player keeps spectating.
    SelfEliminate { conn: ConnectionId },

    /// Score/state report from the player.
    Update {
        conn: ConnectionId,
        points: f64,
        field: Option<serde_json::Value>,
    },

    /// Request a current snapshot.
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },

    /// Request match metadata.
    Info { reply: oneshot::Sender<MatchInfo> },

    /// Stop the actor.
    Shutdown,
}

/// Match metadata for registry-level decisions (not the full snapshot).
#[derive(Debug, Clone)]
pub struct MatchInfo {
    pub match_id: MatchId,
    pub joinable: bool,
    pub player_count: usize,
    pub max_players: usize,
    pub concluded: bool,
}

/// Handle to a running match actor.
///
/// Cheap to clone — an `mpsc::Sender` wrapper. The registry holds one
/// per match.
#[derive(Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Sends a join request and waits for the commit result.
    pub async fn join(
        &self,
        conn: ConnectionId,
        display_name: Option<String>,
        sender: EventSender,
    ) -> Result<MatchSnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(MatchCommand::Join {
                conn,
                display_name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| LobbyError::Unavailable(self.match_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.match_id))?
    }

    pub async fn leave(&self, conn: ConnectionId) -> Result<(), LobbyError> {
        self.send(MatchCommand::Leave { conn }).await
    }

    pub async fn disconnect(
        &self,
        conn: ConnectionId,
    ) -> Result<(), LobbyError> {
        self.send(MatchCommand::Disconnect { conn }).await
    }

    pub async fn self_eliminate(
        &self,
        conn: ConnectionId,
    ) -> Result<(), LobbyError> {
        self.send(MatchCommand::SelfEliminate { conn }).await
    }

    pub async fn update(
        &self,
        conn: ConnectionId,
        points: f64,
        field: Option<serde_json::Value>,
    ) -> Result<(), LobbyError> {
        self.send(MatchCommand::Update { conn, points, field }).await
    }

    pub async fn snapshot(&self) -> Result<MatchSnapshot, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MatchCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.match_id))
    }

    pub async fn info(&self) -> Result<MatchInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MatchCommand::Info { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.match_id))
    }

    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.send(MatchCommand::Shutdown).await
    }

    async fn send(&self, cmd: MatchCommand) -> Result<(), LobbyError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| LobbyError::Unavailable(self.match_id))
    }
}

/// The internal match actor state. Runs inside a Tokio task.
struct MatchActor {
    state: Match,
    /// Per-connection outbound channels registered at join time.
    senders: HashMap<ConnectionId, EventSender>,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl MatchActor {
    async fn run(mut self, flush_jitter_us: u64) {
        let match_id = self.state.id();
        tracing::info!(%match_id, "match actor started");

        let flush_interval = self.state.config().flush_interval;
        let jitter = if flush_jitter_us > 0 {
            let us = rand::rng().random_range(0..flush_jitter_us);
            Duration::from_micros(us)
        } else {
            Duration::ZERO
        };
        let mut flush = tokio::time::interval_at(
            Instant::now() + flush_interval + jitter,
            flush_interval,
        );
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Re-armed from current state each iteration, so a canceled
            // round or a declared winner immediately disarms the timer.
            let deadline = self.state.next_deadline();

            tokio::select! {
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(MatchCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
                _ = flush.tick() => {
                    self.flush();
                }
                _ = deadline_sleep(deadline) => {
                    self.state.handle_deadline(Instant::now());
                }
            }
        }

        tracing::info!(%match_id, "match actor stopped");
    }

    fn handle_command(&mut self, cmd: MatchCommand) {
        let now = Instant::now();
        match cmd {
            MatchCommand::Join {
                conn,
                display_name,
                sender,
                reply,
            } => {
                let result = self.handle_join(conn, display_name, sender, now);
                let _ = reply.send(result);
            }
            MatchCommand::Leave { conn } => {
                // A voluntary leave is a disconnect from the match's point
                // of view: the player is flagged offline before any
                // elimination, so snapshots never show a leaver as
                // connected.
                self.senders.remove(&conn);
                self.state.handle_disconnect(conn, now);
                tracing::info!(
                    match_id = %self.state.id(),
                    %conn,
                    "player left match"
                );
            }
            MatchCommand::Disconnect { conn } => {
                self.senders.remove(&conn);
                self.state.handle_disconnect(conn, now);
            }
            MatchCommand::SelfEliminate { conn } => {
                // sender kept: the player spectates the rest of the match
                self.state.determine_placement(
                    conn,
                    PlayStatus::Eliminated,
                    now,
                );
            }
            MatchCommand::Update { conn, points, field } => {
                self.state.receive_player_update(conn, points, field, now);
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot(now));
            }
            MatchCommand::Info { reply } => {
                let _ = reply.send(MatchInfo {
                    match_id: self.state.id(),
                    joinable: self.state.is_joinable(now),
                    player_count: self.state.player_count(),
                    max_players: self.state.config().max_players,
                    concluded: self.state.is_concluded(),
                });
            }
            MatchCommand::Shutdown => unreachable!("handled in run loop"),
        }
    }

    /// The commit side of the two-phase join: joinability is re-checked
    /// here under the actor's serial execution. The sender is registered
    /// only after the state machine accepts the player, so a refused join
    /// leaves no membership behind.
    fn handle_join(
        &mut self,
        conn: ConnectionId,
        display_name: Option<String>,
        sender: EventSender,
        now: Instant,
    ) -> Result<MatchSnapshot, LobbyError> {
        if !self.state.is_joinable(now) {
            return Err(LobbyError::NotJoinable(self.state.id()));
        }
        self.state
            .add_player(MatchPlayer::new(conn, display_name), now)
            .map_err(|err| {
                tracing::debug!(
                    match_id = %self.state.id(),
                    %conn,
                    %err,
                    "join refused at commit"
                );
                LobbyError::NotJoinable(self.state.id())
            })?;
        self.senders.insert(conn, sender);
        Ok(self.state.snapshot(now))
    }

    /// The broadcast coalescer: one flush tick forwards at most one
    /// snapshot per match, no matter how many mutations landed since the
    /// previous tick. A clean match is skipped entirely.
    fn flush(&mut self) {
        if !self.state.take_dirty() {
            return;
        }
        let event = ServerEvent::MatchUpdate {
            snapshot: self.state.snapshot(Instant::now()),
        };
        for sender in self.senders.values() {
            // a closed receiver means the connection is tearing down;
            // its Disconnect command is already on its way
            let _ = sender.send(event.clone());
        }
    }
}

/// Sleeps until the deadline, or forever when there is none.
async fn deadline_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns a match actor task and returns the handle to it.
pub(crate) fn spawn_match(state: Match, flush_jitter_us: u64) -> MatchHandle {
    let match_id = state.id();
    let (tx, rx) = mpsc::channel(CHANNEL_SIZE);

    let actor = MatchActor {
        state,
        senders: HashMap::new(),
        receiver: rx,
    };
    tokio::spawn(actor.run(flush_jitter_us));

    MatchHandle {
        match_id,
        sender: tx,
    }
}
