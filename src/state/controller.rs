//! Per-session round controller: fetch a fact, take one answer, score it, move on.
//!
//! All mutable state sits behind a single async mutex. The lock is released
//! around every external call (fact fetch, profile read/write) and results are
//! matched back against the round counter and identity epoch before they are
//! applied, so late answers from abandoned work are dropped.

use std::{
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::Identity,
    dao::{
        profile_store::ProfileStore,
        storage::{StorageError, StorageResult},
    },
    facts::{Fact, FactError, FactSource},
    state::{
        round_machine::{InvalidTransition, RoundEvent, RoundPhase, RoundStateMachine},
        streak::StreakRecord,
    },
};

/// Delay before the next round starts on its own after an answer is scored.
pub const DEFAULT_ADVANCE_DELAY: Duration = Duration::from_millis(1_500);
/// Upper bound for any call to the fact source or the profile store.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// How the controller moves from `Scored` to the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancePolicy {
    /// Wait for an explicit `advance_round`.
    Manual,
    /// Start the next round automatically after the given delay.
    After(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    pub advance: AdvancePolicy,
    pub call_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            advance: AdvancePolicy::After(DEFAULT_ADVANCE_DELAY),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Category of a non-blocking problem reported to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    FactUnavailable,
    StreakNotSaved,
    StreakNotLoaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn fact_unavailable() -> Self {
        Self {
            kind: NoticeKind::FactUnavailable,
            message: "Failed to load a new fact. Please try again.".into(),
        }
    }

    fn streak_not_saved() -> Self {
        Self {
            kind: NoticeKind::StreakNotSaved,
            message: "Your streak could not be saved; it will be kept for this session.".into(),
        }
    }

    fn streak_not_loaded() -> Self {
        Self {
            kind: NoticeKind::StreakNotLoaded,
            message: "Your saved streak could not be loaded.".into(),
        }
    }
}

/// Outcome of the answer given for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredAnswer {
    pub guess: bool,
    pub correct: bool,
}

/// Full controller state published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    pub session_id: Uuid,
    pub round: u64,
    /// Phase machine version; moves on transitions only.
    pub version: usize,
    /// Bumped on every published change, transitions or not.
    pub revision: u64,
    pub phase: RoundPhase,
    pub fact: Option<Fact>,
    pub result: Option<ScoredAnswer>,
    pub streak: StreakRecord,
    /// An answer is being scored right now.
    pub answering: bool,
    /// A streak write to the profile store has not settled yet.
    pub saving: bool,
    pub player: Option<Identity>,
    pub notice: Option<Notice>,
}

/// Result of `submit_answer`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// The answer was scored. Persistence may still be running (`saving`).
    Scored(RoundSnapshot),
    /// No answer is expected right now; nothing changed.
    Ignored(RoundSnapshot),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("game session has been closed")]
    Closed,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("an answer is still being scored")]
    AnswerInFlight,
}

struct RoundState {
    machine: RoundStateMachine,
    revision: u64,
    fact: Option<Fact>,
    result: Option<ScoredAnswer>,
    streak: StreakRecord,
    answering: bool,
    saving: bool,
    identity: Option<Identity>,
    /// Bumped whenever the identity changes; stale profile reads compare against it.
    identity_epoch: u64,
    answers_scored: u64,
    /// Sequence number of the latest streak write handed to the store.
    writes_issued: u64,
    notice: Option<Notice>,
    last_active: Instant,
    closed: bool,
}

impl RoundState {
    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// Streak write captured at scoring time and run in the background.
struct PendingWrite {
    identity: Identity,
    streak: StreakRecord,
    epoch: u64,
    round: u64,
    seq: u64,
}

struct ArmedTimer {
    id: u64,
    handle: JoinHandle<()>,
}

struct ControllerInner {
    session_id: Uuid,
    facts: Arc<dyn FactSource>,
    profiles: Arc<dyn ProfileStore>,
    settings: ControllerSettings,
    state: Mutex<RoundState>,
    snapshots: broadcast::Sender<RoundSnapshot>,
    timer: Mutex<Option<ArmedTimer>>,
    next_timer_id: AtomicU64,
    /// Highest write sequence sent to the store; also serialises the writes.
    persisted: Mutex<u64>,
}

/// Cheaply cloneable handle on one player's game session.
#[derive(Clone)]
pub struct GameRoundController {
    inner: Arc<ControllerInner>,
}

impl GameRoundController {
    pub fn new(
        session_id: Uuid,
        facts: Arc<dyn FactSource>,
        profiles: Arc<dyn ProfileStore>,
        settings: ControllerSettings,
        identity: Option<Identity>,
    ) -> Self {
        let (snapshots, _rx) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ControllerInner {
                session_id,
                facts,
                profiles,
                settings,
                state: Mutex::new(RoundState {
                    machine: RoundStateMachine::new(),
                    revision: 0,
                    fact: None,
                    result: None,
                    streak: StreakRecord::default(),
                    answering: false,
                    saving: false,
                    identity,
                    identity_epoch: 0,
                    answers_scored: 0,
                    writes_issued: 0,
                    notice: None,
                    last_active: Instant::now(),
                    closed: false,
                }),
                snapshots,
                timer: Mutex::new(None),
                next_timer_id: AtomicU64::new(0),
                persisted: Mutex::new(0),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    /// Receive every snapshot published from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<RoundSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Current state. Reading counts as player activity.
    pub async fn snapshot(&self) -> RoundSnapshot {
        let mut state = self.inner.state.lock().await;
        state.touch();
        self.snapshot_of(&state)
    }

    /// Time since the player last did anything with this session.
    pub async fn idle_for(&self) -> Duration {
        let state = self.inner.state.lock().await;
        Instant::now().saturating_duration_since(state.last_active)
    }

    /// Live snapshot subscribers, e.g. open SSE streams.
    pub fn watchers(&self) -> usize {
        self.inner.snapshots.receiver_count()
    }

    /// Identity the session currently plays as.
    pub async fn identity(&self) -> Option<Identity> {
        self.inner.state.lock().await.identity.clone()
    }

    /// Move to `Loading` and fetch a fact. Returns once the fetch has settled.
    ///
    /// Fetch failures never surface as errors: the machine returns to `Idle`
    /// with a `FactUnavailable` notice and the call may simply be repeated.
    pub async fn start_round(&self) -> Result<RoundSnapshot, ControllerError> {
        let round = {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(ControllerError::Closed);
            }
            if state.answering {
                return Err(ControllerError::AnswerInFlight);
            }
            state.touch();
            state.machine.apply(RoundEvent::StartRound)?;
            state.fact = None;
            state.result = None;
            state.notice = None;
            self.publish(&mut state);
            state.machine.round()
        };
        // Leaving `Scored` by any route disarms the auto-advance.
        self.cancel_timer().await;

        let limit = self.inner.settings.call_timeout;
        let outcome = timeout(limit, self.inner.facts.fetch_fact())
            .await
            .unwrap_or(Err(FactError::Timeout(limit)));

        let mut state = self.inner.state.lock().await;
        if state.closed
            || state.machine.round() != round
            || state.machine.phase() != RoundPhase::Loading
        {
            debug!(session_id = %self.inner.session_id, round, "discarding stale fact result");
            return Ok(self.snapshot_of(&state));
        }

        match outcome {
            Ok(fact) => {
                state.machine.apply(RoundEvent::FactLoaded)?;
                state.fact = Some(fact);
            }
            Err(err) => {
                warn!(
                    session_id = %self.inner.session_id,
                    round,
                    error = %err,
                    "failed to load fact"
                );
                state.machine.apply(RoundEvent::LoadFailed)?;
                state.notice = Some(Notice::fact_unavailable());
            }
        }

        self.publish(&mut state);
        Ok(self.snapshot_of(&state))
    }

    /// Score `guess` against the live fact.
    ///
    /// Only the first answer of a round counts; anything else is reported as
    /// [`AnswerOutcome::Ignored`] without touching the state.
    pub async fn submit_answer(&self, guess: bool) -> Result<AnswerOutcome, ControllerError> {
        let (snapshot, write) = {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return Err(ControllerError::Closed);
            }
            state.touch();
            let truth = match state.fact.as_ref() {
                Some(fact) if !state.answering && state.machine.accepts(RoundEvent::AnswerSubmitted) => {
                    fact.is_true
                }
                _ => return Ok(AnswerOutcome::Ignored(self.snapshot_of(&state))),
            };

            state.machine.apply(RoundEvent::AnswerSubmitted)?;
            state.answering = true;
            let correct = guess == truth;
            state.streak.record(correct);
            state.result = Some(ScoredAnswer { guess, correct });
            state.answers_scored += 1;
            state.notice = None;

            let write = match state.identity.clone() {
                Some(identity) => {
                    state.writes_issued += 1;
                    state.saving = true;
                    Some(PendingWrite {
                        identity,
                        streak: state.streak,
                        epoch: state.identity_epoch,
                        round: state.machine.round(),
                        seq: state.writes_issued,
                    })
                }
                None => None,
            };
            state.answering = false;
            self.publish(&mut state);

            (self.snapshot_of(&state), write)
        };

        if let Some(write) = write {
            let controller = self.clone();
            tokio::spawn(async move { controller.persist_streak(write).await });
        }

        self.schedule_advance().await;
        Ok(AnswerOutcome::Scored(snapshot))
    }

    /// Push a scored streak to the profile store without holding up the round.
    ///
    /// Writes go out one at a time in scoring order; a write overtaken by a
    /// newer one is skipped. The stored highest is merged back only while the
    /// same player is still on the same round.
    async fn persist_streak(&self, write: PendingWrite) {
        let outcome = {
            let mut persisted = self.inner.persisted.lock().await;
            if *persisted > write.seq {
                None
            } else {
                let outcome = self
                    .call_store(
                        self.inner
                            .profiles
                            .update_streak(write.identity.id, write.streak.into()),
                    )
                    .await;
                *persisted = write.seq;
                Some(outcome)
            }
        };

        let mut state = self.inner.state.lock().await;
        if state.closed {
            return;
        }
        if state.writes_issued == write.seq {
            state.saving = false;
        }
        let same_player = state.identity_epoch == write.epoch;
        match outcome {
            None => {
                debug!(session_id = %self.inner.session_id, seq = write.seq, "superseded streak write skipped");
            }
            Some(Ok(stored)) if same_player && state.machine.round() == write.round => {
                state.streak.merge_highest(stored.highest_streak);
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(
                    session_id = %self.inner.session_id,
                    user_id = %write.identity.id,
                    error = %err,
                    "failed to persist streak; keeping local value"
                );
                if same_player {
                    state.notice = Some(Notice::streak_not_saved());
                }
            }
        }
        self.publish(&mut state);
    }

    /// Leave `Scored` and start the next round, cancelling any pending auto-advance.
    pub async fn advance_round(&self) -> Result<RoundSnapshot, ControllerError> {
        {
            let state = self.inner.state.lock().await;
            if state.closed {
                return Err(ControllerError::Closed);
            }
            if state.answering {
                return Err(ControllerError::AnswerInFlight);
            }
            let phase = state.machine.phase();
            if phase != RoundPhase::Scored {
                return Err(InvalidTransition {
                    from: phase,
                    event: RoundEvent::StartRound,
                }
                .into());
            }
        }

        self.cancel_timer().await;
        self.start_round().await
    }

    /// Switch the player bound to this session.
    ///
    /// Signing out (`None`) drops the local streak back to zero. Any profile
    /// read still in flight for the previous identity is invalidated.
    pub async fn set_identity(&self, identity: Option<Identity>) -> RoundSnapshot {
        let mut state = self.inner.state.lock().await;
        state.touch();
        let current = state.identity.as_ref().map(|i| i.id);
        if current != identity.as_ref().map(|i| i.id) {
            state.identity_epoch += 1;
            if identity.is_none() {
                state.streak = StreakRecord::default();
            }
            state.identity = identity;
            self.publish(&mut state);
        }
        self.snapshot_of(&state)
    }

    /// Seed the local streak from the profile store for the bound identity.
    ///
    /// The stored value is dropped when the identity changed or an answer was
    /// scored while the read was in flight.
    pub async fn load_initial_streak(&self) -> RoundSnapshot {
        let (identity, epoch, scored) = {
            let state = self.inner.state.lock().await;
            match state.identity.clone() {
                Some(identity) if !state.closed => {
                    (identity, state.identity_epoch, state.answers_scored)
                }
                _ => return self.snapshot_of(&state),
            }
        };

        let outcome = self
            .call_store(self.inner.profiles.find_profile(identity.id))
            .await;

        let mut state = self.inner.state.lock().await;
        if state.closed || state.identity_epoch != epoch || state.answers_scored != scored {
            debug!(
                session_id = %self.inner.session_id,
                user_id = %identity.id,
                "discarding stale streak read"
            );
            return self.snapshot_of(&state);
        }

        match outcome {
            Ok(Some(profile)) => {
                state.streak = StreakRecord::new(profile.current_streak, profile.highest_streak);
            }
            Ok(None) => {
                warn!(user_id = %identity.id, "no profile stored for signed-in user");
                state.notice = Some(Notice::streak_not_loaded());
            }
            Err(err) => {
                warn!(user_id = %identity.id, error = %err, "failed to load stored streak");
                state.notice = Some(Notice::streak_not_loaded());
            }
        }

        self.publish(&mut state);
        self.snapshot_of(&state)
    }

    /// Tear the session down. In-flight fetches are discarded when they land.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            if let Err(err) = state.machine.apply(RoundEvent::Reset) {
                warn!(session_id = %self.inner.session_id, error = %err, "reset rejected");
            }
            state.fact = None;
            state.result = None;
            state.streak = StreakRecord::default();
            state.saving = false;
            self.publish(&mut state);
        }

        self.cancel_timer().await;
        info!(session_id = %self.inner.session_id, "game session closed");
    }

    async fn call_store<T>(
        &self,
        call: impl Future<Output = StorageResult<T>>,
    ) -> StorageResult<T> {
        let limit = self.inner.settings.call_timeout;
        timeout(limit, call)
            .await
            .unwrap_or(Err(StorageError::Timeout(limit)))
    }

    async fn schedule_advance(&self) {
        let AdvancePolicy::After(delay) = self.inner.settings.advance else {
            return;
        };

        // Armed under the state lock so a concurrent `start_round` either
        // sees this timer and cancels it or runs before the phase check.
        let state = self.inner.state.lock().await;
        if state.closed || state.machine.phase() != RoundPhase::Scored {
            return;
        }

        let id = self.inner.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(fire_advance(weak, id, delay));

        let mut slot = self.inner.timer.lock().await;
        if let Some(previous) = slot.replace(ArmedTimer { id, handle }) {
            previous.handle.abort();
        }
    }

    async fn cancel_timer(&self) {
        if let Some(timer) = self.inner.timer.lock().await.take() {
            timer.handle.abort();
        }
    }

    fn publish(&self, state: &mut RoundState) {
        state.revision += 1;
        // No subscribers is fine.
        let _ = self.inner.snapshots.send(self.snapshot_of(state));
    }

    fn snapshot_of(&self, state: &RoundState) -> RoundSnapshot {
        RoundSnapshot {
            session_id: self.inner.session_id,
            round: state.machine.round(),
            version: state.machine.snapshot().version,
            revision: state.revision,
            phase: state.machine.phase(),
            fact: state.fact.clone(),
            result: state.result,
            streak: state.streak,
            answering: state.answering,
            saving: state.saving,
            player: state.identity.clone(),
            notice: state.notice.clone(),
        }
    }
}

/// Body of the auto-advance timer. Holds only a weak reference so a dropped
/// session is not kept alive by its own timer.
async fn fire_advance(inner: Weak<ControllerInner>, id: u64, delay: Duration) {
    sleep(delay).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let controller = GameRoundController { inner };

    {
        let mut slot = controller.inner.timer.lock().await;
        match slot.as_ref() {
            Some(timer) if timer.id == id => {
                slot.take();
            }
            _ => return,
        }
    }

    if let Err(err) = controller.advance_round().await {
        debug!(
            session_id = %controller.inner.session_id,
            error = %err,
            "auto-advance skipped"
        );
    }
}
