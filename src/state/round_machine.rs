use thiserror::Error;

/// Phases a single round can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No fact is live; a round can be started (or retried after a failed load).
    Idle,
    /// Waiting on the fact source for the next fact.
    Loading,
    /// A fact is displayed and exactly one answer may be submitted.
    AwaitingAnswer,
    /// The answer has been scored and the outcome disclosed.
    Scored,
}

/// Events that can be applied to the round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Begin fetching a fact for a fresh round.
    StartRound,
    /// The fact source delivered a fact.
    FactLoaded,
    /// The fact source failed; the round can be retried.
    LoadFailed,
    /// The player answered the live fact.
    AnswerSubmitted,
    /// The session is being torn down.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoundPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoundEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: RoundPhase,
    /// Number of rounds started so far.
    pub round: u64,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// State machine driving the fact, answer, score loop of one player session.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    phase: RoundPhase,
    round: u64,
    version: usize,
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
            round: 0,
            version: 0,
        }
    }
}

impl RoundStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Identifier of the round currently live (or last live).
    ///
    /// Any response tagged with an older round belongs to an abandoned round and
    /// must be discarded.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            round: self.round,
            version: self.version,
        }
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;

        // Starting and resetting both invalidate whatever round was in flight.
        if matches!(event, RoundEvent::StartRound | RoundEvent::Reset) {
            self.round += 1;
        }
        self.phase = next;
        self.version += 1;

        Ok(next)
    }

    /// Check whether an event would be accepted without applying it.
    pub fn accepts(&self, event: RoundEvent) -> bool {
        self.compute_transition(event).is_ok()
    }

    fn compute_transition(&self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoundPhase::Idle | RoundPhase::Scored, RoundEvent::StartRound) => RoundPhase::Loading,
            (RoundPhase::Loading, RoundEvent::FactLoaded) => RoundPhase::AwaitingAnswer,
            (RoundPhase::Loading, RoundEvent::LoadFailed) => RoundPhase::Idle,
            (RoundPhase::AwaitingAnswer, RoundEvent::AnswerSubmitted) => RoundPhase::Scored,
            (_, RoundEvent::Reset) => RoundPhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
