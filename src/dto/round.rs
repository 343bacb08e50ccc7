//! Wire representation of round snapshots and player intents.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    controller::{Notice, NoticeKind, RoundSnapshot, ScoredAnswer},
    round_machine::RoundPhase,
    streak::StreakRecord,
};

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseView {
    Idle,
    Loading,
    AwaitingAnswer,
    Scored,
}

impl From<RoundPhase> for PhaseView {
    fn from(phase: RoundPhase) -> Self {
        match phase {
            RoundPhase::Idle => PhaseView::Idle,
            RoundPhase::Loading => PhaseView::Loading,
            RoundPhase::AwaitingAnswer => PhaseView::AwaitingAnswer,
            RoundPhase::Scored => PhaseView::Scored,
        }
    }
}

/// The live fact. Truth and original text stay hidden until the round is scored.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct FactView {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_true: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct ResultView {
    pub guess: bool,
    pub correct: bool,
}

impl From<ScoredAnswer> for ResultView {
    fn from(value: ScoredAnswer) -> Self {
        Self {
            guess: value.guess,
            correct: value.correct,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
pub struct StreakView {
    pub current: u32,
    pub highest: u32,
}

impl From<StreakRecord> for StreakView {
    fn from(value: StreakRecord) -> Self {
        Self {
            current: value.current,
            highest: value.highest,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKindView {
    FactUnavailable,
    StreakNotSaved,
    StreakNotLoaded,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct NoticeView {
    pub kind: NoticeKindView,
    pub message: String,
}

impl From<Notice> for NoticeView {
    fn from(notice: Notice) -> Self {
        let kind = match notice.kind {
            NoticeKind::FactUnavailable => NoticeKindView::FactUnavailable,
            NoticeKind::StreakNotSaved => NoticeKindView::StreakNotSaved,
            NoticeKind::StreakNotLoaded => NoticeKindView::StreakNotLoaded,
        };
        Self {
            kind,
            message: notice.message,
        }
    }
}

/// Snapshot of one game session as shown to its player.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct RoundView {
    pub session_id: Uuid,
    pub round: u64,
    pub version: usize,
    /// Increases with every published change; clients keep the highest seen.
    pub revision: u64,
    pub phase: PhaseView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact: Option<FactView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
    pub streak: StreakView,
    /// True while an answer is being scored.
    pub answering: bool,
    /// True until the latest streak has reached the profile store.
    pub saving: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<NoticeView>,
}

impl From<RoundSnapshot> for RoundView {
    fn from(snapshot: RoundSnapshot) -> Self {
        let disclose = snapshot.phase == RoundPhase::Scored;
        let fact = snapshot.fact.map(|fact| FactView {
            text: fact.text,
            is_true: disclose.then_some(fact.is_true),
            original_text: fact.original_text.filter(|_| disclose),
        });

        Self {
            session_id: snapshot.session_id,
            round: snapshot.round,
            version: snapshot.version,
            revision: snapshot.revision,
            phase: snapshot.phase.into(),
            fact,
            result: snapshot.result.map(Into::into),
            streak: snapshot.streak.into(),
            answering: snapshot.answering,
            saving: snapshot.saving,
            authenticated: snapshot.player.is_some(),
            username: snapshot.player.map(|identity| identity.username),
            notice: snapshot.notice.map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerRequest {
    /// `true` for "fact", `false` for "fiction".
    pub guess: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Fact;

    fn snapshot(phase: RoundPhase) -> RoundSnapshot {
        RoundSnapshot {
            session_id: Uuid::nil(),
            round: 3,
            version: 7,
            revision: 11,
            phase,
            fact: Some(Fact::fiction("Bats are blind.", "Bats can see.")),
            result: None,
            streak: StreakRecord::new(2, 5),
            answering: false,
            saving: false,
            player: None,
            notice: None,
        }
    }

    #[test]
    fn truth_is_hidden_while_awaiting_answer() {
        let view = RoundView::from(snapshot(RoundPhase::AwaitingAnswer));
        let fact = view.fact.unwrap();
        assert_eq!(fact.is_true, None);
        assert_eq!(fact.original_text, None);

        let json = serde_json::to_value(RoundView::from(snapshot(RoundPhase::AwaitingAnswer)))
            .unwrap();
        assert_eq!(json["phase"], "awaiting_answer");
        assert!(json["fact"].get("is_true").is_none());
    }

    #[test]
    fn truth_is_disclosed_once_scored() {
        let view = RoundView::from(snapshot(RoundPhase::Scored));
        let fact = view.fact.unwrap();
        assert_eq!(fact.is_true, Some(false));
        assert_eq!(fact.original_text.as_deref(), Some("Bats can see."));
        assert!(!view.authenticated);
    }
}
