use crate::dao::models::StreakEntity;

/// Consecutive-correct-answer counters tracked for a player.
///
/// `highest` never drops below `current` once a record has been updated through
/// [`StreakRecord::record`] or normalised through [`StreakRecord::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakRecord {
    /// Number of correct answers in a row.
    pub current: u32,
    /// Best run ever reached by the player.
    pub highest: u32,
}

impl StreakRecord {
    /// Build a record, lifting `highest` up to `current` when a store hands back
    /// inconsistent counters.
    pub fn new(current: u32, highest: u32) -> Self {
        Self {
            current,
            highest: highest.max(current),
        }
    }

    /// Apply the outcome of a scored answer.
    pub fn record(&mut self, correct: bool) {
        self.current = if correct {
            self.current.saturating_add(1)
        } else {
            0
        };
        self.highest = self.highest.max(self.current);
    }

    /// Fold in a best run observed elsewhere (another device, the store).
    pub fn merge_highest(&mut self, highest: u32) {
        self.highest = self.highest.max(highest).max(self.current);
    }
}

impl From<StreakEntity> for StreakRecord {
    fn from(value: StreakEntity) -> Self {
        Self::new(value.current_streak, value.highest_streak)
    }
}

impl From<StreakRecord> for StreakEntity {
    fn from(value: StreakRecord) -> Self {
        Self {
            current_streak: value.current,
            highest_streak: value.highest,
        }
    }
}
