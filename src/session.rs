use std::time::Duration;

use crate::error::LedgerError;
use crate::stats::MissedQuestion;

/// Everything the ledger needs to know about one finished game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub topic_name: String,
    pub won: bool,
    pub turns_won: u64,
    pub turns_lost: u64,
    pub duration_ms: u64,
    /// Longest run of consecutive correct answers within this game
    pub best_streak: u32,
    /// Oldest first
    pub missed: Vec<MissedQuestion>,
}

impl GameOutcome {
    pub fn new(topic_name: impl Into<String>, won: bool) -> Self {
        Self {
            topic_name: topic_name.into(),
            won,
            turns_won: 0,
            turns_lost: 0,
            duration_ms: 0,
            best_streak: 0,
            missed: Vec::new(),
        }
    }

    /// Rejects outcomes no real game could produce
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.topic_name.trim().is_empty() {
            return Err(LedgerError::InvalidOutcome(
                "topic name must not be empty".into(),
            ));
        }
        if u64::from(self.best_streak) > self.turns_won {
            return Err(LedgerError::InvalidOutcome(format!(
                "streak of {} exceeds {} correct answers",
                self.best_streak, self.turns_won
            )));
        }
        if self.missed.len() as u64 > self.turns_lost {
            return Err(LedgerError::InvalidOutcome(format!(
                "{} missed questions exceed {} wrong answers",
                self.missed.len(),
                self.turns_lost
            )));
        }
        Ok(())
    }
}

/// Accumulates a game turn by turn and produces its `GameOutcome`
#[derive(Debug, Clone)]
pub struct GameSession {
    pub topic_name: String,
    pub turns_won: u64,
    pub turns_lost: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub missed: Vec<MissedQuestion>,
}

impl GameSession {
    pub fn new(topic_name: impl Into<String>) -> Self {
        Self {
            topic_name: topic_name.into(),
            turns_won: 0,
            turns_lost: 0,
            current_streak: 0,
            best_streak: 0,
            missed: Vec::new(),
        }
    }

    pub fn record_turn(&mut self, correct: bool) {
        if correct {
            self.turns_won += 1;
            self.current_streak += 1;
            self.best_streak = self.best_streak.max(self.current_streak);
        } else {
            self.turns_lost += 1;
            self.current_streak = 0;
        }
    }

    /// Records an incorrect turn along with the question for review
    pub fn record_miss(&mut self, missed: MissedQuestion) {
        self.record_turn(false);
        self.missed.push(missed);
    }

    pub fn turns_played(&self) -> u64 {
        self.turns_won.saturating_add(self.turns_lost)
    }

    pub fn finish(self, won: bool, duration: Duration) -> GameOutcome {
        GameOutcome {
            topic_name: self.topic_name,
            won,
            turns_won: self.turns_won,
            turns_lost: self.turns_lost,
            duration_ms: duration.as_millis().min(u64::MAX as u128) as u64,
            best_streak: self.best_streak,
            missed: self.missed,
        }
    }
}
