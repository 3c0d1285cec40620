use chrono::Utc;
use log::{debug, warn};

use crate::error::LedgerError;
use crate::persistence::StatsBackend;
use crate::session::GameOutcome;
use crate::stats::{PlayerStats, TopicStats};

/// Owns the canonical `PlayerStats` and keeps the backend in sync with it.
///
/// Every mutation is applied in memory first and then written through as a
/// full snapshot. When the write fails the mutation is kept and the caller
/// gets `LedgerError::PersistenceWrite`; `stats()` still reflects it.
#[derive(Debug)]
pub struct StatsStore<B: StatsBackend> {
    backend: B,
    stats: PlayerStats,
    missed_retention: Option<usize>,
}

impl<B: StatsBackend> StatsStore<B> {
    /// Load the stored record, falling back to empty stats when it is missing
    /// or unusable
    pub fn open(backend: B) -> Self {
        let stats = match backend.read() {
            Ok(Some(bytes)) => decode(&bytes).unwrap_or_else(|e| {
                warn!("discarding stored stats: {e}");
                PlayerStats::default()
            }),
            Ok(None) => {
                debug!("no stored stats, starting fresh");
                PlayerStats::default()
            }
            Err(e) => {
                warn!("could not read stored stats, starting fresh: {e}");
                PlayerStats::default()
            }
        };

        Self {
            backend,
            stats,
            missed_retention: None,
        }
    }

    /// Keep at most `limit` missed questions per topic, dropping the oldest
    pub fn with_missed_retention(mut self, limit: Option<usize>) -> Self {
        self.missed_retention = limit;
        self
    }

    pub fn stats(&self) -> &PlayerStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn record_game_outcome(
        &mut self,
        outcome: &GameOutcome,
    ) -> Result<&PlayerStats, LedgerError> {
        self.record_game_outcome_at(outcome, Utc::now().timestamp_millis())
    }

    /// Same as `record_game_outcome` with an explicit clock, in epoch millis
    pub fn record_game_outcome_at(
        &mut self,
        outcome: &GameOutcome,
        now_ms: i64,
    ) -> Result<&PlayerStats, LedgerError> {
        outcome.validate()?;

        let stats = &mut self.stats;
        stats.total_games_played = stats.total_games_played.saturating_add(1);
        if outcome.won {
            stats.total_games_won = stats.total_games_won.saturating_add(1);
        } else {
            stats.total_games_lost = stats.total_games_lost.saturating_add(1);
        }
        stats.total_turns_won = stats.total_turns_won.saturating_add(outcome.turns_won);
        stats.total_turns_lost = stats.total_turns_lost.saturating_add(outcome.turns_lost);
        stats.total_time_played_ms = stats
            .total_time_played_ms
            .saturating_add(outcome.duration_ms);
        stats.longest_streak = stats.longest_streak.max(outcome.best_streak);

        let idx = match stats
            .topics
            .iter()
            .position(|t| t.topic_name == outcome.topic_name)
        {
            Some(idx) => idx,
            None => {
                debug!("tracking new topic `{}`", outcome.topic_name);
                stats
                    .topics
                    .push(TopicStats::new(outcome.topic_name.clone(), now_ms));
                stats.topics.len() - 1
            }
        };

        let topic = &mut stats.topics[idx];
        topic.games_played = topic.games_played.saturating_add(1);
        topic.turns_won = topic.turns_won.saturating_add(outcome.turns_won);
        topic.turns_lost = topic.turns_lost.saturating_add(outcome.turns_lost);
        topic.total_time_ms = topic.total_time_ms.saturating_add(outcome.duration_ms);
        topic.last_played = topic.last_played.max(now_ms);
        topic
            .missed_questions
            .extend(outcome.missed.iter().cloned());

        if let Some(limit) = self.missed_retention {
            let excess = topic.missed_questions.len().saturating_sub(limit);
            if excess > 0 {
                topic.missed_questions.drain(..excess);
            }
        }

        self.persist()?;
        Ok(&self.stats)
    }

    /// Forget the missed questions of one topic. Unknown topics are a no-op.
    pub fn clear_missed_questions(
        &mut self,
        topic_name: &str,
    ) -> Result<&PlayerStats, LedgerError> {
        let changed = match self.stats.topic_mut(topic_name) {
            Some(topic) if !topic.missed_questions.is_empty() => {
                topic.missed_questions.clear();
                true
            }
            _ => false,
        };

        if changed {
            self.persist()?;
        }
        Ok(&self.stats)
    }

    /// Remove a topic's history. Global totals are lifetime aggregates and
    /// keep the deleted topic's contribution.
    pub fn delete_topic(&mut self, topic_name: &str) -> Result<&PlayerStats, LedgerError> {
        let before = self.stats.topics.len();
        self.stats.topics.retain(|t| t.topic_name != topic_name);

        if self.stats.topics.len() != before {
            debug!("deleted topic `{topic_name}`");
            self.persist()?;
        }
        Ok(&self.stats)
    }

    /// Reset everything to the empty default
    pub fn clear_stats(&mut self) -> Result<&PlayerStats, LedgerError> {
        self.stats = PlayerStats::default();
        self.persist()?;
        Ok(&self.stats)
    }

    /// Write the current snapshot through to the backend
    pub fn persist(&mut self) -> Result<(), LedgerError> {
        let record = serde_json::to_vec_pretty(&self.stats)
            .map_err(|e| LedgerError::PersistenceWrite(e.into()))?;

        match self.backend.write(&record) {
            Ok(()) => {
                debug!("saved stats ({} bytes)", record.len());
                Ok(())
            }
            Err(e) => {
                warn!("stats not saved: {e}");
                Err(LedgerError::PersistenceWrite(e))
            }
        }
    }
}

fn decode(bytes: &[u8]) -> Result<PlayerStats, LedgerError> {
    let stats: PlayerStats = serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::CorruptedStore(e.to_string()))?;
    stats.validate()?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryBackend;
    use crate::stats::MissedQuestion;
    use assert_matches::assert_matches;

    fn math_game() -> GameOutcome {
        GameOutcome {
            turns_won: 4,
            turns_lost: 1,
            duration_ms: 60_000,
            best_streak: 4,
            missed: vec![MissedQuestion::new("2+2", "5", "4")],
            ..GameOutcome::new("Math", true)
        }
    }

    fn fresh_store() -> StatsStore<MemoryBackend> {
        StatsStore::open(MemoryBackend::new())
    }

    #[test]
    fn open_without_record_is_default() {
        let store = fresh_store();
        assert_eq!(store.stats(), &PlayerStats::default());
        assert_eq!(store.backend().writes(), 0);
    }

    #[test]
    fn open_with_garbage_falls_back_to_default() {
        let store = StatsStore::open(MemoryBackend::with_record(b"{not json".to_vec()));
        assert!(store.stats().is_empty());
    }

    #[test]
    fn open_with_invalid_record_falls_back_to_default() {
        let record = br#"{
            "totalGamesPlayed": 1, "totalGamesWon": 1, "totalGamesLost": 1,
            "totalTurnsWon": 0, "totalTurnsLost": 0, "totalTimePlayedMs": 0,
            "longestStreak": 0, "topics": []
        }"#;
        let store = StatsStore::open(MemoryBackend::with_record(record.to_vec()));
        assert!(store.stats().is_empty());
    }

    #[test]
    fn open_with_overflowing_game_counts_falls_back_to_default() {
        let record = br#"{
            "totalGamesPlayed": 18446744073709551615,
            "totalGamesWon": 18446744073709551615, "totalGamesLost": 1,
            "totalTurnsWon": 0, "totalTurnsLost": 0, "totalTimePlayedMs": 0,
            "longestStreak": 0, "topics": []
        }"#;
        let store = StatsStore::open(MemoryBackend::with_record(record.to_vec()));
        assert!(store.stats().is_empty());
    }

    #[test]
    fn open_with_saturated_turn_counts_reports_accuracy() {
        let record = br#"{
            "totalGamesPlayed": 1, "totalGamesWon": 1, "totalGamesLost": 0,
            "totalTurnsWon": 18446744073709551615, "totalTurnsLost": 1,
            "totalTimePlayedMs": 0, "longestStreak": 0, "topics": []
        }"#;
        let store = StatsStore::open(MemoryBackend::with_record(record.to_vec()));
        assert_eq!(store.stats().total_turns_won, u64::MAX);
        assert_eq!(store.stats().questions_answered(), u64::MAX);
        assert_eq!(store.stats().turn_accuracy(), 100);
    }

    #[test]
    fn record_math_game_on_empty_store() {
        let mut store = fresh_store();
        let stats = store.record_game_outcome_at(&math_game(), 1_000).unwrap();

        assert_eq!(stats.total_games_played, 1);
        assert_eq!(stats.total_games_won, 1);
        assert_eq!(stats.total_games_lost, 0);
        assert_eq!(stats.total_turns_won, 4);
        assert_eq!(stats.total_turns_lost, 1);
        assert_eq!(stats.total_time_played_ms, 60_000);
        assert_eq!(stats.longest_streak, 4);
        assert_eq!(stats.win_rate(), 100);
        assert_eq!(stats.turn_accuracy(), 80);

        let math = stats.topic("Math").unwrap();
        assert_eq!(math.games_played, 1);
        assert_eq!(math.turns_won, 4);
        assert_eq!(math.turns_lost, 1);
        assert_eq!(math.missed_questions.len(), 1);
        assert_eq!(math.first_played, 1_000);
        assert_eq!(math.last_played, 1_000);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn recorded_stats_survive_reopen() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1_000).unwrap();
        let expected = store.stats().clone();

        let backend = store.backend().clone();
        let reopened = StatsStore::open(backend);
        assert_eq!(reopened.stats(), &expected);
    }

    #[test]
    fn repeated_games_update_last_played_only() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1_000).unwrap();
        let lost = GameOutcome {
            turns_lost: 3,
            ..GameOutcome::new("Math", false)
        };
        let stats = store.record_game_outcome_at(&lost, 5_000).unwrap();

        let math = stats.topic("Math").unwrap();
        assert_eq!(math.games_played, 2);
        assert_eq!(math.first_played, 1_000);
        assert_eq!(math.last_played, 5_000);
        assert_eq!(stats.total_games_played, 2);
        assert_eq!(stats.total_games_lost, 1);
        assert_eq!(stats.win_rate(), 50);
        assert_eq!(stats.topics.len(), 1);
    }

    #[test]
    fn last_played_never_moves_backwards() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 5_000).unwrap();
        let stats = store.record_game_outcome_at(&math_game(), 2_000).unwrap();
        let math = stats.topic("Math").unwrap();
        assert_eq!(math.first_played, 5_000);
        assert_eq!(math.last_played, 5_000);
    }

    #[test]
    fn longest_streak_only_grows() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        let short = GameOutcome {
            turns_won: 2,
            best_streak: 2,
            ..GameOutcome::new("Math", true)
        };
        let stats = store.record_game_outcome_at(&short, 2).unwrap();
        assert_eq!(stats.longest_streak, 4);
    }

    #[test]
    fn games_played_always_equals_won_plus_lost() {
        let mut store = fresh_store();
        for (i, won) in [true, false, false, true, true, false].into_iter().enumerate() {
            let topic = if i % 2 == 0 { "Math" } else { "Science" };
            let stats = store
                .record_game_outcome_at(&GameOutcome::new(topic, won), i as i64)
                .unwrap();
            assert_eq!(
                stats.total_games_played,
                stats.total_games_won + stats.total_games_lost
            );
            let per_topic: u64 = stats.topics.iter().map(|t| t.games_played).sum();
            assert_eq!(per_topic, stats.total_games_played);
        }
    }

    #[test]
    fn topic_names_are_case_sensitive() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&GameOutcome::new("Math", true), 1).unwrap();
        let stats = store
            .record_game_outcome_at(&GameOutcome::new("math", true), 2)
            .unwrap();
        assert_eq!(stats.topics.len(), 2);
    }

    #[test]
    fn empty_topic_is_rejected_without_changes() {
        let mut store = fresh_store();
        assert_matches!(
            store.record_game_outcome_at(&GameOutcome::new("  ", true), 1),
            Err(LedgerError::InvalidOutcome(_))
        );
        assert!(store.stats().is_empty());
        assert_eq!(store.backend().writes(), 0);
    }

    #[test]
    fn impossible_outcomes_are_rejected_without_changes() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        let before = store.stats().clone();

        let streak = GameOutcome {
            best_streak: 50,
            ..GameOutcome::new("Math", true)
        };
        assert_matches!(
            store.record_game_outcome_at(&streak, 2),
            Err(LedgerError::InvalidOutcome(_))
        );

        let misses = GameOutcome {
            missed: vec![MissedQuestion::new("1+1", "3", "2")],
            ..GameOutcome::new("Math", false)
        };
        assert_matches!(
            store.record_game_outcome_at(&misses, 3),
            Err(LedgerError::InvalidOutcome(_))
        );

        assert_eq!(store.stats(), &before);
        assert_eq!(store.stats().longest_streak, 4);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn missed_questions_append_in_order() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        let second = GameOutcome {
            turns_lost: 2,
            missed: vec![
                MissedQuestion::new("3*3", "6", "9"),
                MissedQuestion::new("10/2", "2", "5"),
            ],
            ..GameOutcome::new("Math", false)
        };
        let stats = store.record_game_outcome_at(&second, 2).unwrap();
        let questions: Vec<&str> = stats
            .topic("Math")
            .unwrap()
            .missed_questions
            .iter()
            .map(|m| m.question.as_str())
            .collect();
        assert_eq!(questions, vec!["2+2", "3*3", "10/2"]);
    }

    #[test]
    fn retention_drops_oldest_missed_questions() {
        let mut store = fresh_store().with_missed_retention(Some(2));
        let game = GameOutcome {
            turns_lost: 3,
            missed: vec![
                MissedQuestion::new("a", "x", "y"),
                MissedQuestion::new("b", "x", "y"),
                MissedQuestion::new("c", "x", "y"),
            ],
            ..GameOutcome::new("Letters", false)
        };
        let stats = store.record_game_outcome_at(&game, 1).unwrap();
        let questions: Vec<&str> = stats
            .topic("Letters")
            .unwrap()
            .missed_questions
            .iter()
            .map(|m| m.question.as_str())
            .collect();
        assert_eq!(questions, vec!["b", "c"]);
    }

    #[test]
    fn clear_missed_questions_is_idempotent() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();

        let once = store.clear_missed_questions("Math").unwrap().clone();
        assert!(once.topic("Math").unwrap().missed_questions.is_empty());
        assert_eq!(once.total_turns_lost, 1);
        let writes = store.backend().writes();

        let twice = store.clear_missed_questions("Math").unwrap().clone();
        assert_eq!(once, twice);
        assert_eq!(store.backend().writes(), writes);
    }

    #[test]
    fn clear_missed_questions_unknown_topic_is_noop() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        let before = store.stats().clone();
        let after = store.clear_missed_questions("Geography").unwrap();
        assert_eq!(&before, after);
    }

    #[test]
    fn delete_topic_keeps_global_totals() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        store
            .record_game_outcome_at(&GameOutcome::new("Science", false), 2)
            .unwrap();

        let stats = store.delete_topic("Math").unwrap().clone();
        assert!(stats.topic("Math").is_none());
        assert!(stats.topic("Science").is_some());
        assert_eq!(stats.total_games_played, 2);
        assert_eq!(stats.total_turns_won, 4);

        let again = store.delete_topic("Math").unwrap();
        assert_eq!(&stats, again);
    }

    #[test]
    fn clear_stats_yields_default() {
        let mut store = fresh_store();
        store.record_game_outcome_at(&math_game(), 1).unwrap();
        let stats = store.clear_stats().unwrap();
        assert_eq!(stats, &PlayerStats::default());

        let reopened = StatsStore::open(store.backend().clone());
        assert!(reopened.stats().is_empty());
    }

    #[test]
    fn failed_write_keeps_in_memory_state() {
        let mut store = fresh_store();
        store.backend_mut().set_fail_writes(true);

        let result = store.record_game_outcome_at(&math_game(), 1);
        assert_matches!(result, Err(LedgerError::PersistenceWrite(_)));
        assert_eq!(store.stats().total_games_played, 1);
        assert!(store.backend().record().is_none());

        store.backend_mut().set_fail_writes(false);
        store.persist().unwrap();
        let reopened = StatsStore::open(store.backend().clone());
        assert_eq!(reopened.stats().total_games_played, 1);
    }
}
