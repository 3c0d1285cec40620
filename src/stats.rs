use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::LedgerError;

/// Number of missed questions surfaced for review by default
pub const DEFAULT_REVIEW_LIMIT: usize = 5;

/// A question the player answered incorrectly, kept for later review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedQuestion {
    pub question: String,
    pub player_answer: String,
    pub correct_answer: String,
}

impl MissedQuestion {
    pub fn new(
        question: impl Into<String>,
        player_answer: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            player_answer: player_answer.into(),
            correct_answer: correct_answer.into(),
        }
    }
}

/// Per-topic history, one entry per distinct topic ever played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStats {
    pub topic_name: String,
    pub games_played: u64,
    pub turns_won: u64,
    pub turns_lost: u64,
    pub total_time_ms: u64,
    /// Epoch milliseconds
    pub first_played: i64,
    /// Epoch milliseconds
    pub last_played: i64,
    /// Oldest first
    #[serde(default)]
    pub missed_questions: Vec<MissedQuestion>,
}

impl TopicStats {
    pub fn new(topic_name: impl Into<String>, now_ms: i64) -> Self {
        Self {
            topic_name: topic_name.into(),
            games_played: 0,
            turns_won: 0,
            turns_lost: 0,
            total_time_ms: 0,
            first_played: now_ms,
            last_played: now_ms,
            missed_questions: Vec::new(),
        }
    }

    pub fn accuracy(&self) -> u32 {
        percent(self.turns_won, self.questions_answered())
    }

    pub fn questions_answered(&self) -> u64 {
        self.turns_won.saturating_add(self.turns_lost)
    }

    /// The most recent `limit` missed questions, oldest first
    pub fn recent_missed(&self, limit: usize) -> &[MissedQuestion] {
        let start = self.missed_questions.len().saturating_sub(limit);
        &self.missed_questions[start..]
    }
}

/// Lifetime statistics for the player. This is the whole persisted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub total_games_played: u64,
    pub total_games_won: u64,
    pub total_games_lost: u64,
    pub total_turns_won: u64,
    pub total_turns_lost: u64,
    pub total_time_played_ms: u64,
    pub longest_streak: u32,
    #[serde(default)]
    pub topics: Vec<TopicStats>,
}

impl PlayerStats {
    /// Rounded percentage of games won, 0 before any game is played
    pub fn win_rate(&self) -> u32 {
        percent(self.total_games_won, self.total_games_played)
    }

    /// Rounded percentage of questions answered correctly
    pub fn turn_accuracy(&self) -> u32 {
        percent(self.total_turns_won, self.questions_answered())
    }

    /// Accuracy for a single topic; 0 for topics never played
    pub fn topic_accuracy(&self, topic_name: &str) -> u32 {
        self.topic(topic_name).map_or(0, TopicStats::accuracy)
    }

    pub fn questions_answered(&self) -> u64 {
        self.total_turns_won.saturating_add(self.total_turns_lost)
    }

    pub fn topic(&self, topic_name: &str) -> Option<&TopicStats> {
        self.topics.iter().find(|t| t.topic_name == topic_name)
    }

    pub fn topic_mut(&mut self, topic_name: &str) -> Option<&mut TopicStats> {
        self.topics.iter_mut().find(|t| t.topic_name == topic_name)
    }

    /// Missed questions across every tracked topic
    pub fn missed_total(&self) -> usize {
        self.topics.iter().map(|t| t.missed_questions.len()).sum()
    }

    /// The review slice for a topic, empty when the topic is unknown
    pub fn recent_missed(&self, topic_name: &str, limit: usize) -> &[MissedQuestion] {
        self.topic(topic_name)
            .map_or(&[][..], |t| t.recent_missed(limit))
    }

    pub fn is_empty(&self) -> bool {
        self == &PlayerStats::default()
    }

    /// Checks the invariants a decoded record must satisfy before it is trusted
    pub fn validate(&self) -> Result<(), LedgerError> {
        let decided = self.total_games_won.checked_add(self.total_games_lost);
        if decided.map_or(true, |n| n > self.total_games_played) {
            return Err(LedgerError::CorruptedStore(format!(
                "{} won + {} lost exceeds {} played",
                self.total_games_won, self.total_games_lost, self.total_games_played
            )));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if topic.topic_name.is_empty() {
                return Err(LedgerError::CorruptedStore("empty topic name".into()));
            }
            if !seen.insert(topic.topic_name.as_str()) {
                return Err(LedgerError::CorruptedStore(format!(
                    "duplicate topic `{}`",
                    topic.topic_name
                )));
            }
            if topic.first_played > topic.last_played {
                return Err(LedgerError::CorruptedStore(format!(
                    "topic `{}` was last played before it was first played",
                    topic.topic_name
                )));
            }
        }

        Ok(())
    }
}

/// `part / whole` as a percentage rounded half up, 0 when `whole` is 0
pub fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    let part = part as u128;
    let whole = whole as u128;
    ((part * 200 + whole) / (whole * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn topic(name: &str, won: u64, lost: u64) -> TopicStats {
        TopicStats {
            turns_won: won,
            turns_lost: lost,
            games_played: 1,
            ..TopicStats::new(name, 1_000)
        }
    }

    #[test]
    fn test_percent_zero_denominator() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(percent(4, 5), 80);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(1, 200), 1); // 0.5
        assert_eq!(percent(7, 7), 100);
    }

    #[test]
    fn test_rates_on_default_stats() {
        let stats = PlayerStats::default();
        assert_eq!(stats.win_rate(), 0);
        assert_eq!(stats.turn_accuracy(), 0);
        assert_eq!(stats.topic_accuracy("Math"), 0);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_win_rate_and_accuracy() {
        let stats = PlayerStats {
            total_games_played: 4,
            total_games_won: 3,
            total_games_lost: 1,
            total_turns_won: 9,
            total_turns_lost: 3,
            ..PlayerStats::default()
        };
        assert_eq!(stats.win_rate(), 75);
        assert_eq!(stats.turn_accuracy(), 75);
        assert_eq!(stats.questions_answered(), 12);
    }

    #[test]
    fn test_topic_lookup_is_case_sensitive() {
        let stats = PlayerStats {
            topics: vec![topic("Math", 4, 1)],
            ..PlayerStats::default()
        };
        assert!(stats.topic("Math").is_some());
        assert!(stats.topic("math").is_none());
        assert_eq!(stats.topic_accuracy("Math"), 80);
        assert_eq!(stats.topic_accuracy("math"), 0);
    }

    #[test]
    fn test_recent_missed_returns_tail_in_order() {
        let mut t = topic("History", 0, 7);
        for i in 0..7 {
            t.missed_questions
                .push(MissedQuestion::new(format!("q{i}"), "a", "b"));
        }
        let recent = t.recent_missed(DEFAULT_REVIEW_LIMIT);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].question, "q2");
        assert_eq!(recent[4].question, "q6");

        assert_eq!(t.recent_missed(100).len(), 7);
        assert!(t.recent_missed(0).is_empty());
    }

    #[test]
    fn test_recent_missed_unknown_topic() {
        let stats = PlayerStats::default();
        assert!(stats.recent_missed("Nope", 5).is_empty());
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let mut t = topic("Math", 4, 1);
        t.missed_questions.push(MissedQuestion::new("2+2", "5", "4"));
        let stats = PlayerStats {
            total_games_played: 1,
            total_games_won: 1,
            topics: vec![t],
            ..PlayerStats::default()
        };

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["totalGamesPlayed"], 1);
        assert_eq!(value["totalTimePlayedMs"], 0);
        assert_eq!(value["longestStreak"], 0);
        assert_eq!(value["topics"][0]["topicName"], "Math");
        assert_eq!(value["topics"][0]["firstPlayed"], 1_000);
        assert_eq!(
            value["topics"][0]["missedQuestions"][0]["playerAnswer"],
            "5"
        );
        assert_eq!(
            value["topics"][0]["missedQuestions"][0]["correctAnswer"],
            "4"
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_topics() {
        let stats = PlayerStats {
            topics: vec![topic("Math", 1, 0), topic("Math", 2, 0)],
            ..PlayerStats::default()
        };
        assert_matches!(stats.validate(), Err(LedgerError::CorruptedStore(_)));
    }

    #[test]
    fn test_validate_rejects_impossible_game_counts() {
        let stats = PlayerStats {
            total_games_played: 1,
            total_games_won: 1,
            total_games_lost: 1,
            ..PlayerStats::default()
        };
        assert_matches!(stats.validate(), Err(LedgerError::CorruptedStore(_)));
    }

    #[test]
    fn test_validate_rejects_overflowing_game_counts() {
        let stats = PlayerStats {
            total_games_played: u64::MAX,
            total_games_won: u64::MAX,
            total_games_lost: 1,
            ..PlayerStats::default()
        };
        assert_matches!(stats.validate(), Err(LedgerError::CorruptedStore(_)));
    }

    #[test]
    fn test_turn_sums_saturate_at_max() {
        let stats = PlayerStats {
            total_turns_won: u64::MAX,
            total_turns_lost: 1,
            topics: vec![topic("Math", u64::MAX, 1)],
            ..PlayerStats::default()
        };
        assert_eq!(stats.questions_answered(), u64::MAX);
        assert_eq!(stats.turn_accuracy(), 100);
        assert_eq!(stats.topic("Math").unwrap().questions_answered(), u64::MAX);
        assert_eq!(stats.topic_accuracy("Math"), 100);
    }

    #[test]
    fn test_validate_rejects_reversed_timestamps() {
        let mut t = topic("Math", 1, 0);
        t.first_played = 10;
        t.last_played = 5;
        let stats = PlayerStats {
            topics: vec![t],
            ..PlayerStats::default()
        };
        assert_matches!(stats.validate(), Err(LedgerError::CorruptedStore(_)));
    }

    #[test]
    fn test_validate_accepts_default() {
        assert!(PlayerStats::default().validate().is_ok());
    }
}
