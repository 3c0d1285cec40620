use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::stats::PlayerStats;

/// Which statistic feeds a quest's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestType {
    /// Longest consecutive-correct run
    Streak,
    /// Accuracy percentage of the quest's `topic`
    TopicAccuracy,
    GamesPlayed,
    GamesWon,
    CorrectAnswers,
    /// Progress is driven by whoever assigned the quest
    Generic,
}

/// A short-lived objective that grants XP once completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: String,
    #[serde(rename = "type")]
    pub quest_type: QuestType,
    pub description: String,
    #[serde(default)]
    pub progress: u32,
    pub target: u32,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub reward_xp: u32,
    /// Only meaningful for `TopicAccuracy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Quest {
    pub fn new(
        id: impl Into<String>,
        quest_type: QuestType,
        description: impl Into<String>,
        target: u32,
        reward_xp: u32,
    ) -> Self {
        Self {
            id: id.into(),
            quest_type,
            description: description.into(),
            progress: 0,
            target,
            is_completed: false,
            reward_xp,
            topic: None,
        }
    }

    pub fn for_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    fn ensure_valid(&self) -> Result<(), LedgerError> {
        if self.target == 0 {
            return Err(LedgerError::InvalidQuest {
                id: self.id.clone(),
                target: self.target,
            });
        }
        Ok(())
    }
}

/// Result of one pass over the quest list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestEvaluation {
    pub quests: Vec<Quest>,
    /// Quests that went from incomplete to complete in this pass
    pub newly_completed: Vec<Quest>,
}

impl QuestEvaluation {
    /// XP owed for the completions in this pass
    pub fn earned_xp(&self) -> u64 {
        self.newly_completed
            .iter()
            .map(|q| u64::from(q.reward_xp))
            .sum()
    }
}

/// Current value of the statistic a quest tracks
fn stat_value(quest: &Quest, stats: &PlayerStats) -> u32 {
    let saturate = |v: u64| v.min(u64::from(u32::MAX)) as u32;
    match quest.quest_type {
        QuestType::Streak => stats.longest_streak,
        QuestType::TopicAccuracy => quest
            .topic
            .as_deref()
            .map_or(0, |topic| stats.topic_accuracy(topic)),
        QuestType::GamesPlayed => saturate(stats.total_games_played),
        QuestType::GamesWon => saturate(stats.total_games_won),
        QuestType::CorrectAnswers => saturate(stats.total_turns_won),
        QuestType::Generic => quest.progress,
    }
}

/// Recompute progress and completion for every quest against a snapshot.
///
/// Completion never reverts once set. A quest with a zero target fails the
/// whole evaluation.
pub fn evaluate_progress(
    quests: &[Quest],
    stats: &PlayerStats,
) -> Result<QuestEvaluation, LedgerError> {
    let mut evaluated = Vec::with_capacity(quests.len());
    let mut newly_completed = Vec::new();

    for quest in quests {
        quest.ensure_valid()?;

        let progress = stat_value(quest, stats);
        let mut next = quest.clone();
        next.progress = progress;
        next.is_completed = quest.is_completed || progress >= quest.target;

        if next.is_completed && !quest.is_completed {
            newly_completed.push(next.clone());
        }
        evaluated.push(next);
    }

    Ok(QuestEvaluation {
        quests: evaluated,
        newly_completed,
    })
}

/// Progress bar fill, clamped to 100
pub fn progress_percent(quest: &Quest) -> Result<u32, LedgerError> {
    quest.ensure_valid()?;
    let pct = crate::stats::percent(u64::from(quest.progress), u64::from(quest.target));
    Ok(pct.min(100))
}

/// Holds the active quest list between evaluations
#[derive(Debug, Clone, Default)]
pub struct QuestEngine {
    quests: Vec<Quest>,
}

impl QuestEngine {
    pub fn new(quests: Vec<Quest>) -> Self {
        Self { quests }
    }

    pub fn quests(&self) -> &[Quest] {
        &self.quests
    }

    pub fn into_quests(self) -> Vec<Quest> {
        self.quests
    }

    /// Swap in a freshly assigned quest list, e.g. when the old ones expire
    pub fn replace(&mut self, quests: Vec<Quest>) {
        self.quests = quests;
    }

    /// Re-evaluate against `stats` and return the quests that just completed.
    /// On error the held quests are left untouched.
    pub fn apply(&mut self, stats: &PlayerStats) -> Result<Vec<Quest>, LedgerError> {
        let evaluation = evaluate_progress(&self.quests, stats)?;
        self.quests = evaluation.quests;
        Ok(evaluation.newly_completed)
    }

    /// XP of every completed quest currently held
    pub fn earned_xp(&self) -> u64 {
        self.quests
            .iter()
            .filter(|q| q.is_completed)
            .map(|q| u64::from(q.reward_xp))
            .sum()
    }
}
