// Library surface shared by the binary and the integration tests.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod persistence;
pub mod quest;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{BackendError, LedgerError};
pub use quest::{evaluate_progress, progress_percent, Quest, QuestEngine, QuestEvaluation, QuestType};
pub use session::{GameOutcome, GameSession};
pub use stats::{MissedQuestion, PlayerStats, TopicStats};
pub use store::StatsStore;
