use thiserror::Error;

/// Failures raised by a persistence backend while reading or writing the
/// serialized stats record.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend rejected the write: {0}")]
    Rejected(String),
}

/// Errors surfaced by the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The persisted record could not be decoded or failed validation.
    /// Only produced while loading; `StatsStore::open` recovers from it.
    #[error("stored stats record is unusable: {0}")]
    CorruptedStore(String),

    /// The mutation was applied in memory but did not reach durable storage.
    #[error("stats were updated but could not be saved: {0}")]
    PersistenceWrite(#[source] BackendError),

    #[error("quest `{id}` has invalid target {target}")]
    InvalidQuest { id: String, target: u32 },

    #[error("invalid game outcome: {0}")]
    InvalidOutcome(String),
}

impl LedgerError {
    /// Write failures leave the in-memory state usable.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, LedgerError::PersistenceWrite(_))
    }
}
