use rusqlite::{params, Connection, OptionalExtension};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BackendError;

/// Durable home of the serialized stats record.
///
/// Backends move opaque bytes; decoding and validation live in the store so
/// every backend recovers from corruption the same way.
pub trait StatsBackend {
    /// Returns `Ok(None)` when nothing has been saved yet
    fn read(&self) -> Result<Option<Vec<u8>>, BackendError>;

    /// Replaces the stored record. Must be all-or-nothing.
    fn write(&mut self, record: &[u8]) -> Result<(), BackendError>;
}

impl<B: StatsBackend + ?Sized> StatsBackend for Box<B> {
    fn read(&self) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).read()
    }

    fn write(&mut self, record: &[u8]) -> Result<(), BackendError> {
        (**self).write(record)
    }
}

/// Keeps the record in memory. Used by tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    record: Option<Vec<u8>>,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a pre-existing record, e.g. a hand-written or corrupted one
    pub fn with_record(record: impl Into<Vec<u8>>) -> Self {
        Self {
            record: Some(record.into()),
            ..Self::default()
        }
    }

    /// Simulates a full disk / exceeded quota
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn record(&self) -> Option<&[u8]> {
        self.record.as_deref()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StatsBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.record.clone())
    }

    fn write(&mut self, record: &[u8]) -> Result<(), BackendError> {
        if self.fail_writes {
            return Err(BackendError::Rejected("storage quota exceeded".into()));
        }
        self.record = Some(record.to_vec());
        self.writes += 1;
        Ok(())
    }
}

/// Stores the record as a JSON file, replaced atomically on every write
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl StatsBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>, BackendError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, record: &[u8]) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Readers only ever see the old or the new file, never a partial one.
        // The temp file is synced before the rename so a crash cannot leave
        // the renamed file empty.
        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(record)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// Stores the record as the single row of a SQLite table
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (or create) the database file and its table
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, BackendError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS player_stats (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                record BLOB NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl StatsBackend for SqliteBackend {
    fn read(&self) -> Result<Option<Vec<u8>>, BackendError> {
        let record = self
            .conn
            .query_row("SELECT record FROM player_stats WHERE id = 1", [], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()?;
        Ok(record)
    }

    fn write(&mut self, record: &[u8]) -> Result<(), BackendError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO player_stats (id, record, updated_at)
            VALUES (1, ?1, CURRENT_TIMESTAMP)
            ON CONFLICT(id) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at
            "#,
            params![record],
        )?;
        tx.commit()?;
        Ok(())
    }
}
