use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use callfeed_core::DirectoryEntry;
use rusqlite::Connection;
use tracing::debug;

use crate::error::{DirectoryError, Result};

/// SQLite's historical bound-parameter limit is 999; stay under it.
const LOOKUP_CHUNK: usize = 500;

/// Maps phone digits to known contacts. Best-effort: implementations may
/// omit unknown numbers and may fail outright; callers must cope with both.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve each of `digits`; the result is keyed by the input digits.
    async fn lookup_names(&self, digits: &[String]) -> Result<HashMap<String, DirectoryEntry>>;
}

/// Used when no directory is configured.
pub struct NoDirectory;

#[async_trait]
impl DirectoryLookup for NoDirectory {
    fn name(&self) -> &str {
        "none"
    }

    async fn lookup_names(&self, _digits: &[String]) -> Result<HashMap<String, DirectoryEntry>> {
        Ok(HashMap::new())
    }
}

/// Contacts table in a SQLite file.
///
/// Wraps a single connection in a `Mutex`; lookups are short indexed reads.
pub struct SqliteDirectory {
    db: Mutex<Connection>,
}

impl SqliteDirectory {
    /// Wrap an already-open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn upsert_contact(&self, digits: &str, name: &str, person_id: Option<&str>) -> Result<()> {
        let db = self.lock()?;
        crate::db::upsert_contact(&db, digits, name, person_id)?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory connection poisoned".to_string()))
    }
}

#[async_trait]
impl DirectoryLookup for SqliteDirectory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn lookup_names(&self, digits: &[String]) -> Result<HashMap<String, DirectoryEntry>> {
        let mut found = HashMap::new();
        if digits.is_empty() {
            return Ok(found);
        }

        let db = self.lock()?;
        for chunk in digits.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT phone_digits, name, person_id FROM contacts
                 WHERE phone_digits IN ({placeholders})"
            );
            let mut stmt = db.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    DirectoryEntry {
                        name: row.get(1)?,
                        person_id: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (digits, entry) = row?;
                found.insert(digits, entry);
            }
        }

        debug!(requested = digits.len(), resolved = found.len(), "directory lookup");
        Ok(found)
    }
}
