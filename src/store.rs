//! # Session Persistence
//!
//! Finished sessions are appended to a per-user collection and never updated.
//!
//! | Store | Backing | Feature |
//! |-------|---------|---------|
//! | [`MemoryStore`] | `HashMap` behind a mutex | always |
//! | [`JsonFileStore`] | one pretty-printed JSON file per user | always |
//! | [`SqliteStore`] | SQLite table with a JSON document column | `persistence` |
//! | [`FallbackStore`] | primary store plus a local cache | always |
//!
//! A failed write is never reported as success: [`FallbackStore::save`]
//! returns [`SaveOutcome::CachedLocally`] when the primary rejects the
//! session, and an error when the local copy fails too. Nothing retries.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::{Result, Session, TrackerError};

#[cfg(feature = "persistence")]
use rusqlite::{params, Connection};

// ============================================================================
// Identifiers
// ============================================================================

/// Owner of a session collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe form of the id, distinct for distinct ids.
    ///
    /// ASCII letters, digits and `-` are kept; every other byte becomes
    /// `_` followed by two hex digits.
    fn file_stem(&self) -> String {
        let mut stem = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(byte as char);
            } else {
                stem.push_str(&format!("_{:02x}", byte));
            }
        }
        stem
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by a store when a session is saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    fn generate(session: &Session, seq: u64) -> Self {
        Self(format!("{}-{}", session.start_time.timestamp_millis(), seq))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A session document as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub saved_at: DateTime<Utc>,
    pub session: Session,
}

// ============================================================================
// Store Trait
// ============================================================================

/// Append-only session sink.
pub trait SessionStore: Send + Sync {
    /// Append a finished session to the user's collection.
    fn save(&self, user: &UserId, session: &Session) -> Result<SessionId>;

    /// All sessions of a user, in the order they were saved.
    fn list(&self, user: &UserId) -> Result<Vec<StoredSession>>;

    /// Short name for log lines.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store, used as the local cache and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<UserId, Vec<StoredSession>>>,
    seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, user: &UserId, session: &Session) -> Result<SessionId> {
        let id = SessionId::generate(session, self.seq.fetch_add(1, Ordering::Relaxed));
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| TrackerError::PersistenceWrite {
                message: e.to_string(),
            })?;
        sessions.entry(user.clone()).or_default().push(StoredSession {
            id: id.clone(),
            user_id: user.clone(),
            saved_at: Utc::now(),
            session: session.clone(),
        });
        debug!("[Store] memory: saved {} for {}", id, user);
        Ok(id)
    }

    fn list(&self, user: &UserId) -> Result<Vec<StoredSession>> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| TrackerError::PersistenceRead {
                message: e.to_string(),
            })?;
        Ok(sessions.get(user).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// JSON File Store
// ============================================================================

/// One JSON document per user under a directory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| TrackerError::Config {
            message: format!("cannot create session directory {}: {}", dir.display(), e),
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_file(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json", user.file_stem()))
    }

    fn temp_file(&self, user: &UserId) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", user.file_stem()))
    }

    fn read_file(path: &Path) -> Result<Vec<StoredSession>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| TrackerError::PersistenceRead {
                message: format!("{}: {}", path.display(), e),
            })?;
        serde_json::from_str(&contents).map_err(|e| TrackerError::PersistenceRead {
            message: format!("{}: {}", path.display(), e),
        })
    }
}

impl SessionStore for JsonFileStore {
    fn save(&self, user: &UserId, session: &Session) -> Result<SessionId> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| TrackerError::PersistenceWrite {
                message: e.to_string(),
            })?;

        let path = self.user_file(user);
        let mut sessions = Self::read_file(&path)?;
        // Position among the user's entries; the file is only appended to.
        let seq = sessions.iter().filter(|s| s.user_id == *user).count();
        let id = SessionId::generate(session, seq as u64);
        sessions.push(StoredSession {
            id: id.clone(),
            user_id: user.clone(),
            saved_at: Utc::now(),
            session: session.clone(),
        });

        // Replace the document in one rename so a failed write leaves the
        // previous version intact.
        let json = serde_json::to_string_pretty(&sessions)?;
        let tmp = self.temp_file(user);
        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                TrackerError::PersistenceWrite {
                    message: format!("{}: {}", path.display(), e),
                }
            })?;
        info!(
            "[Store] Saved session {} to {} ({} total)",
            id,
            path.display(),
            sessions.len()
        );
        Ok(id)
    }

    fn list(&self, user: &UserId) -> Result<Vec<StoredSession>> {
        let mut sessions = Self::read_file(&self.user_file(user))?;
        sessions.retain(|s| s.user_id == *user);
        Ok(sessions)
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

// ============================================================================
// SQLite Store
// ============================================================================

/// Sessions in SQLite, one row per session with the document as JSON.
#[cfg(feature = "persistence")]
pub struct SqliteStore {
    db: Mutex<Connection>,
    seq: AtomicU64,
}

#[cfg(feature = "persistence")]
impl SqliteStore {
    /// Open (or create) a database file.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path).map_err(|e| TrackerError::Config {
            message: format!("cannot open {}: {}", db_path, e),
        })?;
        Self::init_schema(&db)?;
        // Continue numbering after rows from earlier runs so ids stay unique.
        let existing: i64 = db
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(|e| TrackerError::PersistenceRead {
                message: e.to_string(),
            })?;
        info!(
            "[Store] Opened SQLite session store at {} ({} sessions)",
            db_path, existing
        );
        Ok(Self {
            db: Mutex::new(db),
            seq: AtomicU64::new(existing.max(0) as u64),
        })
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().map_err(|e| TrackerError::Config {
            message: e.to_string(),
        })?;
        Self::init_schema(&db)?;
        Ok(Self {
            db: Mutex::new(db),
            seq: AtomicU64::new(0),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                activity_kind TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                distance_km REAL NOT NULL,
                saved_at INTEGER NOT NULL,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            "#,
        )
        .map_err(|e| TrackerError::Config {
            message: format!("schema: {}", e),
        })
    }
}

#[cfg(feature = "persistence")]
impl SessionStore for SqliteStore {
    fn save(&self, user: &UserId, session: &Session) -> Result<SessionId> {
        let id = SessionId::generate(session, self.seq.fetch_add(1, Ordering::Relaxed));
        let data = serde_json::to_string(session)?;
        let db = self.db.lock().map_err(|e| TrackerError::PersistenceWrite {
            message: e.to_string(),
        })?;
        db.execute(
            "INSERT INTO sessions (id, user_id, activity_kind, start_time, distance_km, saved_at, data)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id.0,
                user.0,
                session.activity_kind.as_str(),
                session.start_time.timestamp_millis(),
                session.total_distance_km,
                Utc::now().timestamp_millis(),
                data
            ],
        )
        .map_err(|e| TrackerError::PersistenceWrite {
            message: e.to_string(),
        })?;
        debug!("[Store] sqlite: saved {} for {}", id, user);
        Ok(id)
    }

    fn list(&self, user: &UserId) -> Result<Vec<StoredSession>> {
        let read_err = |e: rusqlite::Error| TrackerError::PersistenceRead {
            message: e.to_string(),
        };
        let db = self.db.lock().map_err(|e| TrackerError::PersistenceRead {
            message: e.to_string(),
        })?;
        let mut stmt = db
            .prepare("SELECT id, saved_at, data FROM sessions WHERE user_id = ? ORDER BY rowid")
            .map_err(read_err)?;
        let rows = stmt
            .query_map(params![user.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(read_err)?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, saved_at, data) = row.map_err(read_err)?;
            let session: Session =
                serde_json::from_str(&data).map_err(|e| TrackerError::PersistenceRead {
                    message: format!("session {}: {}", id, e),
                })?;
            sessions.push(StoredSession {
                id: SessionId(id),
                user_id: user.clone(),
                saved_at: DateTime::from_timestamp_millis(saved_at).unwrap_or_default(),
                session,
            });
        }
        Ok(sessions)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

// ============================================================================
// Fallback Store
// ============================================================================

/// Result of a save through [`FallbackStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The primary store accepted the session
    Saved { id: SessionId },
    /// The primary store failed; the session is only in the local cache
    CachedLocally {
        local_id: SessionId,
        error: TrackerError,
    },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }

    pub fn id(&self) -> &SessionId {
        match self {
            SaveOutcome::Saved { id } => id,
            SaveOutcome::CachedLocally { local_id, .. } => local_id,
        }
    }
}

/// Writes to a primary store and keeps a local copy when that fails.
pub struct FallbackStore {
    primary: Box<dyn SessionStore>,
    local: Box<dyn SessionStore>,
}

impl FallbackStore {
    pub fn new(primary: Box<dyn SessionStore>, local: Box<dyn SessionStore>) -> Self {
        Self { primary, local }
    }

    /// Save to the primary store, falling back to the local cache.
    ///
    /// Returns an error only when both writes fail.
    pub fn save(&self, user: &UserId, session: &Session) -> Result<SaveOutcome> {
        match self.primary.save(user, session) {
            Ok(id) => Ok(SaveOutcome::Saved { id }),
            Err(error) => {
                warn!(
                    "[Store] {} write failed ({}), caching session locally in {}",
                    self.primary.name(),
                    error,
                    self.local.name()
                );
                let local_id = self.local.save(user, session)?;
                Ok(SaveOutcome::CachedLocally { local_id, error })
            }
        }
    }

    /// Sessions from the primary store followed by any only cached locally.
    ///
    /// When the primary cannot be read the local cache alone is returned.
    pub fn list(&self, user: &UserId) -> Result<Vec<StoredSession>> {
        let local = self.local.list(user)?;
        match self.primary.list(user) {
            Ok(mut sessions) => {
                sessions.extend(local);
                Ok(sessions)
            }
            Err(error) => {
                warn!(
                    "[Store] {} read failed ({}), listing local cache only",
                    self.primary.name(),
                    error
                );
                Ok(local)
            }
        }
    }

    /// Sessions that only reached the local cache.
    pub fn pending_local(&self, user: &UserId) -> Result<Vec<StoredSession>> {
        self.local.list(user)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
