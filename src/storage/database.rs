//! Local record store on top of rusqlite.
//!
//! Each collection is a key-value table (id → JSON body) with secondary
//! indexes on owner, (owner, timestamp) and synced flag. The connection sits
//! behind a mutex; every operation holds it only for its own statement(s),
//! so single operations are transactional within their collection. The
//! closure-scoped [`LocalStore::transaction`] is available when a write must
//! span collections.

use crate::clock::{Clock, SystemClock};
use crate::storage::record::{EntityKind, IndexQuery, Record};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

/// Device-only media attached to an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub activity_id: Uuid,
    pub owner_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    /// Set once the media store accepted the upload
    pub remote_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Rows removed by [`LocalStore::clear_user_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub records: HashMap<EntityKind, usize>,
    pub media_blobs: usize,
}

impl PurgeSummary {
    /// Total rows removed across all collections.
    pub fn total(&self) -> usize {
        self.records.values().sum::<usize>() + self.media_blobs
    }
}

/// Persistent record store shared by the domain services and the sync engine.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to stamp `synced_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Store lock poisoned: {}", e)))
    }

    /// Insert a new record. Fails with `DuplicateId` if the id exists.
    pub fn create<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        insert(&*self.lock()?, record)
    }

    /// Get a record by id.
    pub fn get<T: Record>(&self, id: Uuid) -> Result<Option<T>, StorageError> {
        select_one(&*self.lock()?, id)
    }

    /// Get a record by id, failing with `NotFound` on a miss.
    pub fn require<T: Record>(&self, id: Uuid) -> Result<T, StorageError> {
        self.get(id)?.ok_or(StorageError::NotFound { kind: T::KIND, id })
    }

    /// Insert or replace a record.
    pub fn update<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        upsert(&*self.lock()?, record)
    }

    /// Delete a record. Returns whether a row was removed.
    pub fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, StorageError> {
        remove(&*self.lock()?, kind, id)
    }

    /// Look up records through a secondary index, oldest first.
    pub fn query_by_index<T: Record>(
        &self,
        index: IndexQuery,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StorageError> {
        select_by_index(&*self.lock()?, index, limit).map(without_revision)
    }

    /// Records the remote store has not confirmed yet, oldest first.
    pub fn get_unsynced<T: Record>(&self) -> Result<Vec<T>, StorageError> {
        self.query_by_index(IndexQuery::Synced(false), None)
    }

    /// Unsynced records paired with their row revision, oldest first.
    ///
    /// Every write bumps the revision; pass it back to
    /// [`mark_synced_at_revision`](Self::mark_synced_at_revision).
    pub fn get_unsynced_revisions<T: Record>(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<(T, i64)>, StorageError> {
        select_by_index(&*self.lock()?, IndexQuery::Synced(false), limit)
    }

    /// Number of unsynced records in a collection.
    pub fn count_unsynced(&self, kind: EntityKind) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE synced = 0", kind.table()),
                [],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count as u64)
    }

    /// Mark a record as confirmed by the remote store.
    ///
    /// Idempotent: an already-synced record stays synced and gets a fresh
    /// `synced_at`.
    pub fn mark_synced(&self, kind: EntityKind, id: Uuid) -> Result<(), StorageError> {
        let now = self.clock.now();
        set_synced(&*self.lock()?, kind, id, now)
    }

    /// Mark a record synced only if it has not been written since `revision`.
    ///
    /// Returns `false` when a newer local write exists; that version stays
    /// unsynced.
    pub fn mark_synced_at_revision(
        &self,
        kind: EntityKind,
        id: Uuid,
        revision: i64,
    ) -> Result<bool, StorageError> {
        let now = self.clock.now();
        set_synced_at_revision(&*self.lock()?, kind, id, revision, now)
    }

    /// Run `f` inside one SQLite transaction spanning any collections.
    ///
    /// The transaction commits only if `f` returns `Ok`.
    pub fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&StoreTxn<'_>) -> Result<R, E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| E::from(query_error(e)))?;
        let result = f(&StoreTxn { conn: &tx })?;
        tx.commit().map_err(|e| E::from(query_error(e)))?;
        Ok(result)
    }

    /// Remove every record and media blob owned by `owner_id`.
    pub fn clear_user_data(&self, owner_id: Uuid) -> Result<PurgeSummary, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(query_error)?;
        let owner = owner_id.to_string();

        let mut summary = PurgeSummary::default();
        for kind in EntityKind::ALL {
            let removed = tx
                .execute(
                    &format!("DELETE FROM {} WHERE owner_id = ?1", kind.table()),
                    params![owner],
                )
                .map_err(query_error)?;
            summary.records.insert(kind, removed);
        }
        summary.media_blobs = tx
            .execute("DELETE FROM media_blobs WHERE owner_id = ?1", params![owner])
            .map_err(query_error)?;

        tx.commit().map_err(query_error)?;

        tracing::info!(
            "Cleared local data for owner {} ({} rows)",
            owner_id,
            summary.total()
        );
        Ok(summary)
    }

    // ========== Device-only media ==========

    /// Store (or replace) the media blob for an activity.
    pub fn put_media_blob(&self, blob: &MediaBlob) -> Result<(), StorageError> {
        write_media_blob(&*self.lock()?, blob)
    }

    /// Get the media blob for an activity.
    pub fn media_blob(&self, activity_id: Uuid) -> Result<Option<MediaBlob>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT activity_id, owner_id, file_name, content_type, data, remote_url, created_at
             FROM media_blobs WHERE activity_id = ?1",
            params![activity_id.to_string()],
            parse_media_row,
        )
        .optional()
        .map_err(query_error)
    }

    /// Blobs not uploaded yet, oldest first.
    pub fn pending_media(&self, limit: usize) -> Result<Vec<MediaBlob>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT activity_id, owner_id, file_name, content_type, data, remote_url, created_at
                 FROM media_blobs WHERE remote_url IS NULL
                 ORDER BY created_at ASC, rowid ASC LIMIT ?1",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![limit as i64], parse_media_row)
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    /// Number of blobs waiting for upload.
    pub fn count_pending_media(&self) -> Result<u64, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM media_blobs WHERE remote_url IS NULL",
                [],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count as u64)
    }

    /// Record the URL the media store returned for an activity's blob.
    pub fn mark_media_uploaded(&self, activity_id: Uuid, url: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE media_blobs SET remote_url = ?1 WHERE activity_id = ?2",
                params![url, activity_id.to_string()],
            )
            .map_err(query_error)?;

        if updated == 0 {
            return Err(StorageError::NotFound {
                kind: EntityKind::Activities,
                id: activity_id,
            });
        }
        Ok(())
    }
}

/// Handle passed to [`LocalStore::transaction`] closures.
pub struct StoreTxn<'a> {
    conn: &'a Connection,
}

impl StoreTxn<'_> {
    pub fn create<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        insert(self.conn, record)
    }

    pub fn get<T: Record>(&self, id: Uuid) -> Result<Option<T>, StorageError> {
        select_one(self.conn, id)
    }

    pub fn require<T: Record>(&self, id: Uuid) -> Result<T, StorageError> {
        self.get(id)?.ok_or(StorageError::NotFound { kind: T::KIND, id })
    }

    pub fn update<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        upsert(self.conn, record)
    }

    pub fn put_media_blob(&self, blob: &MediaBlob) -> Result<(), StorageError> {
        write_media_blob(self.conn, blob)
    }

    pub fn query_by_index<T: Record>(
        &self,
        index: IndexQuery,
        limit: Option<usize>,
    ) -> Result<Vec<T>, StorageError> {
        select_by_index(self.conn, index, limit).map(without_revision)
    }
}

/// Local store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Local storage unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate id {id} in {kind}")]
    DuplicateId { kind: EntityKind, id: Uuid },

    #[error("Record {id} not found in {kind}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl StorageError {
    /// Whether the store can no longer be used at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

fn query_error(e: rusqlite::Error) -> StorageError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::ReadOnly
                    | ErrorCode::DiskFull
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
            ) =>
        {
            StorageError::Unavailable(e.to_string())
        }
        _ => StorageError::QueryFailed(e.to_string()),
    }
}

fn initialize(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(SCHEMA_VERSION_TABLE)
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(query_error)?;

    if current_version < 1 {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            [CURRENT_VERSION],
        )
        .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        tracing::info!("Local store migrated to version {}", CURRENT_VERSION);
    }

    Ok(())
}

fn encode<T: Record>(record: &T) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: Record>(
    body: &str,
    synced: bool,
    synced_at: Option<String>,
) -> Result<T, StorageError> {
    let mut record: T =
        serde_json::from_str(body).map_err(|e| StorageError::Serialization(e.to_string()))?;

    // Envelope columns are authoritative; mark_synced never rewrites the body.
    let envelope = record.envelope_mut();
    envelope.synced = synced;
    envelope.synced_at = synced_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(record)
}

fn insert<T: Record>(conn: &Connection, record: &T) -> Result<(), StorageError> {
    let envelope = record.envelope();
    let result = conn.execute(
        &format!(
            "INSERT INTO {} (id, owner_id, ts_ms, synced, synced_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            T::KIND.table()
        ),
        params![
            envelope.id.to_string(),
            envelope.owner_id.to_string(),
            record.timestamp().timestamp_millis(),
            envelope.synced,
            envelope.synced_at.map(|t| t.to_rfc3339()),
            encode(record)?,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(StorageError::DuplicateId {
                kind: T::KIND,
                id: envelope.id,
            })
        }
        Err(e) => Err(query_error(e)),
    }
}

fn upsert<T: Record>(conn: &Connection, record: &T) -> Result<(), StorageError> {
    let envelope = record.envelope();
    conn.execute(
        &format!(
            "INSERT INTO {} (id, owner_id, ts_ms, synced, synced_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                ts_ms = excluded.ts_ms,
                synced = excluded.synced,
                synced_at = excluded.synced_at,
                revision = revision + 1,
                body = excluded.body",
            T::KIND.table()
        ),
        params![
            envelope.id.to_string(),
            envelope.owner_id.to_string(),
            record.timestamp().timestamp_millis(),
            envelope.synced,
            envelope.synced_at.map(|t| t.to_rfc3339()),
            encode(record)?,
        ],
    )
    .map_err(query_error)?;
    Ok(())
}

fn write_media_blob(conn: &Connection, blob: &MediaBlob) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR REPLACE INTO media_blobs
         (activity_id, owner_id, file_name, content_type, data, remote_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            blob.activity_id.to_string(),
            blob.owner_id.to_string(),
            blob.file_name,
            blob.content_type,
            blob.data,
            blob.remote_url,
            blob.created_at.to_rfc3339(),
        ],
    )
    .map_err(query_error)?;
    Ok(())
}

fn select_one<T: Record>(conn: &Connection, id: Uuid) -> Result<Option<T>, StorageError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT body, synced, synced_at FROM {} WHERE id = ?1",
                T::KIND.table()
            ),
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()
        .map_err(query_error)?;

    row.map(|(body, synced, synced_at)| decode(&body, synced, synced_at))
        .transpose()
}

fn select_by_index<T: Record>(
    conn: &Connection,
    index: IndexQuery,
    limit: Option<usize>,
) -> Result<Vec<(T, i64)>, StorageError> {
    match index {
        IndexQuery::Owner(owner) => {
            select_where(conn, "owner_id = ?1", params![owner.to_string()], limit)
        }
        IndexQuery::OwnerTimeRange { owner, from, to } => select_where(
            conn,
            "owner_id = ?1 AND ts_ms >= ?2 AND ts_ms < ?3",
            params![
                owner.to_string(),
                from.timestamp_millis(),
                to.timestamp_millis()
            ],
            limit,
        ),
        IndexQuery::Synced(synced) => select_where(conn, "synced = ?1", params![synced], limit),
    }
}

fn select_where<T: Record>(
    conn: &Connection,
    clause: &str,
    params: &[&dyn ToSql],
    limit: Option<usize>,
) -> Result<Vec<(T, i64)>, StorageError> {
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn
        .prepare(&format!(
            "SELECT body, synced, synced_at, revision FROM {} WHERE {}
             ORDER BY ts_ms ASC, rowid ASC LIMIT {}",
            T::KIND.table(),
            clause,
            limit
        ))
        .map_err(query_error)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(query_error)?;

    let mut records = Vec::new();
    for row in rows {
        let (body, synced, synced_at, revision) = row.map_err(query_error)?;
        records.push((decode(&body, synced, synced_at)?, revision));
    }
    Ok(records)
}

fn without_revision<T>(rows: Vec<(T, i64)>) -> Vec<T> {
    rows.into_iter().map(|(record, _)| record).collect()
}

fn remove(conn: &Connection, kind: EntityKind, id: Uuid) -> Result<bool, StorageError> {
    let removed = conn
        .execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id.to_string()],
        )
        .map_err(query_error)?;
    Ok(removed > 0)
}

fn set_synced(
    conn: &Connection,
    kind: EntityKind,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let updated = conn
        .execute(
            &format!(
                "UPDATE {} SET synced = 1, synced_at = ?1 WHERE id = ?2",
                kind.table()
            ),
            params![at.to_rfc3339(), id.to_string()],
        )
        .map_err(query_error)?;

    if updated == 0 {
        return Err(StorageError::NotFound { kind, id });
    }
    Ok(())
}

fn set_synced_at_revision(
    conn: &Connection,
    kind: EntityKind,
    id: Uuid,
    revision: i64,
    at: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let updated = conn
        .execute(
            &format!(
                "UPDATE {} SET synced = 1, synced_at = ?1 WHERE id = ?2 AND revision = ?3",
                kind.table()
            ),
            params![at.to_rfc3339(), id.to_string(), revision],
        )
        .map_err(query_error)?;
    Ok(updated > 0)
}

fn parse_media_row(row: &rusqlite::Row) -> rusqlite::Result<MediaBlob> {
    let activity_id: String = row.get(0)?;
    let owner_id: String = row.get(1)?;
    let created_at: String = row.get(6)?;

    Ok(MediaBlob {
        activity_id: Uuid::parse_str(&activity_id).unwrap_or_default(),
        owner_id: Uuid::parse_str(&owner_id).unwrap_or_default(),
        file_name: row.get(2)?,
        content_type: row.get(3)?,
        data: row.get(4)?,
        remote_url: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
