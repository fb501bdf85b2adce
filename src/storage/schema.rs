//! Database schema definitions for the local record store.
//!
//! Every collection shares one shape: envelope columns used by the
//! secondary indexes plus the full record as a JSON body.

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- User aggregate (id = owner id)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_owner ON users(owner_id);
CREATE INDEX IF NOT EXISTS idx_users_owner_ts ON users(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_users_synced ON users(synced, ts_ms);

-- Activity records
CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activities_owner ON activities(owner_id);
CREATE INDEX IF NOT EXISTS idx_activities_owner_ts ON activities(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_activities_synced ON activities(synced, ts_ms);

-- Assessment records
CREATE TABLE IF NOT EXISTS assessments (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_assessments_owner ON assessments(owner_id);
CREATE INDEX IF NOT EXISTS idx_assessments_owner_ts ON assessments(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_assessments_synced ON assessments(synced, ts_ms);

-- Challenge progress
CREATE TABLE IF NOT EXISTS challenge_progress (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_challenge_progress_owner ON challenge_progress(owner_id);
CREATE INDEX IF NOT EXISTS idx_challenge_progress_owner_ts ON challenge_progress(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_challenge_progress_synced ON challenge_progress(synced, ts_ms);

-- Achievement unlocks (write-once)
CREATE TABLE IF NOT EXISTS achievements (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_achievements_owner ON achievements(owner_id);
CREATE INDEX IF NOT EXISTS idx_achievements_owner_ts ON achievements(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_achievements_synced ON achievements(synced, ts_ms);

-- Reward redemptions
CREATE TABLE IF NOT EXISTS redemptions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    ts_ms INTEGER NOT NULL,
    synced INTEGER NOT NULL DEFAULT 0,
    synced_at TEXT,
    revision INTEGER NOT NULL DEFAULT 1,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_redemptions_owner ON redemptions(owner_id);
CREATE INDEX IF NOT EXISTS idx_redemptions_owner_ts ON redemptions(owner_id, ts_ms);
CREATE INDEX IF NOT EXISTS idx_redemptions_synced ON redemptions(synced, ts_ms);

-- Device-only media attached to activities
CREATE TABLE IF NOT EXISTS media_blobs (
    activity_id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    content_type TEXT NOT NULL,
    data BLOB NOT NULL,
    remote_url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_media_blobs_owner ON media_blobs(owner_id);
CREATE INDEX IF NOT EXISTS idx_media_blobs_pending ON media_blobs(remote_url);
"#;
