//! Database schema definitions

/// SQL to create all tables
/// NOTE: cached payloads are opaque JSON text; expiry is a unix timestamp in seconds
pub const CREATE_TABLES: &str = r#"
-- Gateway response cache (key = sha256 of operation + parameters)
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at)
"#;
