//! SQL DDL for the base tables and the optional FTS5 index.
//!
//! The base `CREATE TABLE` statements describe the oldest table shapes; columns
//! added since then (`embedding`, `deleted_at`, `subjects`, `ref` on facts, and
//! the firing/cooldown columns on anticipations) arrive through
//! [`super::migrations`], so fresh and upgraded databases take the same path.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS facts (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL CHECK(category IN ('user','home','device','routine','preference','architecture')),
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT '',
    confidence REAL NOT NULL DEFAULT 1.0 CHECK(confidence >= 0.0 AND confidence <= 1.0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    accessed_at TEXT NOT NULL,
    UNIQUE(category, key)
);

CREATE INDEX IF NOT EXISTS idx_facts_category ON facts(category);
CREATE INDEX IF NOT EXISTS idx_facts_key ON facts(key);
CREATE INDEX IF NOT EXISTS idx_facts_accessed ON facts(accessed_at DESC);

CREATE TABLE IF NOT EXISTS anticipations (
    id TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    trigger_json TEXT NOT NULL DEFAULT '{}',
    metadata_json TEXT,
    recurring INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    resolved_at TEXT
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// External-content FTS5 table over the searchable fact columns.
const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS facts_fts USING fts5(
    key,
    value,
    source,
    content='facts',
    content_rowid='rowid'
);
"#;

/// Create the base tables. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    Ok(())
}

/// Create the FTS5 index and reconcile it with existing rows.
///
/// Returns `false` if the engine cannot create it; callers then fall back to
/// `LIKE` matching.
pub fn init_fts(conn: &Connection) -> bool {
    if let Err(e) = conn.execute_batch(FTS_SQL) {
        tracing::warn!(error = %e, "full-text index unavailable, using LIKE search");
        return false;
    }
    if let Err(e) = rebuild_fts(conn) {
        tracing::warn!(error = %e, "full-text rebuild failed, using LIKE search");
        return false;
    }
    tracing::debug!("full-text index ready");
    true
}

/// Rebuild the external-content index from the `facts` table.
pub fn rebuild_fts(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("INSERT INTO facts_fts(facts_fts) VALUES('rebuild');")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"facts".to_string()));
        assert!(tables.contains(&"anticipations".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn fts_picks_up_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO facts (id, category, key, value, created_at, updated_at, accessed_at) \
             VALUES ('f1', 'home', 'garage', 'The garage door is blue', 'x', 'x', 'x')",
            [],
        )
        .unwrap();

        assert!(init_fts(&conn));

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM facts_fts WHERE facts_fts MATCH 'garage'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}
