use hearth::db::{migrations, Database};
use hearth::memory::{Category, FactStore};
use hearth::RequestContext;
use rusqlite::Connection;
use tempfile::TempDir;

/// The table shapes written by the first release, before embeddings,
/// soft delete, subjects, refs, or firing state existed.
const LEGACY_SCHEMA: &str = r#"
CREATE TABLE facts (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT '',
    confidence REAL NOT NULL DEFAULT 1.0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    accessed_at TEXT NOT NULL,
    UNIQUE(category, key)
);
CREATE TABLE anticipations (
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
INSERT INTO facts (id, category, key, value, source, confidence, created_at, updated_at, accessed_at)
VALUES ('0190a000-0000-7000-8000-000000000001', 'home', 'thermostat', 'Ecobee in the hallway',
        'user-stated', 0.9, '2024-05-01T10:00:00Z', '2024-05-01T10:00:00Z', '2024-05-01T10:00:00Z');
INSERT INTO anticipations (id, description, trigger_json, created_at)
VALUES ('legacy-1', 'Remind about filter change', '{"event_type":"maintenance"}', '2024-05-01T10:00:00Z');
"#;

fn legacy_db(tmp: &TempDir) -> std::path::PathBuf {
    let path = tmp.path().join("legacy.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(LEGACY_SCHEMA).unwrap();
    path
}

#[test]
fn legacy_database_is_upgraded_in_place() {
    let tmp = TempDir::new().unwrap();
    let path = legacy_db(&tmp);

    let db = Database::open(&path).unwrap();
    let ctx = RequestContext::new();

    let version = db
        .with_conn(&ctx, |conn| Ok(migrations::get_schema_version(conn)?))
        .unwrap();
    assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);

    let facts = FactStore::new(db.clone());
    let fact = facts.get(&ctx, Category::Home, "thermostat").unwrap();
    assert_eq!(fact.value, "Ecobee in the hallway");
    assert!(fact.subjects.is_empty());
    assert!(fact.embedding.is_none());
    assert!(fact.deleted_at.is_none());

    let anticipations = hearth::anticipation::AnticipationStore::new(db);
    let a = anticipations.get(&ctx, "legacy-1").unwrap();
    assert_eq!(a.trigger.event_type.as_deref(), Some("maintenance"));
    assert_eq!(a.cooldown_seconds, 0);
    assert!(a.last_fired_at.is_none());
}

#[test]
fn fts_index_picks_up_preexisting_rows() {
    let tmp = TempDir::new().unwrap();
    let path = legacy_db(&tmp);

    let facts = FactStore::new(Database::open(&path).unwrap());
    assert!(facts.fts_enabled());
    let hits = facts.search(&RequestContext::new(), "ecobee").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "thermostat");
}

#[test]
fn reopening_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = legacy_db(&tmp);

    drop(Database::open(&path).unwrap());
    let db = Database::open(&path).unwrap();
    let facts = FactStore::new(db);
    assert_eq!(facts.stats(&RequestContext::new()).unwrap().total, 1);
}
