//! Forward-only, additive schema migrations.
//!
//! Column additions are replayed on every open: an `ALTER TABLE ... ADD COLUMN`
//! that fails with "duplicate column name" means the column is already there and
//! is ignored. Any other failure aborts startup. The reached version is recorded
//! in `schema_meta` alongside the embedding model that produced stored vectors.

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const FACT_COLUMNS: &[&str] = &[
    "embedding BLOB",
    "deleted_at TEXT",
    "subjects TEXT",
    "ref TEXT",
];

const ANTICIPATION_COLUMNS: &[&str] = &[
    "context_entities_json TEXT",
    "cooldown_seconds INTEGER NOT NULL DEFAULT 0",
    "deleted_at TEXT",
    "last_fired_at TEXT",
];

/// Indexes over migrated columns; created after the columns exist.
const POST_MIGRATION_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_facts_deleted ON facts(deleted_at);
CREATE INDEX IF NOT EXISTS idx_anticipations_active ON anticipations(resolved_at, deleted_at, expires_at);
"#;

const SCHEMA_VERSION_KEY: &str = "schema_version";
const EMBEDDING_MODEL_KEY: &str = "embedding_model";

fn read_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM schema_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

fn write_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_meta (key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [key, value],
    )?;
    Ok(())
}

/// Recorded schema version; 0 when the row is missing or unreadable.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(read_meta(conn, SCHEMA_VERSION_KEY)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Model that produced the stored fact vectors, if one was recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    read_meta(conn, EMBEDDING_MODEL_KEY)
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    write_meta(conn, EMBEDDING_MODEL_KEY, model)
}

/// Add a column unless it already exists. Returns whether it was added.
pub fn add_column(conn: &Connection, table: &str, column_def: &str) -> rusqlite::Result<bool> {
    match conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column_def};")) {
        Ok(()) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("duplicate column name") => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Apply all additive migrations and record the schema version.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    for (table, columns) in [("facts", FACT_COLUMNS), ("anticipations", ANTICIPATION_COLUMNS)] {
        for column in columns {
            if add_column(conn, table, column)? {
                tracing::info!(table, column = %column, "added column");
            }
        }
    }
    conn.execute_batch(POST_MIGRATION_SQL)?;

    if version < CURRENT_SCHEMA_VERSION {
        tracing::info!(from = version, to = CURRENT_SCHEMA_VERSION, "schema migrated");
        write_meta(conn, SCHEMA_VERSION_KEY, &CURRENT_SCHEMA_VERSION.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    fn column_names(conn: &Connection, table: &str) -> Vec<String> {
        conn.prepare(&format!("SELECT name FROM pragma_table_info('{table}')"))
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn get_schema_version_returns_1_on_fresh_db() {
        let conn = test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn run_migrations_upgrades_to_current() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migrations_add_fact_and_anticipation_columns() {
        let conn = test_db();
        run_migrations(&conn).unwrap();

        let facts = column_names(&conn, "facts");
        for col in ["embedding", "deleted_at", "subjects", "ref"] {
            assert!(facts.contains(&col.to_string()), "facts missing {col}");
        }
        let anticipations = column_names(&conn, "anticipations");
        for col in ["context_entities_json", "cooldown_seconds", "deleted_at", "last_fired_at"] {
            assert!(anticipations.contains(&col.to_string()), "anticipations missing {col}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_db();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn duplicate_column_is_absorbed() {
        let conn = test_db();
        assert!(add_column(&conn, "facts", "ref TEXT").unwrap());
        assert!(!add_column(&conn, "facts", "ref TEXT").unwrap());
    }

    #[test]
    fn other_alter_failures_are_fatal() {
        let conn = test_db();
        assert!(add_column(&conn, "no_such_table", "x TEXT").is_err());
    }

    #[test]
    fn missing_version_row_reads_as_zero() {
        let conn = test_db();
        conn.execute("DELETE FROM schema_meta", []).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn embedding_model_is_overwritten() {
        let conn = test_db();
        set_embedding_model(&conn, "nomic-embed-text").unwrap();
        set_embedding_model(&conn, "mxbai-embed-large").unwrap();
        assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("mxbai-embed-large"));
    }

    #[test]
    fn set_and_get_embedding_model() {
        let conn = test_db();
        assert!(get_embedding_model(&conn).unwrap().is_none());

        set_embedding_model(&conn, "nomic-embed-text").unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap(),
            Some("nomic-embed-text".to_string())
        );
    }
}
