//! Write path and point reads for facts.
//!
//! [`FactStore::set`] is the single write entry point: an upsert keyed on
//! `(category, key)` that also resurrects soft-deleted rows, keeping their id.
//! Every active-row read filters on `deleted_at IS NULL`.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row};

use crate::context::RequestContext;
use crate::db::{migrations, schema, Database};
use crate::embedding::codec;
use crate::error::{Error, Result};
use crate::memory::types::{Category, Fact, NewFact};
use crate::time;

/// Column list for every fact query; tables are always aliased `f`.
pub(crate) const FACT_COLUMNS: &str = "f.id, f.category, f.key, f.value, f.source, f.confidence, \
     f.embedding, f.subjects, f.ref, f.created_at, f.updated_at, f.accessed_at, f.deleted_at";

/// Durable fact memory. Cheap to clone; clones share the database handle.
#[derive(Debug, Clone)]
pub struct FactStore {
    db: Database,
}

impl FactStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn fts_enabled(&self) -> bool {
        self.db.fts_enabled()
    }

    /// Upsert a fact by `(category, key)`.
    ///
    /// An existing row (even a soft-deleted one) keeps its id and `created_at`,
    /// takes the new value/source/confidence/subjects/ref, and has `deleted_at`
    /// cleared. A changed value drops the stored embedding, since it no longer
    /// describes the text.
    pub fn set(&self, ctx: &RequestContext, fact: &NewFact) -> Result<Fact> {
        validate(fact)?;
        let subjects_json = serde_json::to_string(&fact.subjects)?;

        self.db.with_conn(ctx, |conn| {
            let tx = conn.transaction()?;
            let now = time::now_db();
            let id = uuid::Uuid::now_v7().to_string();

            tx.execute(
                "INSERT INTO facts (id, category, key, value, source, confidence, subjects, ref, \
                 created_at, updated_at, accessed_at, deleted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?9, NULL) \
                 ON CONFLICT(category, key) DO UPDATE SET \
                   embedding = CASE WHEN facts.value = excluded.value THEN facts.embedding ELSE NULL END, \
                   value = excluded.value, \
                   source = excluded.source, \
                   confidence = excluded.confidence, \
                   subjects = excluded.subjects, \
                   ref = excluded.ref, \
                   updated_at = excluded.updated_at, \
                   accessed_at = excluded.accessed_at, \
                   deleted_at = NULL",
                params![
                    id,
                    fact.category.as_str(),
                    fact.key,
                    fact.value,
                    fact.source,
                    fact.confidence,
                    subjects_json,
                    fact.reference,
                    now,
                ],
            )?;

            if self.db.fts_enabled() {
                schema::rebuild_fts(&tx)?;
            }

            let stored = fetch(&tx, fact.category, &fact.key, true)?
                .ok_or_else(|| Error::fact_not_found(fact.category.as_str(), &fact.key))?;
            tx.commit()?;

            tracing::info!(
                id = %stored.id,
                category = %stored.category,
                key = %stored.key,
                "fact stored"
            );
            Ok(stored)
        })
    }

    /// Fetch an active fact and touch its `accessed_at`.
    pub fn get(&self, ctx: &RequestContext, category: Category, key: &str) -> Result<Fact> {
        self.db.with_conn(ctx, |conn| {
            let mut fact = fetch(conn, category, key, false)?
                .ok_or_else(|| Error::fact_not_found(category.as_str(), key))?;

            let now = Utc::now();
            conn.execute(
                "UPDATE facts SET accessed_at = ?1 WHERE id = ?2",
                params![time::to_db(now), fact.id],
            )?;
            fact.accessed_at = now;
            Ok(fact)
        })
    }

    /// Active facts in one category, ordered by key.
    pub fn get_by_category(&self, ctx: &RequestContext, category: Category) -> Result<Vec<Fact>> {
        self.query(
            ctx,
            &format!(
                "SELECT {FACT_COLUMNS} FROM facts f \
                 WHERE f.category = ?1 AND f.deleted_at IS NULL ORDER BY f.key"
            ),
            params![category.as_str()],
        )
    }

    /// All active facts, ordered by `(category, key)`.
    pub fn get_all(&self, ctx: &RequestContext) -> Result<Vec<Fact>> {
        self.query(
            ctx,
            &format!(
                "SELECT {FACT_COLUMNS} FROM facts f \
                 WHERE f.deleted_at IS NULL ORDER BY f.category, f.key"
            ),
            [],
        )
    }

    /// Active facts sharing at least one subject with `subjects`, most recently
    /// updated first.
    pub fn get_by_subjects(&self, ctx: &RequestContext, subjects: &[String]) -> Result<Vec<Fact>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=subjects.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {FACT_COLUMNS} FROM facts f \
             WHERE f.deleted_at IS NULL \
               AND EXISTS (SELECT 1 FROM json_each(CASE WHEN json_valid(f.subjects) THEN f.subjects ELSE '[]' END) s \
                           WHERE s.value IN ({})) \
             ORDER BY f.updated_at DESC, f.rowid DESC",
            placeholders.join(", ")
        );
        self.query(ctx, &sql, params_from_iter(subjects.iter()))
    }

    /// Store (or clear, with an empty slice) the embedding for a fact id.
    pub fn set_embedding(&self, ctx: &RequestContext, id: &str, embedding: &[f32]) -> Result<()> {
        let blob = codec::encode(embedding);
        let blob = (!blob.is_empty()).then_some(blob);
        self.db.with_conn(ctx, |conn| {
            let rows = conn.execute(
                "UPDATE facts SET embedding = ?1 WHERE id = ?2",
                params![blob, id],
            )?;
            if rows == 0 {
                return Err(Error::NotFound {
                    what: "fact",
                    id: id.to_string(),
                });
            }
            tracing::debug!(id, dim = embedding.len(), "fact embedding stored");
            Ok(())
        })
    }

    /// Active facts that carry an embedding.
    pub fn get_all_with_embeddings(&self, ctx: &RequestContext) -> Result<Vec<Fact>> {
        self.query(
            ctx,
            &format!(
                "SELECT {FACT_COLUMNS} FROM facts f \
                 WHERE f.deleted_at IS NULL AND f.embedding IS NOT NULL AND length(f.embedding) > 0 \
                 ORDER BY f.category, f.key"
            ),
            [],
        )
    }

    /// Active facts still waiting for an embedding.
    pub fn get_facts_without_embeddings(&self, ctx: &RequestContext) -> Result<Vec<Fact>> {
        self.query(
            ctx,
            &format!(
                "SELECT {FACT_COLUMNS} FROM facts f \
                 WHERE f.deleted_at IS NULL AND (f.embedding IS NULL OR length(f.embedding) = 0) \
                 ORDER BY f.category, f.key"
            ),
            [],
        )
    }

    /// Model that produced the stored embeddings, if recorded.
    pub fn embedding_model(&self, ctx: &RequestContext) -> Result<Option<String>> {
        self.db
            .with_conn(ctx, |conn| Ok(migrations::get_embedding_model(conn)?))
    }

    pub fn record_embedding_model(&self, ctx: &RequestContext, model: &str) -> Result<()> {
        self.db
            .with_conn(ctx, |conn| Ok(migrations::set_embedding_model(conn, model)?))
    }

    pub(crate) fn query(
        &self,
        ctx: &RequestContext,
        sql: &str,
        params: impl Params,
    ) -> Result<Vec<Fact>> {
        self.db.with_conn(ctx, |conn| query_facts(conn, sql, params))
    }
}

pub(crate) fn query_facts(conn: &Connection, sql: &str, params: impl Params) -> Result<Vec<Fact>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, fact_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Look up a row by `(category, key)`, optionally including soft-deleted rows.
fn fetch(
    conn: &Connection,
    category: Category,
    key: &str,
    include_deleted: bool,
) -> Result<Option<Fact>> {
    let sql = format!(
        "SELECT {FACT_COLUMNS} FROM facts f WHERE f.category = ?1 AND f.key = ?2{}",
        if include_deleted { "" } else { " AND f.deleted_at IS NULL" }
    );
    Ok(conn
        .query_row(&sql, params![category.as_str(), key], fact_from_row)
        .optional()?)
}

pub(crate) fn validate(fact: &NewFact) -> Result<()> {
    if fact.key.trim().is_empty() {
        return Err(Error::Invalid("fact key must not be empty".into()));
    }
    if !(0.0..=1.0).contains(&fact.confidence) {
        return Err(Error::Invalid(format!(
            "confidence must be between 0.0 and 1.0, got {}",
            fact.confidence
        )));
    }
    Ok(())
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Map a row selected with [`FACT_COLUMNS`].
pub(crate) fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<Fact> {
    let category: String = row.get(1)?;
    let category = category
        .parse::<Category>()
        .map_err(|e| conversion_error(1, std::io::Error::other(e)))?;

    let embedding: Option<Vec<u8>> = row.get(6)?;
    let embedding = match embedding {
        Some(blob) if !blob.is_empty() => {
            Some(codec::decode(&blob).map_err(|e| conversion_error(6, e))?)
        }
        _ => None,
    };

    let id: String = row.get(0)?;
    let subjects: Option<String> = row.get(7)?;
    let subjects = match subjects.as_deref() {
        None | Some("") => Vec::new(),
        Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
            tracing::warn!(id = %id, error = %e, "malformed subjects column, treating as empty");
            Vec::new()
        }),
    };

    Ok(Fact {
        id,
        category,
        key: row.get(2)?,
        value: row.get(3)?,
        source: row.get(4)?,
        confidence: row.get(5)?,
        embedding,
        subjects,
        reference: row.get::<_, Option<String>>(8)?.filter(|r| !r.is_empty()),
        created_at: time::column(row, 9)?,
        updated_at: time::column(row, 10)?,
        accessed_at: time::column(row, 11)?,
        deleted_at: time::opt_column(row, 12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> FactStore {
        FactStore::new(Database::open_in_memory().unwrap())
    }

    fn ctx() -> RequestContext {
        RequestContext::new()
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = test_store();
        let input = NewFact::new(Category::Preference, "time_format", "24-hour")
            .source("user")
            .subjects(["entity:clock.kitchen"])
            .reference("kb/prefs.md");

        let stored = store.set(&ctx(), &input).unwrap();
        let fetched = store.get(&ctx(), Category::Preference, "time_format").unwrap();

        assert_eq!(fetched.id, stored.id);
        assert_eq!(fetched.value, "24-hour");
        assert_eq!(fetched.source, "user");
        assert_eq!(fetched.confidence, 1.0);
        assert_eq!(fetched.subjects, vec!["entity:clock.kitchen".to_string()]);
        assert_eq!(fetched.reference.as_deref(), Some("kb/prefs.md"));
        assert!(fetched.updated_at >= fetched.created_at);
        assert!(fetched.accessed_at >= fetched.created_at);
        assert!(fetched.deleted_at.is_none());
    }

    #[test]
    fn set_updates_in_place_and_keeps_created_at() {
        let store = test_store();
        let first = store
            .set(&ctx(), &NewFact::new(Category::Home, "thermostat", "68F"))
            .unwrap();
        let second = store
            .set(&ctx(), &NewFact::new(Category::Home, "thermostat", "70F").confidence(0.8))
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.value, "70F");
        assert_eq!(second.confidence, 0.8);
        assert_eq!(store.get_all(&ctx()).unwrap().len(), 1);
    }

    #[test]
    fn changed_value_drops_embedding() {
        let store = test_store();
        let fact = store
            .set(&ctx(), &NewFact::new(Category::Device, "garage_sensor", "zigbee"))
            .unwrap();
        store.set_embedding(&ctx(), &fact.id, &[1.0, 0.0]).unwrap();

        // Same value keeps the vector.
        let same = store
            .set(&ctx(), &NewFact::new(Category::Device, "garage_sensor", "zigbee"))
            .unwrap();
        assert!(same.embedding.is_some());

        let changed = store
            .set(&ctx(), &NewFact::new(Category::Device, "garage_sensor", "z-wave"))
            .unwrap();
        assert!(changed.embedding.is_none());
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = test_store();
        let err = store.get(&ctx(), Category::Device, "garage_sensor").unwrap_err();
        assert_eq!(err.to_string(), "fact not found: device/garage_sensor");
    }

    #[test]
    fn set_rejects_bad_input() {
        let store = test_store();
        let empty_key = NewFact::new(Category::User, "  ", "x");
        assert!(matches!(store.set(&ctx(), &empty_key), Err(Error::Invalid(_))));

        let bad_confidence = NewFact::new(Category::User, "name", "Dan").confidence(1.5);
        assert!(matches!(store.set(&ctx(), &bad_confidence), Err(Error::Invalid(_))));
    }

    #[test]
    fn category_listing_is_ordered_by_key() {
        let store = test_store();
        for key in ["zebra", "alpha", "mango"] {
            store.set(&ctx(), &NewFact::new(Category::Routine, key, "v")).unwrap();
        }
        store.set(&ctx(), &NewFact::new(Category::Home, "other", "v")).unwrap();

        let keys: Vec<String> = store
            .get_by_category(&ctx(), Category::Routine)
            .unwrap()
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["alpha", "mango", "zebra"]);
    }

    #[test]
    fn get_all_orders_by_category_then_key() {
        let store = test_store();
        store.set(&ctx(), &NewFact::new(Category::User, "b", "v")).unwrap();
        store.set(&ctx(), &NewFact::new(Category::Device, "z", "v")).unwrap();
        store.set(&ctx(), &NewFact::new(Category::User, "a", "v")).unwrap();

        let pairs: Vec<(String, String)> = store
            .get_all(&ctx())
            .unwrap()
            .into_iter()
            .map(|f| (f.category.to_string(), f.key))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("device".to_string(), "z".to_string()),
                ("user".to_string(), "a".to_string()),
                ("user".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn subject_lookup_fans_out_newest_first() {
        let store = test_store();
        let older = store
            .set(
                &ctx(),
                &NewFact::new(Category::Device, "kitchen_light", "Hue bulb")
                    .subjects(["entity:light.kitchen"]),
            )
            .unwrap();
        let newer = store
            .set(
                &ctx(),
                &NewFact::new(Category::Routine, "evening_lights", "Kitchen light on at dusk")
                    .subjects(["zone:kitchen", "entity:light.kitchen"]),
            )
            .unwrap();
        store
            .set(
                &ctx(),
                &NewFact::new(Category::Home, "driveway", "Gravel").subjects(["zone:driveway"]),
            )
            .unwrap();

        let hits = store
            .get_by_subjects(&ctx(), &["entity:light.kitchen".to_string()])
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
    }

    #[test]
    fn subject_lookup_with_no_subjects_is_empty() {
        let store = test_store();
        store
            .set(&ctx(), &NewFact::new(Category::Home, "k", "v").subjects(["zone:x"]))
            .unwrap();
        assert!(store.get_by_subjects(&ctx(), &[]).unwrap().is_empty());
    }

    #[test]
    fn embedding_partitions() {
        let store = test_store();
        let a = store.set(&ctx(), &NewFact::new(Category::Home, "a", "v")).unwrap();
        store.set(&ctx(), &NewFact::new(Category::Home, "b", "v")).unwrap();
        store.set_embedding(&ctx(), &a.id, &[0.5, 0.5]).unwrap();

        let with: Vec<String> = store
            .get_all_with_embeddings(&ctx())
            .unwrap()
            .into_iter()
            .map(|f| f.key)
            .collect();
        let without: Vec<String> = store
            .get_facts_without_embeddings(&ctx())
            .unwrap()
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(with, vec!["a"]);
        assert_eq!(without, vec!["b"]);
    }

    #[test]
    fn set_embedding_unknown_id_is_not_found() {
        let store = test_store();
        let err = store.set_embedding(&ctx(), "nope", &[1.0]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn embedding_model_is_recorded() {
        let store = test_store();
        assert!(store.embedding_model(&ctx()).unwrap().is_none());
        store.record_embedding_model(&ctx(), "nomic-embed-text").unwrap();
        assert_eq!(
            store.embedding_model(&ctx()).unwrap().as_deref(),
            Some("nomic-embed-text")
        );
    }

    #[test]
    fn malformed_subjects_read_as_empty() {
        let store = test_store();
        store
            .set(&ctx(), &NewFact::new(Category::Home, "bad", "garage remote").subjects(["zone:garage"]))
            .unwrap();
        store
            .set(&ctx(), &NewFact::new(Category::Home, "good", "garage door").subjects(["zone:garage"]))
            .unwrap();
        store
            .database()
            .with_conn(&ctx(), |conn| {
                conn.execute("UPDATE facts SET subjects = 'not json' WHERE key = 'bad'", [])?;
                Ok(())
            })
            .unwrap();

        let all = store.get_all(&ctx()).unwrap();
        assert_eq!(all.len(), 2);
        let bad = all.iter().find(|f| f.key == "bad").unwrap();
        assert!(bad.subjects.is_empty());

        assert_eq!(store.get_by_category(&ctx(), Category::Home).unwrap().len(), 2);
        assert_eq!(store.search(&ctx(), "garage").unwrap().len(), 2);

        let tagged = store.get_by_subjects(&ctx(), &["zone:garage".to_string()]).unwrap();
        let keys: Vec<&str> = tagged.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["good"]);
    }
}
