//! Soft deletion of facts.
//!
//! Rows are never removed: `deleted_at` is set and every active read filters
//! on it. A later [`FactStore::set`] with the same `(category, key)` clears the
//! marker and keeps the original id.

use rusqlite::params;

use crate::context::RequestContext;
use crate::db::schema;
use crate::error::{Error, Result};
use crate::memory::types::Category;
use crate::time;

use super::store::FactStore;

impl FactStore {
    /// Soft-delete the active fact at `(category, key)`.
    ///
    /// Fails with `NotFound` if there is no active row (including one that
    /// was already deleted).
    pub fn delete(&self, ctx: &RequestContext, category: Category, key: &str) -> Result<()> {
        let fts = self.fts_enabled();
        self.database().with_conn(ctx, |conn| {
            let tx = conn.transaction()?;
            let rows = tx.execute(
                "UPDATE facts SET deleted_at = ?1 \
                 WHERE category = ?2 AND key = ?3 AND deleted_at IS NULL",
                params![time::now_db(), category.as_str(), key],
            )?;
            if rows == 0 {
                return Err(Error::fact_not_found(category.as_str(), key));
            }
            if fts {
                schema::rebuild_fts(&tx)?;
            }
            tx.commit()?;

            tracing::info!(category = %category, key, "fact deleted");
            Ok(())
        })
    }

    /// Soft-delete every active fact carrying `source`. Returns the count.
    ///
    /// Used before re-ingesting a document so repeated ingestion leaves no
    /// duplicate active rows.
    pub fn delete_by_source(&self, ctx: &RequestContext, source: &str) -> Result<usize> {
        let fts = self.fts_enabled();
        self.database().with_conn(ctx, |conn| {
            let tx = conn.transaction()?;
            let rows = tx.execute(
                "UPDATE facts SET deleted_at = ?1 WHERE source = ?2 AND deleted_at IS NULL",
                params![time::now_db(), source],
            )?;
            if rows > 0 && fts {
                schema::rebuild_fts(&tx)?;
            }
            tx.commit()?;

            tracing::info!(source, deleted = rows, "facts deleted by source");
            Ok(rows)
        })
    }
}
