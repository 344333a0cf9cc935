use rusqlite::{params, Connection};

use crate::context::RequestContext;
use crate::embedding::codec;
use crate::error::Result;
use crate::memory::store::{query_facts, FactStore, FACT_COLUMNS};
use crate::memory::types::{Fact, ScoredFact};

/// Maximum rows returned by keyword search.
pub const SEARCH_LIMIT: usize = 50;

impl FactStore {
    /// Keyword search over key, value, and source.
    ///
    /// With FTS5 available, terms are OR-ed and ranked by BM25. Without it, or
    /// if the FTS query fails, falls back to a case-insensitive `LIKE` on key
    /// and value ordered by most recent access. Blank queries match nothing.
    pub fn search(&self, ctx: &RequestContext, query: &str) -> Result<Vec<Fact>> {
        let Some(fts_query) = sanitize_fts_query(query) else {
            return Ok(Vec::new());
        };
        let needle = query.trim();
        let fts_enabled = self.fts_enabled();

        self.database().with_conn(ctx, |conn| {
            if fts_enabled {
                match fts_search(conn, &fts_query) {
                    Ok(hits) => return Ok(hits),
                    Err(e) if e.is_interrupt() => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, query = %needle, "FTS query failed, falling back to LIKE");
                    }
                }
            } else {
                tracing::debug!(query = %needle, "FTS disabled, using LIKE search");
            }
            like_search(conn, needle)
        })
    }

    /// Rank active, embedded facts by cosine similarity to `query`.
    ///
    /// Facts whose embedding dimension differs from the query are skipped.
    /// `limit == 0` returns nothing without touching the database.
    pub fn semantic_search(
        &self,
        ctx: &RequestContext,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredFact>> {
        if limit == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let candidates: Vec<Fact> = self
            .get_all_with_embeddings(ctx)?
            .into_iter()
            .filter(|f| f.embedding.as_ref().is_some_and(|e| e.len() == query.len()))
            .collect();

        let vectors: Vec<&[f32]> = candidates
            .iter()
            .map(|f| f.embedding.as_deref().unwrap_or_default())
            .collect();
        let ranked = codec::top_k(query, &vectors, limit);

        tracing::debug!(candidates = candidates.len(), returned = ranked.len(), "semantic search");

        let mut slots: Vec<Option<Fact>> = candidates.into_iter().map(Some).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|(idx, score)| slots[idx].take().map(|fact| ScoredFact { fact, score }))
            .collect())
    }
}

fn fts_search(conn: &Connection, fts_query: &str) -> Result<Vec<Fact>> {
    query_facts(
        conn,
        &format!(
            "SELECT {FACT_COLUMNS} FROM facts_fts \
             JOIN facts f ON f.rowid = facts_fts.rowid \
             WHERE facts_fts MATCH ?1 AND f.deleted_at IS NULL \
             ORDER BY bm25(facts_fts) LIMIT ?2"
        ),
        params![fts_query, SEARCH_LIMIT as i64],
    )
}

fn like_search(conn: &Connection, needle: &str) -> Result<Vec<Fact>> {
    let pattern = format!("%{}%", escape_like(needle));
    query_facts(
        conn,
        &format!(
            "SELECT {FACT_COLUMNS} FROM facts f \
             WHERE f.deleted_at IS NULL \
               AND (f.key LIKE ?1 ESCAPE '\\' OR f.value LIKE ?1 ESCAPE '\\') \
             ORDER BY f.accessed_at DESC LIMIT ?2"
        ),
        params![pattern, SEARCH_LIMIT as i64],
    )
}

/// Quote each whitespace-delimited term (doubling embedded `"`) and join with
/// `OR`, so user text can never be parsed as FTS5 syntax. `None` for blank input.
pub fn sanitize_fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
