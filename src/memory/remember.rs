//! Async entry points used by the agent's memory tools.
//!
//! Store calls are synchronous and run on the blocking pool; embedder calls
//! are awaited directly. Embedding failures never lose a write: `remember`
//! stores the fact without a vector and [`generate_missing_embeddings`] fills
//! the gap later.

use std::collections::HashSet;

use serde::Serialize;

use crate::context::RequestContext;
use crate::db;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::memory::store::{validate, FactStore};
use crate::memory::types::{Category, Fact, NewFact};

/// Text embedded for a fact: `"<category>/<key>: <value>"`.
pub fn embedding_text(category: Category, key: &str, value: &str) -> String {
    format!("{category}/{key}: {value}")
}

/// Store a fact, embedding it when an embedder is configured.
///
/// Input is validated before the embedder is called. An embedder
/// `Integration` error is logged and the fact is stored without a vector;
/// cancellation is returned as-is.
pub async fn remember(
    store: &FactStore,
    embedder: Option<&dyn Embedder>,
    ctx: &RequestContext,
    fact: NewFact,
) -> Result<Fact> {
    validate(&fact)?;

    let embedding = match embedder {
        Some(embedder) => {
            let text = embedding_text(fact.category, &fact.key, &fact.value);
            match embedder.generate(ctx, &text).await {
                Ok(v) if !v.is_empty() => Some((v, embedder.model().to_string())),
                Ok(_) => None,
                Err(Error::Integration(msg)) => {
                    tracing::warn!(
                        category = %fact.category,
                        key = %fact.key,
                        error = %msg,
                        "embedding failed, storing fact without vector"
                    );
                    None
                }
                Err(e) => return Err(e),
            }
        }
        None => None,
    };

    let store = store.clone();
    let ctx = ctx.clone();
    db::blocking(move || {
        let mut stored = store.set(&ctx, &fact)?;
        if let Some((vector, model)) = embedding {
            store.set_embedding(&ctx, &stored.id, &vector)?;
            note_embedding_model(&store, &ctx, &model)?;
            stored.embedding = Some(vector);
        }
        Ok(stored)
    })
    .await
}

/// A recalled fact; `score` is set for semantic hits only.
#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    #[serde(flatten)]
    pub fact: Fact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Semantic hits first (when an embedder is available), then keyword hits,
/// de-duplicated by id and capped at `limit`. No score fusion.
pub async fn recall(
    store: &FactStore,
    embedder: Option<&dyn Embedder>,
    ctx: &RequestContext,
    query: &str,
    limit: usize,
) -> Result<Vec<RecallHit>> {
    if limit == 0 || query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = match embedder {
        Some(embedder) => match embedder.generate(ctx, query).await {
            Ok(v) => Some(v),
            Err(Error::Integration(msg)) => {
                tracing::warn!(error = %msg, "query embedding failed, keyword recall only");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    let store = store.clone();
    let ctx = ctx.clone();
    let query = query.to_string();
    db::blocking(move || {
        let mut hits = Vec::new();
        let mut seen = HashSet::new();

        if let Some(vector) = query_vec {
            for scored in store.semantic_search(&ctx, &vector, limit)? {
                if seen.insert(scored.fact.id.clone()) {
                    hits.push(RecallHit {
                        fact: scored.fact,
                        score: Some(scored.score),
                    });
                }
            }
        }

        for fact in store.search(&ctx, &query)? {
            if hits.len() >= limit {
                break;
            }
            if seen.insert(fact.id.clone()) {
                hits.push(RecallHit { fact, score: None });
            }
        }

        hits.truncate(limit);
        tracing::debug!(query = %query, returned = hits.len(), "recall");
        Ok(hits)
    })
    .await
}

/// Soft-delete a fact.
pub async fn forget(
    store: &FactStore,
    ctx: &RequestContext,
    category: Category,
    key: &str,
) -> Result<()> {
    let store = store.clone();
    let ctx = ctx.clone();
    let key = key.to_string();
    db::blocking(move || store.delete(&ctx, category, &key)).await
}

/// Outcome of an embedding backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    pub failed: usize,
}

/// Embed every active fact that has no vector yet.
///
/// Facts whose embedding fails, or that vanish mid-run, are counted as
/// failed and skipped. `on_progress(done, total)` is called after each fact.
pub async fn backfill_embeddings(
    store: &FactStore,
    embedder: &dyn Embedder,
    ctx: &RequestContext,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<BackfillReport> {
    let pending = {
        let store = store.clone();
        let ctx = ctx.clone();
        db::blocking(move || store.get_facts_without_embeddings(&ctx)).await?
    };
    let total = pending.len();
    let mut report = BackfillReport::default();

    tracing::info!(total, model = embedder.model(), "embedding backfill started");

    for (done, fact) in pending.into_iter().enumerate() {
        ctx.check()?;

        let text = embedding_text(fact.category, &fact.key, &fact.value);
        match embedder.generate(ctx, &text).await {
            Ok(vector) if !vector.is_empty() => {
                let store = store.clone();
                let task_ctx = ctx.clone();
                let id = fact.id.clone();
                match db::blocking(move || store.set_embedding(&task_ctx, &id, &vector)).await {
                    Ok(()) => report.embedded += 1,
                    Err(e) if e.is_not_found() => report.failed += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(_) => {
                tracing::warn!(id = %fact.id, "embedder returned an empty vector");
                report.failed += 1;
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(id = %fact.id, error = %e, "embedding failed during backfill");
                report.failed += 1;
            }
        }

        on_progress(done + 1, total);
    }

    if report.embedded > 0 {
        let store = store.clone();
        let ctx = ctx.clone();
        let model = embedder.model().to_string();
        db::blocking(move || note_embedding_model(&store, &ctx, &model)).await?;
    }

    tracing::info!(
        embedded = report.embedded,
        failed = report.failed,
        "embedding backfill finished"
    );
    Ok(report)
}

/// [`backfill_embeddings`] without progress reporting.
pub async fn generate_missing_embeddings(
    store: &FactStore,
    embedder: &dyn Embedder,
    ctx: &RequestContext,
) -> Result<BackfillReport> {
    backfill_embeddings(store, embedder, ctx, |_, _| {}).await
}

/// Record `model` as the producer of stored vectors, warning if a different
/// model was recorded before. Returns `false` on a mismatch.
pub fn note_embedding_model(store: &FactStore, ctx: &RequestContext, model: &str) -> Result<bool> {
    match store.embedding_model(ctx)? {
        Some(recorded) if recorded == model => Ok(true),
        Some(recorded) => {
            tracing::warn!(
                recorded = %recorded,
                configured = %model,
                "embedding model changed; stored vectors may not be comparable, run backfill after clearing them"
            );
            Ok(false)
        }
        None => {
            store.record_embedding_model(ctx, model)?;
            tracing::info!(model, "embedding model recorded");
            Ok(true)
        }
    }
}
