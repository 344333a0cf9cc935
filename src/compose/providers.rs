//! The built-in context providers.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;

use crate::anticipation::{Anticipation, Matcher};
use crate::compose::ContextProvider;
use crate::context::RequestContext;
use crate::db;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::memory::{Fact, FactStore};

pub const SUBJECT_FACTS_HEADER: &str = "### Subject-Keyed Facts";
pub const ANTICIPATIONS_HEADER: &str = "## Active Anticipations";
pub const ANTICIPATIONS_HINT: &str = "Consider resolving anticipations that have been fulfilled.";

/// Facts tagged with any of the subjects attached to the request context.
#[derive(Debug, Clone)]
pub struct SubjectFactsProvider {
    store: FactStore,
    max_facts: usize,
}

impl SubjectFactsProvider {
    pub fn new(store: FactStore, max_facts: usize) -> Self {
        Self { store, max_facts }
    }
}

#[async_trait]
impl ContextProvider for SubjectFactsProvider {
    fn name(&self) -> &str {
        "subject_facts"
    }

    async fn context(&self, ctx: &RequestContext, _message: &str) -> Result<String> {
        let Some(subjects) = ctx.subjects() else {
            return Ok(String::new());
        };
        let subjects = subjects.to_vec();

        let store = self.store.clone();
        let task_ctx = ctx.clone();
        let mut facts = db::blocking(move || store.get_by_subjects(&task_ctx, &subjects)).await?;
        facts.truncate(self.max_facts);

        if facts.is_empty() {
            return Ok(String::new());
        }
        let entries: Vec<String> = facts.iter().map(format_subject_fact).collect();
        Ok(format!("{SUBJECT_FACTS_HEADER}\n\n{}", entries.join("\n\n")))
    }
}

fn format_subject_fact(fact: &Fact) -> String {
    let mut out = format!(
        "**{}/{}** [{}]\n{}",
        fact.category,
        fact.key,
        fact.subjects.join(", "),
        fact.value
    );
    if let Some(reference) = &fact.reference {
        let _ = write!(out, "\nFull details: kb:{reference}");
    }
    out
}

/// Facts semantically close to the message.
#[derive(Clone)]
pub struct SemanticFactsProvider {
    store: FactStore,
    embedder: Option<Arc<dyn Embedder>>,
    max_facts: usize,
    min_score: f32,
}

impl std::fmt::Debug for SemanticFactsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticFactsProvider")
            .field("embedder", &self.embedder.as_ref().map(|e| e.model().to_string()))
            .field("max_facts", &self.max_facts)
            .field("min_score", &self.min_score)
            .finish()
    }
}

impl SemanticFactsProvider {
    pub fn new(
        store: FactStore,
        embedder: Option<Arc<dyn Embedder>>,
        max_facts: usize,
        min_score: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            max_facts,
            min_score,
        }
    }
}

#[async_trait]
impl ContextProvider for SemanticFactsProvider {
    fn name(&self) -> &str {
        "semantic_facts"
    }

    async fn context(&self, ctx: &RequestContext, message: &str) -> Result<String> {
        let Some(embedder) = &self.embedder else {
            return Ok(String::new());
        };
        if message.trim().is_empty() {
            return Ok(String::new());
        }

        let query = embedder.generate(ctx, message).await?;

        let store = self.store.clone();
        let task_ctx = ctx.clone();
        let limit = self.max_facts;
        let hits = db::blocking(move || store.semantic_search(&task_ctx, &query, limit)).await?;

        let entries: Vec<String> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.min_score)
            .map(|hit| {
                format!(
                    "**{}/{}** ({}% relevant)\n{}",
                    hit.fact.category,
                    hit.fact.key,
                    (hit.score * 100.0).round() as i64,
                    hit.fact.value
                )
            })
            .collect();
        Ok(entries.join("\n\n"))
    }
}

/// Current state lookup for entities named in `context_entities`.
#[async_trait]
pub trait EntityStates: Send + Sync {
    /// `Ok(None)` when the entity is unknown to the backend.
    async fn state(&self, ctx: &RequestContext, entity_id: &str) -> Result<Option<String>>;
}

/// Anticipations matched for this wake, with optional entity snapshots.
#[derive(Clone)]
pub struct AnticipationProvider {
    matcher: Matcher,
    entities: Option<Arc<dyn EntityStates>>,
}

impl std::fmt::Debug for AnticipationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnticipationProvider")
            .field("matcher", &self.matcher)
            .field("entity_states", &self.entities.is_some())
            .finish()
    }
}

impl AnticipationProvider {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            entities: None,
        }
    }

    pub fn with_entity_states(mut self, entities: Arc<dyn EntityStates>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Pre-matched anticipations from the context win; otherwise the wake on
    /// the context is matched, skipping anything on cooldown.
    async fn matched(&self, ctx: &RequestContext) -> Result<Vec<Anticipation>> {
        if let Some(matched) = ctx.anticipations() {
            return Ok(matched.to_vec());
        }
        let Some(wake) = ctx.wake() else {
            return Ok(Vec::new());
        };

        let matcher = self.matcher.clone();
        let task_ctx = ctx.clone();
        let wake = wake.clone();
        db::blocking(move || matcher.due(&task_ctx, &wake)).await
    }

    async fn entity_lines(&self, ctx: &RequestContext, anticipation: &Anticipation) -> Vec<String> {
        let Some(entities) = &self.entities else {
            return Vec::new();
        };
        let mut lines = Vec::with_capacity(anticipation.context_entities.len());
        for entity_id in &anticipation.context_entities {
            let state = match entities.state(ctx, entity_id).await {
                Ok(Some(state)) => state,
                Ok(None) => "unknown".to_string(),
                Err(e) => {
                    tracing::debug!(entity_id = %entity_id, error = %e, "entity state unavailable");
                    "unknown".to_string()
                }
            };
            lines.push(format!("    - {entity_id}: {state}"));
        }
        lines
    }
}

#[async_trait]
impl ContextProvider for AnticipationProvider {
    fn name(&self) -> &str {
        "anticipations"
    }

    async fn context(&self, ctx: &RequestContext, _message: &str) -> Result<String> {
        let matched = self.matched(ctx).await?;
        if matched.is_empty() {
            return Ok(String::new());
        }

        let mut out = String::from(ANTICIPATIONS_HEADER);
        for anticipation in &matched {
            let _ = write!(out, "\n- **{}** [id: {}]", anticipation.description, anticipation.id);
            if !anticipation.context.is_empty() {
                let _ = write!(out, "\n  Context: {}", anticipation.context);
            }
            let states = self.entity_lines(ctx, anticipation).await;
            if !states.is_empty() {
                let _ = write!(out, "\n  Current states:\n{}", states.join("\n"));
            }
        }
        let _ = write!(out, "\n\n{ANTICIPATIONS_HINT}");
        Ok(out)
    }
}
