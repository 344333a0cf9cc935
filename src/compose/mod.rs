//! Assembly of the context block injected into each agent activation.
//!
//! A [`Composer`] runs its [`ContextProvider`]s concurrently and joins their
//! non-empty output, in provider order, with a blank line. A failing provider
//! is logged and its section left out; composition itself never fails.

pub mod providers;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::anticipation::Matcher;
use crate::config::ContextConfig;
use crate::context::RequestContext;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::memory::FactStore;
use crate::state_window::StateWindow;

pub use providers::{
    AnticipationProvider, EntityStates, SemanticFactsProvider, SubjectFactsProvider,
};

/// One section of the composed context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render this provider's section for `message`; an empty string means
    /// "nothing to add".
    async fn context(&self, ctx: &RequestContext, message: &str) -> Result<String>;
}

#[derive(Clone, Default)]
pub struct Composer {
    providers: Vec<Arc<dyn ContextProvider>>,
}

impl std::fmt::Debug for Composer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("Composer").field("providers", &names).finish()
    }
}

impl Composer {
    pub fn new(providers: Vec<Arc<dyn ContextProvider>>) -> Self {
        Self { providers }
    }

    /// The standard pipeline: subject facts, semantic facts, recent state
    /// changes, then matched anticipations.
    pub fn standard(
        facts: FactStore,
        embedder: Option<Arc<dyn Embedder>>,
        window: Arc<StateWindow>,
        matcher: Matcher,
        entities: Option<Arc<dyn EntityStates>>,
        config: &ContextConfig,
    ) -> Self {
        let mut anticipations = AnticipationProvider::new(matcher);
        if let Some(entities) = entities {
            anticipations = anticipations.with_entity_states(entities);
        }
        let providers: Vec<Arc<dyn ContextProvider>> = vec![
            Arc::new(SubjectFactsProvider::new(facts.clone(), config.subject_max_facts)),
            Arc::new(SemanticFactsProvider::new(
                facts,
                embedder,
                config.semantic_max_facts,
                config.semantic_min_score,
            )),
            window,
            Arc::new(anticipations),
        ];
        Self::new(providers)
    }

    pub fn push(&mut self, provider: Arc<dyn ContextProvider>) {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|p| p.name())
    }

    /// Gather every provider's section for `message` and join them.
    pub async fn compose(&self, ctx: &RequestContext, message: &str) -> String {
        let results = join_all(self.providers.iter().map(|p| p.context(ctx, message))).await;

        let mut sections = Vec::with_capacity(results.len());
        for (provider, result) in self.providers.iter().zip(results) {
            match result {
                Ok(section) if section.trim().is_empty() => {}
                Ok(section) => sections.push(section),
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "context provider failed, section omitted");
                }
            }
        }

        tracing::debug!(sections = sections.len(), "context composed");
        sections.join("\n\n")
    }
}
