#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hearth::db::Database;
use hearth::embedding::Embedder;
use hearth::{Error, RequestContext, Result};

pub const DIM: usize = 16;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Database {
    Database::open_in_memory().unwrap()
}

pub fn ctx() -> RequestContext {
    RequestContext::new()
}

/// Generate a deterministic embedding with a spike at position `seed`.
/// Distinct seeds produce orthogonal vectors.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed % DIM] = 1.0;
    v
}

/// Scripted embedder: texts containing a registered keyword map to that
/// keyword's vector, anything else to the last axis. Texts containing a
/// registered failure marker return an integration error.
#[derive(Default)]
pub struct FakeEmbedder {
    keywords: Vec<(String, Vec<f32>)>,
    failures: Vec<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, word: &str, seed: usize) -> Self {
        self.keywords.push((word.to_string(), test_embedding(seed)));
        self
    }

    pub fn fail_on(mut self, marker: &str) -> Self {
        self.failures.push(marker.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn generate(&self, ctx: &RequestContext, text: &str) -> Result<Vec<f32>> {
        ctx.check()?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        if self.failures.iter().any(|m| lower.contains(m.as_str())) {
            return Err(Error::Integration(format!("fake embedder refused: {text}")));
        }
        Ok(self
            .keywords
            .iter()
            .find(|(word, _)| lower.contains(word.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| test_embedding(DIM - 1)))
    }

    fn model(&self) -> &str {
        "fake-embedder"
    }
}

/// Entity states served from a fixed map.
pub struct FixedStates(pub HashMap<String, String>);

#[async_trait]
impl hearth::compose::EntityStates for FixedStates {
    async fn state(&self, _ctx: &RequestContext, entity_id: &str) -> Result<Option<String>> {
        Ok(self.0.get(entity_id).cloned())
    }
}
