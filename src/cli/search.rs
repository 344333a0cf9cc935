use anyhow::{Context, Result};

use hearth::config::HearthConfig;
use hearth::embedding;
use hearth::memory::{self, FactStore};

/// Run a recall query from the terminal: semantic hits first (when an
/// embedder is configured), then keyword hits.
pub async fn search(config: &HearthConfig, query: &str, limit: usize) -> Result<()> {
    let store = FactStore::new(super::open_database(config)?);
    let embedder = embedding::create_embedder(&config.embedding)
        .context("failed to create embedder")?;
    let ctx = super::interruptible_context();

    let hits = memory::recall(&store, embedder.as_deref(), &ctx, query, limit).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let score = hit
            .score
            .map(|s| format!("score: {s:.4}"))
            .unwrap_or_else(|| "keyword".to_string());
        println!(
            "  {}. {}/{} ({score}, confidence: {:.2})",
            i + 1,
            hit.fact.category,
            hit.fact.key,
            hit.fact.confidence,
        );
        println!("     {}", super::preview(&hit.fact.value, 120));
        println!();
    }

    Ok(())
}
