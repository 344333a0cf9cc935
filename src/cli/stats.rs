use anyhow::Result;

use hearth::anticipation::AnticipationStore;
use hearth::config::HearthConfig;
use hearth::db::migrations;
use hearth::memory::FactStore;
use hearth::RequestContext;

/// Display fact and anticipation counts in the terminal.
pub fn stats(config: &HearthConfig) -> Result<()> {
    let db = super::open_database(config)?;
    let ctx = RequestContext::new();

    let facts = FactStore::new(db.clone());
    let anticipations = AnticipationStore::new(db.clone());

    let fact_stats = facts.stats(&ctx)?;
    let active = anticipations.active(&ctx)?.len();
    let total = anticipations.all(&ctx, true)?.len();
    let embedded = facts.get_all_with_embeddings(&ctx)?.len();
    let (version, model) = db.with_conn(&ctx, |conn| {
        Ok((
            migrations::get_schema_version(conn)?,
            migrations::get_embedding_model(conn)?,
        ))
    })?;

    println!("Hearth Statistics");
    println!("{}", "=".repeat(40));
    println!("  Active facts:        {}", fact_stats.total);
    println!("  With embeddings:     {embedded}");
    println!();

    println!("By Category:");
    for (category, count) in &fact_stats.by_category {
        println!("  {:<14} {}", category, count);
    }
    println!();

    println!("Anticipations:         {active} active / {total} total");
    println!("Schema version:        {version}");
    println!(
        "Full-text search:      {}",
        if db.fts_enabled() { "fts5" } else { "LIKE fallback" }
    );
    println!(
        "Embedding model:       {}",
        model.as_deref().unwrap_or("(none recorded)")
    );
    if let Some(size) = db
        .path()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
    {
        println!("Database size:         {size} bytes");
    }

    Ok(())
}
