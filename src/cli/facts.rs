use anyhow::{anyhow, Result};

use hearth::config::HearthConfig;
use hearth::memory::{Category, FactStore};
use hearth::RequestContext;

/// List active facts, optionally limited to one category.
pub fn facts(config: &HearthConfig, category: Option<&str>) -> Result<()> {
    let store = FactStore::new(super::open_database(config)?);
    let ctx = RequestContext::new();

    let facts = match category {
        Some(name) => {
            let category: Category = name.parse().map_err(|e: String| anyhow!(e))?;
            store.get_by_category(&ctx, category)?
        }
        None => store.get_all(&ctx)?,
    };

    if facts.is_empty() {
        println!("No facts stored.");
        return Ok(());
    }

    for fact in &facts {
        println!(
            "  {}/{} (confidence: {:.2}, source: {})",
            fact.category, fact.key, fact.confidence, fact.source
        );
        println!("     {}", super::preview(&fact.value, 120));
        if !fact.subjects.is_empty() {
            println!("     subjects: {}", fact.subjects.join(", "));
        }
        if let Some(reference) = &fact.reference {
            println!("     ref: kb:{reference}");
        }
    }
    println!("\n{} fact(s)", facts.len());

    Ok(())
}
