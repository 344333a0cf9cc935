//! CLI `backfill` command: embed every fact that has no vector yet.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use hearth::config::HearthConfig;
use hearth::embedding;
use hearth::memory::{self, FactStore};

pub async fn backfill(config: &HearthConfig) -> Result<()> {
    let store = FactStore::new(super::open_database(config)?);
    let Some(embedder) = embedding::create_embedder(&config.embedding)
        .context("failed to create embedder")?
    else {
        bail!("no embedder configured; set [embedding] provider = \"http\"");
    };
    let ctx = super::interruptible_context();

    println!("Embedding missing facts with model '{}'...", embedder.model());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let report = memory::backfill_embeddings(&store, embedder.as_ref(), &ctx, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .await?;

    pb.finish_and_clear();
    println!(
        "Backfill complete: {} embedded, {} failed.",
        report.embedded, report.failed
    );

    Ok(())
}
