//! CLI `context` command: print the block the agent would see for a message.
//!
//! The state window lives in the running agent's memory, so it is always
//! empty here.

use std::sync::Arc;

use anyhow::{Context, Result};

use hearth::anticipation::{AnticipationStore, Matcher, WakeContext};
use hearth::compose::Composer;
use hearth::config::HearthConfig;
use hearth::embedding;
use hearth::memory::FactStore;
use hearth::state_window::StateWindow;

/// Wake signals given on the command line.
#[derive(Debug, Default)]
pub struct WakeArgs {
    pub entity: Option<String>,
    pub state: Option<String>,
    pub zone: Option<String>,
    pub zone_action: Option<String>,
    pub event: Option<String>,
}

impl WakeArgs {
    fn into_wake(self) -> Option<WakeContext> {
        if self.entity.is_none() && self.zone.is_none() && self.event.is_none() {
            return None;
        }
        let mut wake = WakeContext::default();
        wake.entity_id = self.entity;
        wake.entity_state = self.state;
        wake.zone = self.zone;
        wake.zone_action = self.zone_action;
        wake.event_type = self.event;
        Some(wake)
    }
}

pub async fn context(
    config: &HearthConfig,
    message: &str,
    subjects: Vec<String>,
    wake: WakeArgs,
) -> Result<()> {
    let db = super::open_database(config)?;
    let embedder = embedding::create_embedder(&config.embedding)
        .context("failed to create embedder")?;
    let window = Arc::new(StateWindow::from_config(&config.context)?);
    let matcher = Matcher::new(AnticipationStore::new(db.clone()), config.default_cooldown());

    let composer = Composer::standard(
        FactStore::new(db),
        embedder,
        window,
        matcher,
        None,
        &config.context,
    );

    let mut ctx = super::interruptible_context().with_subjects(subjects);
    if let Some(wake) = wake.into_wake() {
        ctx = ctx.with_wake(wake);
    }

    let block = composer.compose(&ctx, message).await;
    if block.is_empty() {
        println!("(no context)");
    } else {
        println!("{block}");
    }

    Ok(())
}
