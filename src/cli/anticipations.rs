use anyhow::Result;

use hearth::anticipation::AnticipationStore;
use hearth::config::HearthConfig;
use hearth::RequestContext;

/// List anticipations; only active ones unless `include_inactive`.
pub fn anticipations(config: &HearthConfig, include_inactive: bool) -> Result<()> {
    let store = AnticipationStore::new(super::open_database(config)?);
    let ctx = RequestContext::new();
    let default_cooldown = config.default_cooldown();

    let rows = store.all(&ctx, include_inactive)?;
    if rows.is_empty() {
        println!("No anticipations.");
        return Ok(());
    }

    let now = chrono::Utc::now();
    for a in &rows {
        let status = if a.deleted_at.is_some() {
            "deleted"
        } else if a.resolved_at.is_some() {
            "resolved"
        } else if !a.is_active_at(now) {
            "expired"
        } else if a.on_cooldown_at(default_cooldown, now) {
            "cooling down"
        } else {
            "active"
        };

        println!("  {} [{status}{}]", a.id, if a.recurring { ", recurring" } else { "" });
        println!("     {}", a.description);
        println!("     trigger: {}", serde_json::to_string(&a.trigger)?);
        println!(
            "     cooldown: {}s",
            a.effective_cooldown(default_cooldown).as_secs()
        );
        if let Some(expires) = a.expires_at {
            println!("     expires: {}", expires.to_rfc3339());
        }
        if let Some(fired) = a.last_fired_at {
            println!("     last fired: {}", fired.to_rfc3339());
        }
    }
    println!("\n{} anticipation(s)", rows.len());

    Ok(())
}
