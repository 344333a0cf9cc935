//! Rule-based matching of anticipations against a wake.

use std::time::Duration;

use chrono::Utc;

use crate::anticipation::store::AnticipationStore;
use crate::anticipation::types::{present, Anticipation, Trigger, WakeContext};
use crate::context::RequestContext;
use crate::error::Result;

/// Whether every condition in `trigger` holds for `wake`.
///
/// An empty trigger never matches. Entity ids compare exactly; states, zones,
/// zone actions, and event types compare case-insensitively.
pub fn trigger_matches(trigger: &Trigger, wake: &WakeContext) -> bool {
    if trigger.is_empty() {
        return false;
    }

    if let Some(after) = trigger.after_time {
        if wake.time < after {
            return false;
        }
    }

    if let Some(entity) = present(&trigger.entity_id) {
        if present(&wake.entity_id) != Some(entity) {
            return false;
        }
        if let Some(state) = present(&trigger.entity_state) {
            if !eq_ignore_case(state, &wake.entity_state) {
                return false;
            }
        }
    }

    if let Some(zone) = present(&trigger.zone) {
        if !eq_ignore_case(zone, &wake.zone) {
            return false;
        }
        if let Some(action) = present(&trigger.zone_action) {
            if !eq_ignore_case(action, &wake.zone_action) {
                return false;
            }
        }
    }

    if let Some(event) = present(&trigger.event_type) {
        if !eq_ignore_case(event, &wake.event_type) {
            return false;
        }
    }

    true
}

fn eq_ignore_case(expected: &str, actual: &Option<String>) -> bool {
    present(actual).is_some_and(|a| a.to_lowercase() == expected.to_lowercase())
}

/// The anticipations among `candidates` whose trigger holds for `wake`, in
/// input order.
pub fn match_wake(candidates: &[Anticipation], wake: &WakeContext) -> Vec<Anticipation> {
    candidates
        .iter()
        .filter(|a| trigger_matches(&a.trigger, wake))
        .cloned()
        .collect()
}

/// Matches wakes against the active set and records firings.
#[derive(Debug, Clone)]
pub struct Matcher {
    store: AnticipationStore,
    default_cooldown: Duration,
}

impl Matcher {
    pub fn new(store: AnticipationStore, default_cooldown: Duration) -> Self {
        Self {
            store,
            default_cooldown,
        }
    }

    pub fn store(&self) -> &AnticipationStore {
        &self.store
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Active anticipations whose trigger holds for `wake`, regardless of
    /// cooldown.
    pub fn matches(&self, ctx: &RequestContext, wake: &WakeContext) -> Result<Vec<Anticipation>> {
        let active = self.store.active(ctx)?;
        let matched = match_wake(&active, wake);
        tracing::debug!(active = active.len(), matched = matched.len(), "wake matched");
        Ok(matched)
    }

    /// [`Self::matches`] minus anticipations still on cooldown.
    pub fn due(&self, ctx: &RequestContext, wake: &WakeContext) -> Result<Vec<Anticipation>> {
        let now = Utc::now();
        Ok(self
            .matches(ctx, wake)?
            .into_iter()
            .filter(|a| !a.on_cooldown_at(self.default_cooldown, now))
            .collect())
    }

    /// Claim a firing for each anticipation and resolve the non-recurring ones.
    ///
    /// Returns the anticipations this caller actually fired; ones on cooldown
    /// or claimed concurrently by another caller are left out.
    pub fn fire(&self, ctx: &RequestContext, matched: &[Anticipation]) -> Result<Vec<Anticipation>> {
        let mut fired = Vec::with_capacity(matched.len());
        for anticipation in matched {
            if !self
                .store
                .claim_firing(ctx, &anticipation.id, self.default_cooldown)?
            {
                continue;
            }
            if !anticipation.recurring {
                self.store.resolve(ctx, &anticipation.id)?;
            }
            tracing::info!(
                id = %anticipation.id,
                recurring = anticipation.recurring,
                "anticipation fired"
            );
            fired.push(anticipation.clone());
        }
        Ok(fired)
    }
}
