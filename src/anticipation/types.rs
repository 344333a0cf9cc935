//! Anticipation, trigger, and wake-context types.
//!
//! Every timestamp is a `DateTime<Utc>`; the builder methods that take a time
//! accept any zone and convert, so nothing zoned ever reaches a SQL parameter.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Conditions under which an anticipation fires. All present conditions must
/// hold. `entity_state` only applies together with `entity_id`, and
/// `zone_action` only together with `zone`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Stored and returned verbatim; never evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Trigger {
    pub fn after<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        Self {
            after_time: Some(at.with_timezone(&Utc)),
            ..Self::default()
        }
    }

    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            ..Self::default()
        }
    }

    pub fn zone(zone: impl Into<String>) -> Self {
        Self {
            zone: Some(zone.into()),
            ..Self::default()
        }
    }

    pub fn event(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.entity_state = Some(state.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.zone_action = Some(action.into());
        self
    }

    /// True when no evaluable condition is set. Such a trigger never matches.
    pub fn is_empty(&self) -> bool {
        self.after_time.is_none()
            && present(&self.entity_id).is_none()
            && present(&self.zone).is_none()
            && present(&self.event_type).is_none()
    }
}

/// `Some` only for a non-empty string; JSON written elsewhere may carry `""`.
pub(crate) fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// A persisted expectation: "wake me when the trigger holds, and show me this".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anticipation {
    /// Assigned on create when empty.
    pub id: String,
    pub description: String,
    /// Injected into the prompt when the anticipation matches.
    pub context: String,
    /// Entities whose current state is snapshotted at wake time.
    #[serde(default)]
    pub context_entities: Vec<String>,
    #[serde(default)]
    pub trigger: Trigger,
    /// Non-recurring anticipations resolve themselves after firing.
    #[serde(default)]
    pub recurring: bool,
    /// Minimum seconds between firings; 0 defers to the global default.
    #[serde(default)]
    pub cooldown_seconds: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Anticipation {
    /// A non-recurring anticipation with an empty trigger, created now.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            description: description.into(),
            context: String::new(),
            context_entities: Vec::new(),
            trigger: Trigger::default(),
            recurring: false,
            cooldown_seconds: 0,
            created_at: Utc::now(),
            expires_at: None,
            resolved_at: None,
            deleted_at: None,
            last_fired_at: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn cooldown_seconds(mut self, seconds: u32) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    pub fn expires_at<Tz: TimeZone>(mut self, at: DateTime<Tz>) -> Self {
        self.expires_at = Some(at.with_timezone(&Utc));
        self
    }

    pub fn context_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context_entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Not resolved, not deleted, and not expired at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.resolved_at.is_none()
            && self.deleted_at.is_none()
            && self.expires_at.is_none_or(|exp| exp > now)
    }

    /// The row's own cooldown, or `default` when it has none.
    pub fn effective_cooldown(&self, default: Duration) -> Duration {
        effective_cooldown(self.cooldown_seconds, default)
    }

    /// True if the last firing is more recent than the effective cooldown.
    pub fn on_cooldown_at(&self, default: Duration, now: DateTime<Utc>) -> bool {
        on_cooldown(self.cooldown_seconds, self.last_fired_at, default, now)
    }
}

pub(crate) fn effective_cooldown(cooldown_seconds: u32, default: Duration) -> Duration {
    if cooldown_seconds > 0 {
        Duration::from_secs(u64::from(cooldown_seconds))
    } else {
        default
    }
}

pub(crate) fn on_cooldown(
    cooldown_seconds: u32,
    last_fired: Option<DateTime<Utc>>,
    default: Duration,
    now: DateTime<Utc>,
) -> bool {
    let Some(fired) = last_fired else {
        return false;
    };
    let cooldown = chrono::Duration::from_std(effective_cooldown(cooldown_seconds, default))
        .unwrap_or(chrono::Duration::MAX);
    now.signed_duration_since(fired) < cooldown
}

/// Why the agent woke up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeContext {
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_action: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Default for WakeContext {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

impl WakeContext {
    /// A wake at `time` with no other signals.
    pub fn at<Tz: TimeZone>(time: DateTime<Tz>) -> Self {
        Self {
            time: time.with_timezone(&Utc),
            event_type: None,
            entity_id: None,
            entity_state: None,
            zone: None,
            zone_action: None,
            metadata: BTreeMap::new(),
        }
    }

    /// A wake caused by an entity reaching `state`.
    pub fn state_change(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            entity_state: Some(state.into()),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>, action: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self.zone_action = Some(action.into());
        self
    }
}
