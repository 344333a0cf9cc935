//! Bounded window of recent entity state changes.
//!
//! A fixed-capacity ring guarded by an `RwLock`: the state watcher writes
//! through [`StateWindow::handle_state_change`], the composer reads through
//! [`StateWindow::render`]. Entries older than the configured age are skipped
//! on read, never removed eagerly.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use chrono_tz::Tz;

use crate::compose::ContextProvider;
use crate::config::ContextConfig;
use crate::context::RequestContext;
use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

const HEADER: &str = "### Recent State Changes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub entity_id: String,
    pub old_state: String,
    pub new_state: String,
    pub timestamp: DateTime<Utc>,
}

/// Zone used to render entry timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Named(Tz),
}

impl DisplayZone {
    /// Parse an IANA zone name; `None` or an empty name means local time.
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Self::Local),
            Some(name) => name
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|e| Error::Invalid(format!("invalid timezone '{name}': {e}"))),
        }
    }

    fn format(&self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Local => ts
                .with_timezone(&Local)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Named(tz) => ts.with_timezone(tz).to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug)]
struct Ring {
    slots: Vec<Option<StateEntry>>,
    head: usize,
    count: usize,
}

impl Ring {
    fn push(&mut self, entry: StateEntry) {
        let capacity = self.slots.len();
        self.slots[self.head] = Some(entry);
        self.head = (self.head + 1) % capacity;
        self.count = (self.count + 1).min(capacity);
    }

    /// Up to `count` entries walking back from `head - 1`.
    fn newest_first(&self) -> impl Iterator<Item = &StateEntry> {
        let capacity = self.slots.len();
        (1..=self.count).filter_map(move |back| {
            let idx = (self.head + capacity - back) % capacity;
            self.slots[idx].as_ref()
        })
    }
}

#[derive(Debug)]
pub struct StateWindow {
    ring: RwLock<Ring>,
    max_age: Duration,
    zone: DisplayZone,
}

impl Default for StateWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_AGE, DisplayZone::Local)
    }
}

impl StateWindow {
    /// A zero `capacity` or `max_age` falls back to the defaults (50, 30 min).
    pub fn new(capacity: usize, max_age: Duration, zone: DisplayZone) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let max_age = if max_age.is_zero() { DEFAULT_MAX_AGE } else { max_age };
        Self {
            ring: RwLock::new(Ring {
                slots: vec![None; capacity],
                head: 0,
                count: 0,
            }),
            max_age,
            zone,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Result<Self> {
        Ok(Self::new(
            config.state_window_capacity,
            Duration::from_secs(config.state_max_age_secs),
            DisplayZone::parse(config.timezone.as_deref())?,
        ))
    }

    pub fn capacity(&self) -> usize {
        self.read(|ring| ring.slots.len())
    }

    pub fn len(&self) -> usize {
        self.read(|ring| ring.count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a transition observed now.
    pub fn handle_state_change(&self, entity_id: &str, old_state: &str, new_state: &str) {
        self.record_at(entity_id, old_state, new_state, Utc::now());
    }

    /// Record a transition observed at `timestamp`.
    pub fn record_at(&self, entity_id: &str, old_state: &str, new_state: &str, timestamp: DateTime<Utc>) {
        let entry = StateEntry {
            entity_id: entity_id.to_string(),
            old_state: old_state.to_string(),
            new_state: new_state.to_string(),
            timestamp,
        };
        self.ring
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        tracing::trace!(entity_id, old_state, new_state, "state change recorded");
    }

    /// Snapshot of every held entry, newest first, ignoring age.
    pub fn entries(&self) -> Vec<StateEntry> {
        self.read(|ring| ring.newest_first().cloned().collect())
    }

    /// The rendered block as of now.
    pub fn render(&self) -> String {
        self.render_at(Utc::now())
    }

    /// Entries no older than the max age at `now`, newest first, under the
    /// section header. Empty when nothing qualifies.
    pub fn render_at(&self, now: DateTime<Utc>) -> String {
        let cutoff = chrono::Duration::from_std(self.max_age)
            .ok()
            .and_then(|age| now.checked_sub_signed(age));

        let lines: Vec<String> = self.read(|ring| {
            ring.newest_first()
                .filter(|e| cutoff.is_none_or(|c| e.timestamp >= c))
                .map(|e| {
                    format!(
                        "- {}: {} → {} ({})",
                        e.entity_id,
                        e.old_state,
                        e.new_state,
                        self.zone.format(e.timestamp)
                    )
                })
                .collect()
        });

        if lines.is_empty() {
            return String::new();
        }
        format!("{HEADER}\n{}", lines.join("\n"))
    }

    fn read<T>(&self, f: impl FnOnce(&Ring) -> T) -> T {
        let ring = self.ring.read().unwrap_or_else(PoisonError::into_inner);
        f(&*ring)
    }
}

#[async_trait]
impl ContextProvider for StateWindow {
    fn name(&self) -> &str {
        "state_window"
    }

    async fn context(&self, ctx: &RequestContext, _message: &str) -> Result<String> {
        ctx.check()?;
        Ok(self.render())
    }
}
