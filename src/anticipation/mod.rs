//! Anticipations: persisted "wake me when X, and tell me Y" rules.
//!
//! [`AnticipationStore`] owns the `anticipations` table. [`match_wake`] is the
//! pure rule evaluation; [`Matcher`] combines it with the active set and with
//! cooldown-aware firing.

pub mod matcher;
pub mod store;
pub mod types;

pub use matcher::{match_wake, trigger_matches, Matcher};
pub use store::AnticipationStore;
pub use types::{Anticipation, Trigger, WakeContext};
