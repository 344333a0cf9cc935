//! Request-scoped context threaded through every store and composer call.
//!
//! A [`RequestContext`] carries a cancellation token plus a few values the wake
//! pipeline attaches deep inside its own call chain: the subject tags to fetch
//! keyed facts for, the wake that triggered the activation, and anticipations
//! that were already matched upstream. The fields are private; derived contexts
//! are built with the `with_*` methods and read back with the accessors.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::anticipation::{Anticipation, WakeContext};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    subjects: Option<Arc<[String]>>,
    wake: Option<Arc<WakeContext>>,
    anticipations: Option<Arc<[Anticipation]>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context whose cancellation follows this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with [`Error::Cancelled`] if the context was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Attach subject tags. An empty list clears them.
    pub fn with_subjects<I, S>(&self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = subjects.into_iter().map(Into::into).collect();
        Self {
            subjects: if list.is_empty() {
                None
            } else {
                Some(list.into())
            },
            ..self.clone()
        }
    }

    pub fn subjects(&self) -> Option<&[String]> {
        self.subjects.as_deref()
    }

    pub fn with_wake(&self, wake: WakeContext) -> Self {
        Self {
            wake: Some(Arc::new(wake)),
            ..self.clone()
        }
    }

    pub fn wake(&self) -> Option<&WakeContext> {
        self.wake.as_deref()
    }

    /// Attach anticipations the caller already matched, so the composer does
    /// not run the matcher again.
    pub fn with_anticipations(&self, matched: Vec<Anticipation>) -> Self {
        Self {
            anticipations: Some(matched.into()),
            ..self.clone()
        }
    }

    pub fn anticipations(&self) -> Option<&[Anticipation]> {
        self.anticipations.as_deref()
    }
}
