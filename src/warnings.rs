//! Last-warning channel shared across the persistence layer
//!
//! Ordinary backend flakiness (a write skipped after a permission
//! status, a read recovered to "no data", best-effort bookkeeping that
//! failed) must not abort the caller's control flow. Those conditions
//! are recorded here instead of being returned as errors; callers that
//! want to surface a one-line notice poll [`WarningChannel::take`]
//! after an operation. Real failures are returned as
//! [`QuillbaseError`](crate::error::QuillbaseError)s and never pass
//! through this channel.

use std::sync::{Arc, Mutex};

/// Shared single-slot warning channel.
///
/// Cloning is cheap and all clones observe the same slot; one instance
/// is threaded through the tree client and every store so the most
/// recent degradation is visible from the facade.
///
/// # Examples
///
/// ```
/// use quillbase::warnings::WarningChannel;
///
/// let warnings = WarningChannel::default();
/// warnings.record("set at /users/a returned HTTP 403. Operation skipped.");
/// assert!(warnings.take().is_some());
/// // `take` drains the slot.
/// assert!(warnings.take().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WarningChannel {
    slot: Arc<Mutex<Option<String>>>,
}

impl WarningChannel {
    /// Records a warning, replacing any previous one, and logs it at
    /// `warn` level.
    pub fn record(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: "quillbase", "{message}");
        *self.slot.lock().expect("warning slot poisoned") = Some(message);
    }

    /// Clears the slot. Stores call this when an operation completes
    /// cleanly so a stale warning is not attributed to it.
    pub fn clear(&self) {
        *self.slot.lock().expect("warning slot poisoned") = None;
    }

    /// Takes the most recent warning, leaving the slot empty.
    pub fn take(&self) -> Option<String> {
        self.slot.lock().expect("warning slot poisoned").take()
    }

    /// Returns a copy of the most recent warning without clearing it.
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().expect("warning slot poisoned").clone()
    }
}
