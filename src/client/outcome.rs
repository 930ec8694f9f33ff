//! Outcome cell - first writer wins, everyone else is a no-op

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::Outcome;

/// Holds at most one terminal [`Outcome`].
///
/// `try_settle` is the single arbitration point for every path racing to
/// conclude a request. A `true` return obliges the caller to perform
/// teardown; `false` means someone else already did and the caller must
/// do nothing.
#[derive(Debug, Default)]
pub struct OutcomeCell {
    slot: Mutex<Option<Arc<Outcome>>>,
}

impl OutcomeCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_settle(&self, outcome: Outcome) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Arc::new(outcome));
        true
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// The settled outcome; immutable once set.
    pub fn outcome(&self) -> Option<Arc<Outcome>> {
        self.slot.lock().clone()
    }
}
