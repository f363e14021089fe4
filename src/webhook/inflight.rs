//! Tracks transaction ids currently being processed
//!
//! The vendor may redeliver a callback while the first delivery is still
//! waiting on the status lookup. Only one delivery per id runs at a time; the
//! id is released when its guard drops, so later status changes for the same
//! order are processed normally.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Set of transaction ids with a delivery in progress
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlightTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `transaction_id`, or `None` if another delivery holds it
    pub fn try_begin(&self, transaction_id: &str) -> Option<InFlightGuard> {
        let mut active = self.active.lock();
        if !active.insert(transaction_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            transaction_id: transaction_id.to_string(),
        })
    }

    /// Whether `transaction_id` is being processed
    pub fn contains(&self, transaction_id: &str) -> bool {
        self.active.lock().contains(transaction_id)
    }

    /// Number of deliveries in progress
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Whether nothing is in progress
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Releases its transaction id on drop
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    transaction_id: String,
}

impl InFlightGuard {
    /// The claimed id
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.transaction_id);
    }
}
