use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::channel::lock;

/// The set of actor invocations whose effect streams are still open.
#[derive(Debug, Default)]
pub(crate) struct InvocationTracker {
    next_id: AtomicU64,
    in_flight: Mutex<HashSet<u64>>,
}

impl InvocationTracker {
    /// Registers an invocation. It is forgotten when the returned guard drops,
    /// whether the stream completed, failed or was cancelled.
    pub(crate) fn begin(self: &Arc<Self>) -> Invocation {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.in_flight).insert(id);
        Invocation {
            id,
            tracker: Arc::clone(self),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }
}

pub(crate) struct Invocation {
    id: u64,
    tracker: Arc<InvocationTracker>,
}

impl Drop for Invocation {
    fn drop(&mut self) {
        lock(&self.tracker.in_flight).remove(&self.id);
    }
}
