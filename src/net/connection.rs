//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently inside the dispatcher
//! - Report the count when the drain deadline passes
//!
//! # Design Decisions
//! - A guard decrements on drop, so a panicking handler task still releases

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Relaxed ordering is enough here: ids only need to be unique.
static DISPATCH_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one dispatched request, used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(u64);

impl DispatchId {
    pub fn new() -> Self {
        Self(DISPATCH_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch-{}", self.0)
    }
}

/// Tracks requests that are currently being dispatched.
#[derive(Debug, Clone)]
pub struct InFlight {
    count: Arc<watch::Sender<u64>>,
}

impl InFlight {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { count: Arc::new(tx) }
    }

    /// Record a new in-flight request. The returned guard releases it on drop.
    pub fn track(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            count: Arc::clone(&self.count),
            id: DispatchId::new(),
        }
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases one in-flight slot when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<watch::Sender<u64>>,
    id: DispatchId,
}

impl InFlightGuard {
    pub fn id(&self) -> DispatchId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(dispatch_id = %self.id, "request finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_ids_unique() {
        assert_ne!(DispatchId::new(), DispatchId::new());
    }

    #[test]
    fn tracker_counts() {
        let tracker = InFlight::new();
        assert_eq!(tracker.count(), 0);

        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.count(), 2);

        drop(first);
        assert_eq!(tracker.count(), 1);
        drop(second);
        assert_eq!(tracker.count(), 0);
    }
}
