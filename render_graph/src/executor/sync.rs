//! Cross-queue synchronization primitives.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_FENCE_ID: AtomicU64 = AtomicU64::new(1);

/// A timeline fence: a monotonically increasing 64-bit counter.
///
/// One queue signals increasing values as its work completes; another queue
/// waits until the counter reaches a value. Values handed out by
/// [`next_value`](Self::next_value) are strictly increasing, so a wait for
/// value `n` also covers every signal below `n`.
///
/// Clones share the same counter.
#[derive(Debug)]
pub struct TimelineFence {
    /// Unique identifier for debugging.
    id: u64,
    /// Highest value signaled so far.
    completed: Arc<AtomicU64>,
    /// Highest value handed out by `next_value`.
    issued: Arc<AtomicU64>,
}

impl TimelineFence {
    /// Create a fence at value 0.
    pub fn new() -> Self {
        Self {
            id: NEXT_FENCE_ID.fetch_add(1, Ordering::Relaxed),
            completed: Arc::new(AtomicU64::new(0)),
            issued: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the fence's unique ID (for debugging).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Highest value signaled so far.
    pub fn value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Reserve the next value to signal.
    pub fn next_value(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Advance the fence to `value`. Lower values than the current one are
    /// ignored.
    ///
    /// In real GPU backends the queue signals the fence when its work
    /// completes. The dummy backend calls this directly on record.
    pub fn signal(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
        self.issued.fetch_max(value, Ordering::AcqRel);
    }

    /// Check whether the fence has reached `value` (non-blocking).
    pub fn is_reached(&self, value: u64) -> bool {
        self.value() >= value
    }
}

impl Clone for TimelineFence {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            completed: Arc::clone(&self.completed),
            issued: Arc::clone(&self.issued),
        }
    }
}

impl Default for TimelineFence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_starts_at_zero() {
        let fence = TimelineFence::new();
        assert_eq!(fence.value(), 0);
        assert!(fence.is_reached(0));
        assert!(!fence.is_reached(1));
    }

    #[test]
    fn test_fence_ids_are_unique() {
        let a = TimelineFence::new();
        let b = TimelineFence::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_next_value_increases() {
        let fence = TimelineFence::new();
        assert_eq!(fence.next_value(), 1);
        assert_eq!(fence.next_value(), 2);
        fence.signal(5);
        assert_eq!(fence.next_value(), 6);
    }

    #[test]
    fn test_signal_is_monotonic() {
        let fence = TimelineFence::new();
        fence.signal(3);
        fence.signal(1);
        assert_eq!(fence.value(), 3);
        assert!(fence.is_reached(2));
    }
}
