//! Write-coalescing cache.
//!
//! Flash write endurance is limited and mutations cluster in time, so
//! the store defers the durable write behind a debounce deadline: each
//! dirtying mutation pushes the deadline out, and a periodic driver
//! persists once it passes. A zero timeout disables coalescing and
//! demands a synchronous write on every mutation.
//!
//! The cache never touches shared state from a timer context. It only
//! records a deadline; "expiry" is the level-triggered condition
//! [`WriteCache::ready`], observed by the driver under the store lock.
//! The state here is pure (callers pass `Instant`), which keeps the
//! debounce arithmetic testable without sleeping.

use std::time::{Duration, Instant};

/// Default debounce window between a mutation and its durable write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// What the caller must do after informing the cache of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// Deadline armed; the periodic driver will persist later.
    Deferred,
    /// Coalescing is off (or was just shortened to zero): persist now,
    /// then call [`WriteCache::mark_clean`] on success.
    WriteNow,
}

/// Dirty-state and debounce bookkeeping for the registry.
#[derive(Debug)]
pub struct WriteCache {
    dirty: bool,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl WriteCache {
    pub fn new(timeout: Duration) -> Self {
        WriteCache {
            dirty: false,
            timeout,
            deadline: None,
        }
    }

    /// Whether the in-memory table has changes the file does not.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a dirtying mutation. Re-arms the deadline (debounce: each
    /// mutation replaces any deadline already running) or demands an
    /// immediate write when coalescing is disabled.
    #[must_use]
    pub fn note_mutation(&mut self, now: Instant) -> WriteDecision {
        self.dirty = true;
        if self.timeout.is_zero() {
            self.deadline = None;
            WriteDecision::WriteNow
        } else {
            self.deadline = Some(now + self.timeout);
            WriteDecision::Deferred
        }
    }

    /// Level signal for the periodic driver: a deferred write is due.
    /// Stays set until [`WriteCache::mark_clean`], so a failed persist
    /// is retried on the next driver pass.
    pub fn ready(&self, now: Instant) -> bool {
        self.dirty && self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// A persist succeeded: clear the dirty flag and the deadline.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.deadline = None;
    }

    /// Mark dirty without arming the deadline. Used when a synchronous
    /// save fails and only an explicit flush (or the next mutation)
    /// should retry.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.deadline = None;
    }

    /// Cancel any pending deferred write, keeping the dirty flag.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Reconfigure the debounce window. Shortening while a deferred
    /// write is pending re-arms the deadline with the new duration
    /// immediately; shortening to zero demands an immediate write.
    #[must_use]
    pub fn set_timeout(&mut self, timeout: Duration, now: Instant) -> WriteDecision {
        let pending = self.dirty && self.deadline.is_some();
        let shortened = timeout < self.timeout;
        self.timeout = timeout;

        if pending && shortened {
            if timeout.is_zero() {
                self.deadline = None;
                return WriteDecision::WriteNow;
            }
            self.deadline = Some(now + timeout);
        }
        WriteDecision::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::from_millis(100);

    #[test]
    fn test_mutation_arms_deadline() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();

        assert_eq!(cache.note_mutation(now), WriteDecision::Deferred);
        assert!(cache.is_dirty());
        assert!(!cache.ready(now));
        assert!(!cache.ready(now + T - Duration::from_millis(1)));
        assert!(cache.ready(now + T));
    }

    #[test]
    fn test_debounce_pushes_deadline_out() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();

        let _ = cache.note_mutation(now);
        // A second mutation half-way through restarts the window.
        let _ = cache.note_mutation(now + T / 2);
        assert!(!cache.ready(now + T));
        assert!(cache.ready(now + T / 2 + T));
    }

    #[test]
    fn test_zero_timeout_demands_synchronous_write() {
        let mut cache = WriteCache::new(Duration::ZERO);
        let now = Instant::now();

        assert_eq!(cache.note_mutation(now), WriteDecision::WriteNow);
        // No deadline: the driver never picks this up.
        assert!(!cache.ready(now + Duration::from_secs(3600)));

        cache.mark_clean();
        assert!(!cache.is_dirty());
    }

    #[test]
    fn test_ready_is_a_level_until_cleaned() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();
        let _ = cache.note_mutation(now);

        // A failed persist leaves the signal set for retry.
        assert!(cache.ready(now + T));
        assert!(cache.ready(now + T * 5));

        cache.mark_clean();
        assert!(!cache.ready(now + T * 5));
    }

    #[test]
    fn test_disarm_keeps_dirty() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();
        let _ = cache.note_mutation(now);

        cache.disarm();
        assert!(cache.is_dirty());
        assert!(!cache.ready(now + T * 2));
    }

    #[test]
    fn test_shorten_while_pending_rearms_now() {
        let mut cache = WriteCache::new(Duration::from_secs(60));
        let now = Instant::now();
        let _ = cache.note_mutation(now);

        let short = Duration::from_millis(50);
        assert_eq!(cache.set_timeout(short, now), WriteDecision::Deferred);
        assert!(cache.ready(now + short));
    }

    #[test]
    fn test_shorten_to_zero_demands_write() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();
        let _ = cache.note_mutation(now);

        assert_eq!(
            cache.set_timeout(Duration::ZERO, now),
            WriteDecision::WriteNow
        );
        assert!(cache.is_dirty());
        assert!(!cache.ready(now + T * 2));
    }

    #[test]
    fn test_lengthen_leaves_pending_deadline_alone() {
        let mut cache = WriteCache::new(T);
        let now = Instant::now();
        let _ = cache.note_mutation(now);

        assert_eq!(
            cache.set_timeout(Duration::from_secs(60), now),
            WriteDecision::Deferred
        );
        // The already-armed deadline still fires on the old schedule.
        assert!(cache.ready(now + T));
        // New mutations pick up the longer window.
        let _ = cache.note_mutation(now);
        assert!(!cache.ready(now + T * 2));
    }

    #[test]
    fn test_set_timeout_while_clean_never_demands_write() {
        let mut cache = WriteCache::new(T);
        assert_eq!(
            cache.set_timeout(Duration::ZERO, Instant::now()),
            WriteDecision::Deferred
        );
        assert!(!cache.is_dirty());
    }

    #[test]
    fn test_mark_dirty_without_deadline() {
        let mut cache = WriteCache::new(T);
        cache.mark_dirty();
        assert!(cache.is_dirty());
        assert!(!cache.ready(Instant::now() + T * 2));
    }
}
