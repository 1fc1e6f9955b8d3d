//! Timer-driven coalescing of rapid edits.
//!
//! Every key has at most one pending patch; pushing another patch for the same
//! key merges it (newer fields win). A single deadline covers all keys and is
//! pushed back on every edit, so nothing is released until input has been
//! quiet for the whole period.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

/// Merges a newer partial change into an older one.
pub trait Coalesce {
    fn coalesce(&mut self, newer: Self);
}

#[derive(Debug)]
pub struct Debouncer<K, P> {
    quiet: Duration,
    pending: BTreeMap<K, P>,
    deadline: Option<Instant>,
}

impl<K: Ord, P: Coalesce> Debouncer<K, P> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeMap::new(),
            deadline: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Queues `patch` for `key` and restarts the quiet period from `now`.
    pub fn push(&mut self, key: K, patch: P, now: Instant) {
        match self.pending.get_mut(&key) {
            Some(existing) => existing.coalesce(patch),
            None => {
                self.pending.insert(key, patch);
            }
        }
        self.deadline = Some(now + self.quiet);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Releases all pending patches if the deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, P)> {
        if !self.is_due(now) {
            return Vec::new();
        }
        self.flush()
    }

    /// Releases all pending patches immediately.
    pub fn flush(&mut self) -> Vec<(K, P)> {
        self.deadline = None;
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    /// Drops the pending patch for `key` without releasing it.
    pub fn cancel(&mut self, key: &K) -> Option<P> {
        let dropped = self.pending.remove(key);
        if self.pending.is_empty() {
            self.deadline = None;
        }
        dropped
    }

    pub fn pending(&self, key: &K) -> Option<&P> {
        self.pending.get(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::{Coalesce, Debouncer};

    #[derive(Debug, Default, PartialEq)]
    struct Patch {
        x: Option<i32>,
        y: Option<i32>,
    }

    impl Coalesce for Patch {
        fn coalesce(&mut self, newer: Self) {
            if newer.x.is_some() {
                self.x = newer.x;
            }
            if newer.y.is_some() {
                self.y = newer.y;
            }
        }
    }

    fn x(v: i32) -> Patch {
        Patch { x: Some(v), y: None }
    }

    #[test]
    fn edits_to_one_key_coalesce() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.push("a", x(1), start);
        d.push("a", Patch { x: None, y: Some(7) }, start + Duration::from_millis(100));
        d.push("a", x(3), start + Duration::from_millis(200));

        assert!(d.take_due(start + Duration::from_millis(450)).is_empty());
        let released = d.take_due(start + Duration::from_millis(500));
        assert_eq!(released, vec![("a", Patch { x: Some(3), y: Some(7) })]);
        assert!(d.is_empty());
        assert_eq!(d.deadline(), None);
    }

    #[test]
    fn one_deadline_covers_all_keys() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push("a", x(1), start);
        d.push("b", x(2), start + Duration::from_millis(80));
        assert!(!d.is_due(start + Duration::from_millis(120)));
        let released = d.take_due(start + Duration::from_millis(180));
        assert_eq!(released.len(), 2);
    }

    #[test]
    fn cancel_drops_pending_patch() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.push("a", x(1), start);
        assert_eq!(d.cancel(&"a"), Some(x(1)));
        assert_eq!(d.deadline(), None);
        assert!(d.flush().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_follows_the_tokio_clock() {
        let mut d = Debouncer::new(Duration::from_millis(250));
        d.push(1u32, x(1), Instant::now());
        tokio::time::advance(Duration::from_millis(249)).await;
        assert!(!d.is_due(Instant::now()));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(d.take_due(Instant::now()), vec![(1, x(1))]);
    }
}
