//! # Timed History Store
//!
//! A time-indexed, self-pruning sequence of `(timestamp, value)` pairs.
//!
//! The server keeps one history of world snapshots and one history of
//! actions per player. Both are used to rewind to "what the world looked
//! like when the client acted" and to replay forward from there.
//!
//! ```text
//! max_age = 1.0s
//!
//! add(t=0.0)  [0.0]
//! add(t=0.5)  [0.0, 0.5]
//! add(t=1.1)  [0.5, 1.1]          <- 0.0 < 1.1 - 1.0, evicted
//! ```
//!
//! Eviction is relative to the newest stored timestamp, never to a
//! wall clock.

use std::collections::VecDeque;
use std::time::Duration;

/// A timestamped copy of a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<T> {
    timestamp: f64,
    value: T,
}

impl<T> Snapshot<T> {
    /// Time of the snapshot, in seconds.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// The stored value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Mutable access to the stored value.
    ///
    /// Only the value can change; the timestamp is fixed at insertion.
    #[inline]
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Ordered, self-pruning history of snapshots.
///
/// Entries are sorted ascending by timestamp. After every insertion, each
/// retained entry satisfies `timestamp >= newest - max_age`.
#[derive(Clone, Debug)]
pub struct SnapshotHistory<T> {
    entries: VecDeque<Snapshot<T>>,
    max_age: f64,
}

impl<T> SnapshotHistory<T> {
    /// Creates an empty history keeping at most `max_age` worth of snapshots.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            max_age: max_age.as_secs_f64(),
        }
    }

    /// Maximum age kept, relative to the newest snapshot.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs_f64(self.max_age)
    }

    /// Adds a snapshot, then evicts everything older than `newest - max_age`.
    ///
    /// Timestamps are expected to be non-decreasing. An older timestamp is
    /// still inserted in order (after every entry with an equal or smaller
    /// timestamp). Non-finite timestamps are ignored.
    pub fn add_snapshot(&mut self, value: T, timestamp: f64) {
        if !timestamp.is_finite() {
            tracing::warn!("Ignoring snapshot with non-finite timestamp {}", timestamp);
            return;
        }

        let is_tail = self
            .entries
            .back()
            .map_or(true, |last| last.timestamp <= timestamp);

        if is_tail {
            self.entries.push_back(Snapshot { timestamp, value });
        } else {
            let index = self.entries.partition_point(|s| s.timestamp <= timestamp);
            self.entries.insert(index, Snapshot { timestamp, value });
        }

        self.evict_old();
    }

    /// Removes every entry older than `newest - max_age` from the head.
    fn evict_old(&mut self) {
        let Some(newest) = self.entries.back().map(|s| s.timestamp) else {
            return;
        };
        let oldest_kept = newest - self.max_age;

        while self
            .entries
            .front()
            .is_some_and(|s| s.timestamp < oldest_kept)
        {
            self.entries.pop_front();
        }
    }

    /// Returns the snapshot closest to `query_time`.
    ///
    /// That is the entry with the greatest timestamp `<= query_time`, or
    /// the earliest entry when `query_time` precedes all of them. Returns
    /// `None` only when the history is empty.
    #[must_use]
    pub fn get_closest_snapshot(&self, query_time: f64) -> Option<&Snapshot<T>> {
        self.closest_index(query_time).and_then(|i| self.entries.get(i))
    }

    /// Index form of [`get_closest_snapshot`](Self::get_closest_snapshot).
    #[must_use]
    pub fn closest_index(&self, query_time: f64) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let after = self.entries.partition_point(|s| s.timestamp <= query_time);
        Some(after.saturating_sub(1))
    }

    /// Index of the first entry with `timestamp >= time`, if any.
    #[must_use]
    pub fn first_index_at_or_after(&self, time: f64) -> Option<usize> {
        let index = self.entries.partition_point(|s| s.timestamp < time);
        (index < self.entries.len()).then_some(index)
    }

    /// Returns the entry immediately following `snapshot`.
    ///
    /// `snapshot` must be a reference obtained from this history; the lookup
    /// is by identity, so entries sharing a timestamp are still distinct.
    ///
    /// Linear in the history length; walking the whole history this way is
    /// quadratic. Use [`iter`](Self::iter) or index access for full walks.
    #[must_use]
    pub fn get_next(&self, snapshot: &Snapshot<T>) -> Option<&Snapshot<T>> {
        let index = self
            .entries
            .iter()
            .position(|s| std::ptr::eq(s, snapshot))?;
        self.entries.get(index + 1)
    }

    /// Returns the newest snapshot.
    #[must_use]
    pub fn get_last(&self) -> Option<&Snapshot<T>> {
        self.entries.back()
    }

    /// Returns the oldest snapshot.
    #[must_use]
    pub fn get_first(&self) -> Option<&Snapshot<T>> {
        self.entries.front()
    }

    /// Returns the snapshot at `index` (0 is the oldest).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Snapshot<T>> {
        self.entries.get(index)
    }

    /// Mutable access to the snapshot at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Snapshot<T>> {
        self.entries.get_mut(index)
    }

    /// Returns true if no snapshot is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of stored snapshots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history(max_age_secs: f64) -> SnapshotHistory<i32> {
        SnapshotHistory::new(Duration::from_secs_f64(max_age_secs))
    }

    #[test]
    fn test_empty() {
        let mut h = history(1.0);
        assert!(h.is_empty());
        assert!(h.get_closest_snapshot(0.0).is_none());
        assert!(h.get_last().is_none());

        h.add_snapshot(0, 0.0);
        assert!(!h.is_empty());
    }

    #[test]
    fn test_closest() {
        let mut h = history(1000.0);

        h.add_snapshot(5, 15.0);
        assert_eq!(*h.get_closest_snapshot(15.0).unwrap().value(), 5);
        assert_eq!(*h.get_closest_snapshot(1000.0).unwrap().value(), 5);
        assert_eq!(h.get_closest_snapshot(0.0).unwrap().timestamp(), 15.0);

        h.add_snapshot(7, 26.0);
        assert_eq!(*h.get_closest_snapshot(15.0).unwrap().value(), 5);
        assert_eq!(*h.get_closest_snapshot(20.0).unwrap().value(), 5);
        assert_eq!(*h.get_closest_snapshot(26.0).unwrap().value(), 7);
        assert_eq!(*h.get_closest_snapshot(40.0).unwrap().value(), 7);

        h.add_snapshot(9, 50.0);
        assert_eq!(*h.get_closest_snapshot(22.0).unwrap().value(), 5);
        assert_eq!(*h.get_closest_snapshot(40.0).unwrap().value(), 7);
        assert_eq!(*h.get_closest_snapshot(50.0).unwrap().value(), 9);
    }

    #[test]
    fn test_cleanup() {
        let mut h = history(1.0);

        h.add_snapshot(1, 0.0);
        assert_eq!(*h.get_closest_snapshot(0.0).unwrap().value(), 1);

        h.add_snapshot(2, 1.1);
        assert_eq!(h.len(), 1);
        assert_eq!(*h.get_closest_snapshot(0.0).unwrap().value(), 2);
    }

    #[test]
    fn test_entry_exactly_max_age_old_is_kept() {
        let mut h = history(1.0);
        h.add_snapshot(1, 0.0);
        h.add_snapshot(2, 1.0);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_get_next() {
        let mut h = history(1000.0);
        h.add_snapshot(1, 0.0);
        h.add_snapshot(2, 1.0);
        h.add_snapshot(3, 2.0);

        let s = h.get_closest_snapshot(0.0).unwrap();
        assert_eq!(*s.value(), 1);
        let s = h.get_next(s).unwrap();
        assert_eq!(*s.value(), 2);
        let s = h.get_next(s).unwrap();
        assert_eq!(*s.value(), 3);
        assert!(h.get_next(s).is_none());

        let second = h.get_closest_snapshot(1.0).unwrap();
        assert_eq!(*h.get_next(second).unwrap().value(), 3);
    }

    #[test]
    fn test_get_next_with_equal_timestamps() {
        let mut h = history(1000.0);
        h.add_snapshot(1, 1.0);
        h.add_snapshot(2, 1.0);

        let first = h.get_first().unwrap();
        assert_eq!(*h.get_next(first).unwrap().value(), 2);
    }

    #[test]
    fn test_out_of_order_insert_keeps_order() {
        let mut h = history(1000.0);
        h.add_snapshot(1, 1.0);
        h.add_snapshot(3, 3.0);
        h.add_snapshot(2, 2.0);

        let values: Vec<i32> = h.iter().map(|s| *s.value()).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(h.first_index_at_or_after(1.5), Some(1));
        assert_eq!(h.first_index_at_or_after(3.5), None);
    }

    #[test]
    fn test_non_finite_timestamp_ignored() {
        let mut h = history(1.0);
        h.add_snapshot(1, f64::NAN);
        assert!(h.is_empty());
    }

    proptest! {
        #[test]
        fn prop_retained_entries_within_max_age(
            deltas in proptest::collection::vec(0.0f64..0.5, 1..64),
            max_age in 0.1f64..2.0,
        ) {
            let mut h = SnapshotHistory::new(Duration::from_secs_f64(max_age));
            let mut t = 0.0;
            for (i, d) in deltas.iter().enumerate() {
                t += d;
                h.add_snapshot(i, t);
                let newest = h.get_last().unwrap().timestamp();
                for s in h.iter() {
                    prop_assert!(s.timestamp() >= newest - max_age - 1e-9);
                }
            }
        }

        #[test]
        fn prop_closest_is_greatest_at_or_before(
            deltas in proptest::collection::vec(0.01f64..1.0, 1..32),
            query in -5.0f64..40.0,
        ) {
            let mut h = SnapshotHistory::new(Duration::from_secs(1_000));
            let mut t = 0.0;
            for (i, d) in deltas.iter().enumerate() {
                t += d;
                h.add_snapshot(i, t);
            }

            let closest = h.get_closest_snapshot(query).unwrap();
            let first = h.get_first().unwrap();
            let last = h.get_last().unwrap();

            if query < first.timestamp() {
                prop_assert_eq!(closest.timestamp(), first.timestamp());
            } else if query > last.timestamp() {
                prop_assert_eq!(closest.timestamp(), last.timestamp());
            } else {
                prop_assert!(closest.timestamp() <= query);
                for s in h.iter() {
                    prop_assert!(s.timestamp() <= closest.timestamp() || s.timestamp() > query);
                }
            }
        }

        #[test]
        fn prop_get_next_visits_all_in_order(
            deltas in proptest::collection::vec(0.0f64..1.0, 1..32),
        ) {
            let mut h = SnapshotHistory::new(Duration::from_secs(1_000));
            let mut t = 0.0;
            for (i, d) in deltas.iter().enumerate() {
                t += d;
                h.add_snapshot(i, t);
            }

            let mut visited = Vec::new();
            let mut cursor = h.get_first();
            while let Some(s) = cursor {
                visited.push(*s.value());
                cursor = h.get_next(s);
            }
            let expected: Vec<usize> = (0..deltas.len()).collect();
            prop_assert_eq!(visited, expected);
        }
    }
}
