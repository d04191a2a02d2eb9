use std::collections::HashMap;

/// Last countdown pushed to the reminder store, per submarine name.
///
/// Owned by the poll loop for the life of the process. Names are never evicted.
#[derive(Debug, Clone, Default)]
pub struct SyncStateTracker {
    last_synced: HashMap<String, u32>,
    min_change_minutes: u32,
}

impl SyncStateTracker {
    pub fn new(min_change_minutes: u32) -> Self {
        Self {
            last_synced: HashMap::new(),
            min_change_minutes,
        }
    }

    /// Unseen names always sync; tracked names only once the countdown moved by the threshold.
    pub fn should_sync(&self, name: &str, new_remaining: u32) -> bool {
        match self.last_synced.get(name) {
            None => true,
            Some(&previous) => previous.abs_diff(new_remaining) >= self.min_change_minutes,
        }
    }

    pub fn record(&mut self, name: &str, remaining: u32) {
        self.last_synced.insert(name.to_string(), remaining);
    }

    pub fn last_synced(&self, name: &str) -> Option<u32> {
        self.last_synced.get(name).copied()
    }

    pub fn tracked_count(&self) -> usize {
        self.last_synced.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_syncs() {
        let tracker = SyncStateTracker::new(2);
        assert!(tracker.should_sync("A", 100));
        assert_eq!(tracker.last_synced("A"), None);
    }

    #[test]
    fn small_drift_is_ignored_until_threshold() {
        let mut tracker = SyncStateTracker::new(2);
        tracker.record("A", 100);

        assert!(!tracker.should_sync("A", 101));
        assert!(!tracker.should_sync("A", 99));
        assert!(tracker.should_sync("A", 98));
        assert!(tracker.should_sync("A", 102));
    }

    #[test]
    fn ignored_observation_leaves_baseline() {
        let mut tracker = SyncStateTracker::new(5);
        tracker.record("A", 100);
        // 97 is within the threshold and never recorded, so 95 is measured against 100.
        assert!(!tracker.should_sync("A", 97));
        assert!(tracker.should_sync("A", 95));
        assert_eq!(tracker.last_synced("A"), Some(100));
    }

    #[test]
    fn zero_threshold_always_syncs() {
        let mut tracker = SyncStateTracker::new(0);
        tracker.record("A", 10);
        assert!(tracker.should_sync("A", 10));
    }

    #[test]
    fn names_are_tracked_independently() {
        let mut tracker = SyncStateTracker::new(2);
        tracker.record("A", 10);
        assert!(tracker.should_sync("B", 10));
        assert_eq!(tracker.tracked_count(), 1);
    }
}
