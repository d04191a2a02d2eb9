use std::sync::{Arc, Mutex, MutexGuard};

use crate::settings::Region;

/// Single-slot handoff of a new capture region into the poll loop.
///
/// Writers overwrite whatever is pending; the loop takes the value between cycles.
#[derive(Debug, Clone, Default)]
pub struct RegionMailbox {
    slot: Arc<Mutex<Option<Region>>>,
}

impl RegionMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, region: Region) {
        *self.lock() = Some(region);
    }

    pub fn take(&self) -> Option<Region> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Region>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
