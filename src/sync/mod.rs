pub mod reminder;
pub mod state;

pub use reminder::{
    external_key, MemoryReminderStore, ReminderRecord, ReminderStore, ReminderSynchronizer,
    StoredEntry,
};
pub use state::SyncStateTracker;
