pub mod reminder;

pub use reminder::StoredReminder;
