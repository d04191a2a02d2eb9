//! Screen-reading monitor for submarine voyage timers.
//!
//! The pipeline is capture → OCR → [`parsing`] → [`sync`], driven by [`sensing::PollLoop`].
//! [`extract`] is the I/O-free entry point for turning OCR text into a reconciled batch.

pub mod commands;
pub mod db;
pub mod parsing;
pub mod sensing;
pub mod settings;
pub mod sync;
pub mod utils;

pub use parsing::{extract, extract_naive, ReconciledBatch, SubmarineEta};
pub use sensing::{MonitorController, PollLoop};
pub use settings::{AppSettings, ConfigError, Region};
pub use sync::{ReminderRecord, ReminderStore, ReminderSynchronizer, SyncStateTracker};
