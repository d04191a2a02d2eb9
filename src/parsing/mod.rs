//! OCR text to reconciled submarine countdowns. No I/O anywhere in here.

pub mod models;
pub mod normalizer;
pub mod parser;
pub mod reconcile;

use chrono::{DateTime, NaiveDateTime, Utc};

pub use models::{RawDetection, ReconciledBatch, SubmarineEta, MAX_BATCH_SIZE};
pub use normalizer::normalize;
pub use parser::{detect_line, parse_candidates, parse_remaining, FormatMatcher, TimeFormat};
pub use reconcile::reconcile;

/// Parse and reconcile one capture. `now` defaults to the wall clock.
pub fn extract(text: &str, now: Option<DateTime<Utc>>) -> ReconciledBatch {
    let now = now.unwrap_or_else(Utc::now);
    reconcile(parse_candidates(text, now))
}

/// Same as [`extract`] for a timezone-less clock reading, taken as UTC.
pub fn extract_naive(text: &str, now: NaiveDateTime) -> ReconciledBatch {
    extract(text, Some(now.and_utc()))
}
