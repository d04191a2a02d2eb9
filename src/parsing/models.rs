use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed size of the in-game voyage list.
pub const MAX_BATCH_SIZE: usize = 4;

/// One OCR line split into the name part and the text that should hold the countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDetection {
    pub name: String,
    /// Content of the last bracket group, if the line had one.
    pub bracket_segment: Option<String>,
    /// Everything after the name with bracket groups blanked out.
    pub tail_segment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineEta {
    pub name: String,
    pub remaining_minutes: u32,
    pub eta: DateTime<Utc>,
}

impl SubmarineEta {
    pub fn new(name: impl Into<String>, remaining_minutes: u32, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            remaining_minutes,
            eta: now + chrono::Duration::minutes(i64::from(remaining_minutes)),
        }
    }
}

/// At most [`MAX_BATCH_SIZE`] records, unique by name, soonest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReconciledBatch {
    records: Vec<SubmarineEta>,
}

impl ReconciledBatch {
    pub(crate) fn from_sorted(records: Vec<SubmarineEta>) -> Self {
        debug_assert!(records.len() <= MAX_BATCH_SIZE);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SubmarineEta> {
        self.records.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SubmarineEta> {
        self.records.iter().find(|record| record.name == name)
    }
}

impl IntoIterator for ReconciledBatch {
    type Item = SubmarineEta;
    type IntoIter = std::vec::IntoIter<SubmarineEta>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReconciledBatch {
    type Item = &'a SubmarineEta;
    type IntoIter = std::slice::Iter<'a, SubmarineEta>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
