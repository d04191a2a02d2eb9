use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::ReminderRecord;

/// A row of the `reminders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReminder {
    pub id: String,
    pub record: ReminderRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
