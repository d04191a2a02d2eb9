use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::parsing::SubmarineEta;
use crate::settings::ReminderSettings;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRecord {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// `<namespace>:<name>`, the idempotency key.
    pub external_key: String,
    pub reminder_offset_minutes: u32,
}

impl ReminderRecord {
    pub fn for_eta(eta: &SubmarineEta, settings: &ReminderSettings) -> Self {
        let title = [
            settings.title_prefix.as_str(),
            eta.name.as_str(),
            settings.title_suffix.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

        Self {
            title,
            start: eta.eta,
            end: eta.eta + Duration::minutes(i64::from(settings.event_duration_minutes)),
            external_key: external_key(&settings.namespace, &eta.name),
            reminder_offset_minutes: settings.reminder_minutes,
        }
    }
}

pub fn external_key(namespace: &str, name: &str) -> String {
    format!("{namespace}:{name}")
}

/// Calendar-like backend holding one entry per external key.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Id of the entry whose private marker equals `key`, if any.
    async fn find_by_key(&self, key: &str) -> Result<Option<String>>;

    async fn create(&self, record: &ReminderRecord) -> Result<String>;

    async fn update(&self, id: &str, record: &ReminderRecord) -> Result<()>;
}

/// Find-or-create against a [`ReminderStore`]; repeated calls for one key converge on one entry.
#[derive(Clone)]
pub struct ReminderSynchronizer {
    store: Arc<dyn ReminderStore>,
}

impl ReminderSynchronizer {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    pub async fn ensure(&self, record: &ReminderRecord) -> Result<String> {
        match self.store.find_by_key(&record.external_key).await? {
            Some(id) => {
                self.store.update(&id, record).await?;
                log_debug!("updated reminder {id} for {}", record.external_key);
                Ok(id)
            }
            None => {
                let id = self.store.create(record).await?;
                log_debug!("created reminder {id} for {}", record.external_key);
                Ok(id)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: String,
    pub record: ReminderRecord,
}

/// Process-local store for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    entries: Mutex<HashMap<String, ReminderRecord>>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<StoredEntry> {
        let guard = self.entries.lock().await;
        let mut entries: Vec<StoredEntry> = guard
            .iter()
            .map(|(id, record)| StoredEntry {
                id: id.clone(),
                record: record.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.record.start.cmp(&b.record.start));
        entries
    }
}

#[async_trait]
impl ReminderStore for MemoryReminderStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.lock().await;
        Ok(guard
            .iter()
            .find(|(_, record)| record.external_key == key)
            .map(|(id, _)| id.clone()))
    }

    async fn create(&self, record: &ReminderRecord) -> Result<String> {
        let id = format!("mem_{}", uuid::Uuid::new_v4());
        self.entries.lock().await.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn update(&self, id: &str, record: &ReminderRecord) -> Result<()> {
        let mut guard = self.entries.lock().await;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| anyhow!("reminder {id} does not exist"))?;
        *entry = record.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> ReminderSettings {
        ReminderSettings::default()
    }

    fn record(title: &str, minutes: i64) -> ReminderRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        ReminderRecord {
            title: title.to_string(),
            start,
            end: start + Duration::minutes(10),
            external_key: "ff14-sub:A".to_string(),
            reminder_offset_minutes: 10,
        }
    }

    #[test]
    fn record_is_built_from_eta_and_settings() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let eta = SubmarineEta::new("潜水艦A", 40, now);
        let record = ReminderRecord::for_eta(&eta, &settings());

        assert_eq!(record.title, "潜水艦 潜水艦A 帰還");
        assert_eq!(record.external_key, "ff14-sub:潜水艦A");
        assert_eq!(record.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 40, 0).unwrap());
        assert_eq!(record.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 50, 0).unwrap());
        assert_eq!(record.reminder_offset_minutes, 10);
    }

    #[tokio::test]
    async fn ensure_twice_updates_in_place() {
        let store = Arc::new(MemoryReminderStore::new());
        let sync = ReminderSynchronizer::new(store.clone());

        let first = sync.ensure(&record("first", 40)).await.unwrap();
        let second = sync.ensure(&record("second", 38)).await.unwrap();

        assert_eq!(first, second);
        let entries = store.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.title, "second");
    }

    #[tokio::test]
    async fn distinct_keys_create_distinct_entries() {
        let store = Arc::new(MemoryReminderStore::new());
        let sync = ReminderSynchronizer::new(store.clone());

        let mut other = record("other", 5);
        other.external_key = "ff14-sub:B".to_string();

        sync.ensure(&record("a", 40)).await.unwrap();
        sync.ensure(&other).await.unwrap();

        assert_eq!(store.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn update_of_unknown_id_fails() {
        let store = MemoryReminderStore::new();
        assert!(store.update("missing", &record("x", 1)).await.is_err());
    }
}
