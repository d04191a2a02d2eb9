use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{conversion_error, parse_datetime, to_i64, to_u32},
    models::StoredReminder,
    Database,
};
use crate::sync::{ReminderRecord, ReminderStore};

fn row_to_reminder(row: &Row) -> Result<StoredReminder, rusqlite::Error> {
    let start_at: String = row.get("start_at")?;
    let end_at: String = row.get("end_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let offset: i64 = row.get("reminder_offset_minutes")?;

    Ok(StoredReminder {
        id: row.get("id")?,
        record: ReminderRecord {
            title: row.get("title")?,
            start: parse_datetime(&start_at, "start_at").map_err(conversion_error)?,
            end: parse_datetime(&end_at, "end_at").map_err(conversion_error)?,
            external_key: row.get("external_key")?,
            reminder_offset_minutes: to_u32(offset, "reminder_offset_minutes")
                .map_err(conversion_error)?,
        },
        created_at: parse_datetime(&created_at, "created_at").map_err(conversion_error)?,
        updated_at: parse_datetime(&updated_at, "updated_at").map_err(conversion_error)?,
    })
}

impl Database {
    pub async fn find_reminder_id(&self, external_key: &str) -> Result<Option<String>> {
        let external_key = external_key.to_string();
        self.execute(move |conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM reminders WHERE external_key = ?1",
                    params![external_key],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to look up reminder")?;
            Ok(id)
        })
        .await
    }

    pub async fn insert_reminder(&self, record: &ReminderRecord) -> Result<String> {
        let record = record.clone();
        self.execute(move |conn| {
            let id = format!("rm_{}", uuid::Uuid::new_v4());
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO reminders (id, external_key, title, start_at, end_at,
                                        reminder_offset_minutes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    record.external_key,
                    record.title,
                    record.start.to_rfc3339(),
                    record.end.to_rfc3339(),
                    to_i64(record.reminder_offset_minutes),
                    now,
                ],
            )
            .with_context(|| format!("failed to insert reminder {}", record.external_key))?;
            Ok(id)
        })
        .await
    }

    pub async fn update_reminder(&self, id: &str, record: &ReminderRecord) -> Result<()> {
        let id = id.to_string();
        let record = record.clone();
        self.execute(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE reminders
                     SET title = ?1,
                         start_at = ?2,
                         end_at = ?3,
                         reminder_offset_minutes = ?4,
                         updated_at = ?5
                     WHERE id = ?6",
                    params![
                        record.title,
                        record.start.to_rfc3339(),
                        record.end.to_rfc3339(),
                        to_i64(record.reminder_offset_minutes),
                        Utc::now().to_rfc3339(),
                        id,
                    ],
                )
                .with_context(|| format!("failed to update reminder {id}"))?;
            if changed == 0 {
                bail!("reminder {id} does not exist");
            }
            Ok(())
        })
        .await
    }

    /// All reminders, soonest first.
    pub async fn list_reminders(&self) -> Result<Vec<StoredReminder>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_key, title, start_at, end_at,
                        reminder_offset_minutes, created_at, updated_at
                 FROM reminders
                 ORDER BY start_at ASC",
            )?;

            let reminders = stmt
                .query_map([], row_to_reminder)?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read reminders")?;

            Ok(reminders)
        })
        .await
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn find_by_key(&self, key: &str) -> Result<Option<String>> {
        self.find_reminder_id(key).await
    }

    async fn create(&self, record: &ReminderRecord) -> Result<String> {
        self.insert_reminder(record).await
    }

    async fn update(&self, id: &str, record: &ReminderRecord) -> Result<()> {
        self.update_reminder(id, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ReminderSynchronizer;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn temp_db() -> Database {
        let path = std::env::temp_dir()
            .join(format!("subwatch-db-{}", uuid::Uuid::new_v4()))
            .join("reminders.sqlite3");
        Database::new(path).unwrap()
    }

    fn record(title: &str, key: &str, minutes: i64) -> ReminderRecord {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        ReminderRecord {
            title: title.to_string(),
            start,
            end: start + Duration::minutes(10),
            external_key: key.to_string(),
            reminder_offset_minutes: 10,
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_key() {
        let db = temp_db();
        assert_eq!(db.find_reminder_id("ff14-sub:A").await.unwrap(), None);

        let id = db.insert_reminder(&record("A", "ff14-sub:A", 40)).await.unwrap();
        assert!(id.starts_with("rm_"));
        assert_eq!(db.find_reminder_id("ff14-sub:A").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn synchronizer_converges_on_one_row() {
        let db = temp_db();
        let sync = ReminderSynchronizer::new(Arc::new(db.clone()));

        let first = sync.ensure(&record("old title", "ff14-sub:A", 40)).await.unwrap();
        let second = sync.ensure(&record("new title", "ff14-sub:A", 35)).await.unwrap();
        assert_eq!(first, second);

        let rows = db.list_reminders().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.title, "new title");
        assert_eq!(rows[0].record, record("new title", "ff14-sub:A", 35));
    }

    #[tokio::test]
    async fn duplicate_key_insert_is_rejected() {
        let db = temp_db();
        db.insert_reminder(&record("A", "ff14-sub:A", 40)).await.unwrap();
        assert!(db.insert_reminder(&record("A", "ff14-sub:A", 41)).await.is_err());
    }

    #[tokio::test]
    async fn updating_missing_row_fails() {
        let db = temp_db();
        assert!(db
            .update_reminder("rm_missing", &record("A", "ff14-sub:A", 1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn list_is_ordered_by_start() {
        let db = temp_db();
        db.insert_reminder(&record("late", "ff14-sub:L", 300)).await.unwrap();
        db.insert_reminder(&record("early", "ff14-sub:E", 5)).await.unwrap();

        let titles: Vec<String> = db
            .list_reminders()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.record.title)
            .collect();
        assert_eq!(titles, vec!["early", "late"]);
    }
}
