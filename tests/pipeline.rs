use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use subwatch::parsing::normalize;
use subwatch::sensing::{PollLoop, RegionMailbox, TextSource};
use subwatch::settings::ReminderSettings;
use subwatch::sync::MemoryReminderStore;
use subwatch::{
    extract, extract_naive, Region, ReminderRecord, ReminderSynchronizer, SyncStateTracker,
};

fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn to_full_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '0'..='9' => char::from_u32(c as u32 - '0' as u32 + 0xFF10).unwrap(),
            ':' => '：',
            '[' => '［',
            ']' => '］',
            ' ' => '\u{3000}',
            other => other,
        })
        .collect()
}

#[test]
fn hours_and_minutes_round_trip_through_extract() {
    for hours in [0u32, 1, 5, 23] {
        for minutes in [0u32, 1, 30, 59] {
            let text = format!("潜水艦A [{hours}時間 {minutes}分]");
            let batch = extract(&text, Some(new_year()));
            let expected = hours * 60 + minutes;

            if expected == 0 {
                assert!(batch.is_empty(), "zero countdown must be dropped: {text}");
                continue;
            }
            assert_eq!(batch.len(), 1, "{text}");
            let record = batch.get("潜水艦A").unwrap();
            assert_eq!(record.remaining_minutes, expected);
            assert_eq!(record.eta, new_year() + Duration::minutes(i64::from(expected)));
        }
    }
}

#[test]
fn full_width_input_matches_half_width() {
    let samples = [
        "潜水艦A [Rank50] [残り 1時間 05分]\n潜水艦B [Rank12] [残り 3:15]",
        "潜水艦C [残り 49分]",
        "潜水艦D 残り 12:05",
    ];
    for sample in samples {
        let wide = to_full_width(sample);
        assert_eq!(
            extract(&wide, Some(new_year())),
            extract(sample, Some(new_year())),
            "{wide}"
        );
    }
}

#[test]
fn duplicate_names_keep_the_shorter_countdown() {
    let text = "潜水艦A [Rank50] [残り 1時間 05分]\n潜水艦A [Rank50] [残り 0時間 40分]";
    let batch = extract(text, Some(new_year()));

    assert_eq!(batch.len(), 1);
    let record = batch.iter().next().unwrap();
    assert_eq!(record.name, "潜水艦A");
    assert_eq!(record.remaining_minutes, 40);
    assert_eq!(record.eta, Utc.with_ymd_and_hms(2024, 1, 1, 0, 40, 0).unwrap());
}

#[test]
fn six_entities_are_capped_to_the_four_soonest() {
    let text = [
        "Alpha [Rank1] [残り 5時間 00分]",
        "Bravo [Rank2] [残り 0時間 20分]",
        "Charlie [Rank3] [残り 2:10]",
        "Delta [Rank4] [残り 45分]",
        "Echo [Rank5] [残り 9時間 59分]",
        "Foxtrot [Rank6] [残り 1時間 00分]",
    ]
    .join("\n");

    let batch = extract(&text, Some(new_year()));
    let got: Vec<(&str, u32)> = batch
        .iter()
        .map(|r| (r.name.as_str(), r.remaining_minutes))
        .collect();
    assert_eq!(
        got,
        vec![("Bravo", 20), ("Delta", 45), ("Foxtrot", 60), ("Charlie", 130)]
    );
}

#[test]
fn output_is_sorted_and_bounded_for_noisy_input() {
    let text = "\
潜水艦A [Rank50] [残り 3時間 O5分]
[Rank50] [残り 1時間]
潜水艦B ［Rank９９］ ［殘り　２時閒　１０分］
ノイズ行
潜水艦C [Rank1] [探索完了]
潜水艦D [Rank3] 残り 15分
潜水艦E [Rank3] [残り 7:45]
潜水艦F [Rank3] [残り 0分]";

    let batch = extract(text, Some(new_year()));
    assert!(batch.len() <= 4);
    let minutes: Vec<u32> = batch.iter().map(|r| r.remaining_minutes).collect();
    let mut sorted = minutes.clone();
    sorted.sort_unstable();
    assert_eq!(minutes, sorted);
    assert_eq!(minutes, vec![15, 130, 185, 465]);
    assert!(batch.get("潜水艦F").is_none());
}

#[test]
fn naive_now_is_treated_as_utc() {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let text = "潜水艦A [Rank50] [残り 0時間 40分]";
    assert_eq!(extract_naive(text, naive), extract(text, Some(new_year())));
}

#[test]
fn normalizer_is_idempotent_on_ocr_samples() {
    let samples = [
        "潜水艦Ａ ［Rank５０］ ［殘り　１時閒　Ｏ５分］",
        "Soleil [残り lO:O5]",
        "探査中 IlOo",
    ];
    for sample in samples {
        let once = normalize(sample);
        assert_eq!(normalize(&once), once);
    }
}

#[test]
fn tracker_threshold_sequence() {
    let mut tracker = SyncStateTracker::new(2);
    assert!(tracker.should_sync("A", 100));
    tracker.record("A", 100);
    assert!(!tracker.should_sync("A", 99));
    assert!(tracker.should_sync("A", 98));
}

#[tokio::test]
async fn ensure_updates_instead_of_duplicating() {
    let store = Arc::new(MemoryReminderStore::new());
    let sync = ReminderSynchronizer::new(store.clone());
    let start = new_year();
    let mut record = ReminderRecord {
        title: "潜水艦 A 帰還".into(),
        start,
        end: start + Duration::minutes(10),
        external_key: "ff14-sub:A".into(),
        reminder_offset_minutes: 10,
    };

    let first = sync.ensure(&record).await.unwrap();
    record.title = "潜水艦 A 帰還 (updated)".into();
    let second = sync.ensure(&record).await.unwrap();

    assert_eq!(first, second);
    let entries = store.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].record.title, "潜水艦 A 帰還 (updated)");
}

struct FixedText(&'static str);

#[async_trait]
impl TextSource for FixedText {
    async fn recognize(&self, _region: &Region) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn one_cycle_creates_one_reminder_per_submarine() {
    let store = Arc::new(MemoryReminderStore::new());
    let mut poll = PollLoop::new(
        Arc::new(FixedText(
            "潜水艦A [Rank50] [残り 1時間 05分]\n\
             潜水艦A [Rank50] [残り 0時間 40分]\n\
             潜水艦B [Rank12] [残り 2:00]",
        )),
        ReminderSynchronizer::new(store.clone()),
        ReminderSettings::default(),
        Region {
            x: 0,
            y: 0,
            width: 400,
            height: 200,
        },
        RegionMailbox::new(),
    );

    let report = poll.run_cycle(Some(new_year())).await.unwrap();
    assert_eq!(report.detected, 2);
    assert_eq!(report.synced.len(), 2);

    // Same capture again: nothing moved, nothing rewritten.
    let again = poll.run_cycle(Some(new_year())).await.unwrap();
    assert_eq!(again.synced.len(), 0);
    assert_eq!(again.unchanged, 2);

    let entries = store.entries().await;
    let keys: Vec<&str> = entries.iter().map(|e| e.record.external_key.as_str()).collect();
    assert_eq!(keys, vec!["ff14-sub:潜水艦A", "ff14-sub:潜水艦B"]);
    assert_eq!(entries[0].record.title, "潜水艦 潜水艦A 帰還");
    assert_eq!(
        entries[0].record.start,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 40, 0).unwrap()
    );
}
