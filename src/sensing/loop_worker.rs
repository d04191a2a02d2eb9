use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    parsing::extract,
    settings::{Region, ReminderSettings},
    sync::{ReminderRecord, ReminderSynchronizer, SyncStateTracker},
};

use super::capture::TextSource;
use super::region::RegionMailbox;

// Set to false to silence this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Lower bound on the pause between cycles, whatever the configured interval.
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub reminders_synced: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub detected: usize,
    /// `(name, reminder id)` for each reminder written this cycle.
    pub synced: Vec<(String, String)>,
    /// Entries whose countdown had not moved enough to rewrite.
    pub unchanged: usize,
}

/// Capture, OCR, parse, reconcile and sync on a fixed cadence.
///
/// Owns its [`SyncStateTracker`]; the only outside input while running is the region mailbox.
pub struct PollLoop {
    source: Arc<dyn TextSource>,
    synchronizer: ReminderSynchronizer,
    tracker: SyncStateTracker,
    reminder: ReminderSettings,
    region: Region,
    mailbox: RegionMailbox,
    stats: LoopStats,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn TextSource>,
        synchronizer: ReminderSynchronizer,
        reminder: ReminderSettings,
        region: Region,
        mailbox: RegionMailbox,
    ) -> Self {
        let tracker = SyncStateTracker::new(reminder.min_change_minutes);
        Self {
            source,
            synchronizer,
            tracker,
            reminder,
            region,
            mailbox,
            stats: LoopStats::default(),
        }
    }

    pub fn effective_interval(interval_secs: u64) -> Duration {
        Duration::from_secs(interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Runs until `cancel` fires. Cycle failures are logged and never end the loop.
    pub async fn run(&mut self, interval_secs: u64, cancel: CancellationToken) -> LoopStats {
        let pause = Self::effective_interval(interval_secs);
        log_info!(
            "Monitoring started. Interval={}s region={}",
            pause.as_secs(),
            self.region
        );

        while !cancel.is_cancelled() {
            let started = Instant::now();
            match self.run_cycle(None).await {
                Ok(report) => log_debug!(
                    "cycle finished in {}ms: detected={} synced={} unchanged={}",
                    started.elapsed().as_millis(),
                    report.detected,
                    report.synced.len(),
                    report.unchanged
                ),
                Err(err) => {
                    self.stats.failed_cycles += 1;
                    log_error!("Error in monitoring cycle: {err:?}");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel.cancelled() => {}
            }
        }

        log_info!(
            "monitoring loop shutting down after {} cycles ({} failed)",
            self.stats.cycles,
            self.stats.failed_cycles
        );
        self.stats
    }

    /// One capture-to-sync pass. The tracker only advances for reminders that were written,
    /// so a failed sync is retried on the next cycle.
    ///
    /// `now` defaults to the clock read once OCR text is in hand.
    pub async fn run_cycle(&mut self, now: Option<DateTime<Utc>>) -> Result<CycleReport> {
        self.stats.cycles += 1;

        if let Some(region) = self.mailbox.take() {
            log_info!("Capture region updated to {region}");
            self.region = region;
        }

        let text = self
            .source
            .recognize(&self.region)
            .await
            .context("capture/OCR failed")?;

        let batch = extract(&text, now);
        let mut report = CycleReport {
            detected: batch.len(),
            ..CycleReport::default()
        };

        if batch.is_empty() {
            log_info!("No submarine lines recognized this cycle");
            return Ok(report);
        }
        log_info!("OCR detected {} entries", batch.len());

        for eta in &batch {
            if !self.tracker.should_sync(&eta.name, eta.remaining_minutes) {
                report.unchanged += 1;
                continue;
            }

            let record = ReminderRecord::for_eta(eta, &self.reminder);
            let id = self
                .synchronizer
                .ensure(&record)
                .await
                .with_context(|| format!("failed to sync reminder for {}", eta.name))?;

            log_info!(
                "Ensured reminder for {} at {} (id={})",
                eta.name,
                record.start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                id
            );
            self.tracker.record(&eta.name, eta.remaining_minutes);
            self.stats.reminders_synced += 1;
            report.synced.push((eta.name.clone(), id));
        }

        Ok(report)
    }
}
