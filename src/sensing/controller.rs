use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::settings::Region;

use super::loop_worker::{LoopStats, PollLoop};
use super::region::RegionMailbox;

/// Owns the background poll loop task and its out-of-band inputs.
pub struct MonitorController {
    handle: Option<JoinHandle<LoopStats>>,
    cancel_token: Option<CancellationToken>,
    mailbox: RegionMailbox,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            mailbox: RegionMailbox::new(),
        }
    }

    /// Mailbox to hand to the [`PollLoop`] this controller will run.
    pub fn mailbox(&self) -> RegionMailbox {
        self.mailbox.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&mut self, mut poll_loop: PollLoop, interval_secs: u64) -> Result<()> {
        if self.handle.is_some() {
            bail!("monitoring already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle =
            tokio::spawn(async move { poll_loop.run(interval_secs, token_clone).await });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Queue a new capture region; the loop picks it up before its next capture.
    pub fn publish_region(&self, region: Region) {
        info!("Recalibration requested: {region}");
        self.mailbox.publish(region);
    }

    pub async fn stop(&mut self) -> Result<LoopStats> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => handle.await.context("monitoring loop task failed to join"),
            None => Ok(LoopStats::default()),
        }
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::capture::TextSource;
    use crate::settings::ReminderSettings;
    use crate::sync::{MemoryReminderStore, ReminderSynchronizer};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingSource {
        regions: Mutex<Vec<Region>>,
    }

    #[async_trait]
    impl TextSource for RecordingSource {
        async fn recognize(&self, region: &Region) -> Result<String> {
            self.regions.lock().unwrap().push(*region);
            Ok("潜水艦A [Rank50] [残り 2:00]".into())
        }
    }

    fn region(x: u32) -> Region {
        Region {
            x,
            y: 0,
            width: 100,
            height: 50,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_recalibrate_stop() {
        let source = Arc::new(RecordingSource {
            regions: Mutex::new(Vec::new()),
        });
        let mut controller = MonitorController::new();
        let poll_loop = PollLoop::new(
            source.clone(),
            ReminderSynchronizer::new(Arc::new(MemoryReminderStore::new())),
            ReminderSettings::default(),
            region(0),
            controller.mailbox(),
        );

        controller.start(poll_loop, 10).unwrap();
        assert!(controller.is_running());

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        controller.publish_region(region(9));
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;

        let stats = controller.stop().await.unwrap();
        assert!(!controller.is_running());
        assert!(stats.cycles >= 2);
        assert_eq!(stats.failed_cycles, 0);
        assert_eq!(stats.reminders_synced, 1);

        let seen = source.regions.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&region(0)));
        assert_eq!(seen.last(), Some(&region(9)));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut controller = MonitorController::new();
        assert_eq!(controller.stop().await.unwrap(), LoopStats::default());
    }
}
