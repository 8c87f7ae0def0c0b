//! Trigger-based reads over a persistently running inventory.
//!
//! The trigger flow serves kiosk-style deployments: inventory runs
//! continuously, and each user action ("read the badge now") should return
//! one *fresh* detection as fast as possible. Stopping and restarting
//! inventory per trigger costs hundreds of milliseconds of Q-algorithm
//! settling, so the flow instead drains whatever stale reports accumulated
//! in the device buffer since the last trigger, then polls for a new one.
//!
//! Draining happens while inventory keeps running; the stop/restart path is
//! reserved for actual fault recovery mid-read.

use std::time::Duration;

use cf591_core::{Result, TagDetection};
use cf591_driver::Driver;
use tracing::{debug, warn};

use crate::reader::Reader;

/// Bounds for the pre-read buffer drain.
///
/// Every bound exists to keep a pathological field (hundreds of tags, or a
/// device wedged into replaying reports) from stalling the trigger.
#[derive(Debug, Clone)]
pub struct FlushOptions {
    /// Wait window per drain poll; short, the buffer either has a report
    /// ready or it does not.
    pub poll_timeout: Duration,

    /// Total time budget for draining.
    pub budget: Duration,

    /// Maximum number of stale reports to drain.
    pub max_drained: usize,

    /// Consecutive empty polls after which the buffer counts as drained.
    pub max_consecutive_empty: u32,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(20),
            budget: Duration::from_millis(200),
            max_drained: 500,
            max_consecutive_empty: 2,
        }
    }
}

/// Tuning for [`Reader::trigger_read`].
#[derive(Debug, Clone)]
pub struct TriggerOptions {
    /// Overall deadline for the fresh detection.
    pub timeout: Duration,

    /// Wait window per poll while hunting for the fresh detection.
    pub poll_timeout: Duration,

    /// Buffer drain bounds.
    pub flush: FlushOptions,

    /// Buzzer pulse length in 10 ms units while the read is armed; `None`
    /// leaves the buzzer alone.
    pub buzzer: Option<u8>,
}

impl TriggerOptions {
    /// Aggressive polling for fastest detection, the usual choice for
    /// user-facing triggers.
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_timeout: Duration::from_millis(50),
            flush: FlushOptions::default(),
            buzzer: None,
        }
    }

    /// Slower polling for background or scripted use, easier on the serial
    /// link.
    pub fn patient() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_millis(200),
            flush: FlushOptions {
                poll_timeout: Duration::from_millis(50),
                budget: Duration::from_millis(500),
                ..FlushOptions::default()
            },
            buzzer: None,
        }
    }

    /// Enable an audible confirmation pulse while the read is armed.
    pub fn with_buzzer(mut self, duration_10ms: u8) -> Self {
        self.buzzer = Some(duration_10ms);
        self
    }
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self::fast()
    }
}

impl<D: Driver> Reader<D> {
    /// Wait for one fresh detection while keeping inventory running.
    ///
    /// Ensures inventory is active (retry-wrapped start), drains stale
    /// buffered reports, then polls until a new detection arrives or the
    /// deadline elapses. A device fault mid-hunt is answered with one
    /// stop-and-restart recovery attempt per occurrence; if the restart
    /// itself fails, the fault propagates.
    ///
    /// Inventory is left running on every exit path. A deadline without a
    /// tag is a valid `None` result.
    pub async fn trigger_read(&mut self, options: &TriggerOptions) -> Result<Option<TagDetection>> {
        self.ensure_inventory().await?;

        let drained = self.flush_buffered(&options.flush).await;
        if drained > 0 {
            debug!(drained, "drained stale tag reports");
        }

        if let Some(duration) = options.buzzer
            && let Err(error) = self.enable_buzzer(duration).await
        {
            warn!(%error, "buzzer enable failed");
        }

        let result = self.hunt_fresh_detection(options).await;

        if options.buzzer.is_some()
            && let Err(error) = self.disable_buzzer().await
        {
            warn!(%error, "buzzer disable failed");
        }

        result
    }

    /// Drain buffered reports while inventory keeps running.
    ///
    /// Faults abort the drain with a warning; the subsequent read will
    /// surface anything persistent.
    pub(crate) async fn flush_buffered(&mut self, options: &FlushOptions) -> usize {
        let deadline = tokio::time::Instant::now() + options.budget;
        let mut drained = 0usize;
        let mut consecutive_empty = 0u32;

        while tokio::time::Instant::now() < deadline && drained < options.max_drained {
            match self.poll(options.poll_timeout).await {
                Ok(Some(_)) => {
                    drained += 1;
                    consecutive_empty = 0;
                }
                Ok(None) => {
                    consecutive_empty += 1;
                    if consecutive_empty >= options.max_consecutive_empty {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "buffer drain aborted");
                    break;
                }
            }
        }
        drained
    }

    async fn hunt_fresh_detection(
        &mut self,
        options: &TriggerOptions,
    ) -> Result<Option<TagDetection>> {
        let deadline = tokio::time::Instant::now() + options.timeout;

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let slice = options
                .poll_timeout
                .min(deadline - now)
                .max(Duration::from_millis(1));

            match self.poll(slice).await {
                Ok(Some(detection)) => return Ok(Some(detection)),
                Ok(None) => {}
                Err(error) => {
                    warn!(%error, "poll fault during trigger read, restarting inventory");
                    self.stop_inventory_best_effort().await;
                    self.ensure_inventory().await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryState;
    use crate::reader::ReaderOptions;
    use cf591_core::status::code;
    use cf591_driver::mock::{MockDriver, MockDriverHandle, Scripted};
    use cf591_driver::{Command, Endpoint};

    async fn connected() -> (Reader<MockDriver>, MockDriverHandle) {
        let (driver, handle) = MockDriver::new();
        let reader = Reader::connect(
            driver,
            Endpoint::serial("/dev/ttyUSB0"),
            ReaderOptions::default(),
        )
        .await
        .unwrap();
        (reader, handle)
    }

    fn quick() -> TriggerOptions {
        TriggerOptions {
            timeout: Duration::from_secs(2),
            poll_timeout: Duration::from_millis(50),
            flush: FlushOptions::default(),
            buzzer: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stale_reports_are_drained_before_the_fresh_one() {
        let (mut reader, handle) = connected().await;

        // Two stale reports sit in the buffer, then the field goes quiet;
        // the fresh tag arrives only after the drain has finished.
        handle.push_tag(&[0x01], -300, 1, 1);
        handle.push_tag(&[0x02], -300, 1, 1);
        handle.push_poll_timeouts(2);
        handle.push_tag(&[0xFF], -250, 1, 1);

        let detection = reader.trigger_read(&quick()).await.unwrap().unwrap();
        assert_eq!(detection.epc_hex(), "FF");
        assert_eq!(reader.inventory_state(), InventoryState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_returns_none_and_leaves_inventory_running() {
        let (mut reader, handle) = connected().await;

        let result = reader.trigger_read(&quick()).await.unwrap();
        assert!(result.is_none());
        assert_eq!(reader.inventory_state(), InventoryState::Running);
        assert_eq!(handle.count(Command::StopInventory), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fault_mid_hunt_restarts_inventory() {
        let (mut reader, handle) = connected().await;

        // Drain finds the buffer empty, then the hunt hits a fault before
        // the tag appears.
        handle.push_poll_timeouts(2);
        handle.push(Command::PollTag, Scripted::status(code::BUFFER_OVERFLOW));
        handle.push_tag(&[0xAB], -400, 1, 1);

        let detection = reader.trigger_read(&quick()).await.unwrap().unwrap();
        assert_eq!(detection.epc_hex(), "AB");

        // Recovery issued a stop and a second start.
        assert_eq!(handle.count(Command::StopInventory), 1);
        assert_eq!(handle.count(Command::StartInventory), 2);
        assert_eq!(reader.inventory_state(), InventoryState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn buzzer_wraps_the_hunt() {
        let (mut reader, handle) = connected().await;
        handle.push_poll_timeouts(2);
        handle.push_tag(&[0xCD], -300, 1, 1);

        let options = quick().with_buzzer(5);
        reader.trigger_read(&options).await.unwrap().unwrap();

        let sequence = handle.command_sequence();
        let enable = sequence
            .iter()
            .position(|&c| c == Command::EnableBuzzer)
            .unwrap();
        let disable = sequence
            .iter()
            .position(|&c| c == Command::DisableBuzzer)
            .unwrap();
        assert!(enable < disable);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_respects_the_report_cap() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        for _ in 0..10 {
            handle.push_tag(&[0x77], -300, 1, 1);
        }

        let drained = reader
            .flush_buffered(&FlushOptions {
                max_drained: 4,
                ..FlushOptions::default()
            })
            .await;
        assert_eq!(drained, 4);
    }
}
