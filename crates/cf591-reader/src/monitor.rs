//! Background monitoring with push-style callback delivery.
//!
//! [`Reader::monitor`] moves the reader onto a dedicated task that keeps
//! inventory running, polls with a bounded per-iteration timeout, debounces
//! repeated sightings and invokes the callback for each accepted detection.
//!
//! Shutdown is cooperative: [`Monitor::stop`] raises a flag the loop checks
//! every iteration, then waits a bounded time for the task to finish its
//! in-flight poll and hand the reader back. A poll cannot be interrupted at
//! the driver boundary, so the join window should exceed the poll timeout;
//! if it elapses anyway the task is aborted and the reader is lost with it.
//!
//! Faults inside the loop are answered with an inventory restart. Repeated
//! consecutive restart failures end the worker rather than spinning against
//! dead hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cf591_core::{Debounce, TagDetection};
use cf591_driver::Driver;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::reader::Reader;

/// Tuning for the background monitor loop.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Wait window per poll; also the worst-case reaction time to a stop
    /// request.
    pub poll_timeout: Duration,

    /// Debounce window applied per EPC before the callback fires.
    pub debounce_window: Duration,

    /// Optional cap on tracked EPCs, for monitors that run for days.
    pub max_tracked_tags: Option<usize>,

    /// Consecutive failed inventory restarts after which the worker gives
    /// up.
    pub max_recovery_failures: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(500),
            debounce_window: Duration::from_millis(1000),
            max_tracked_tags: None,
            max_recovery_failures: 3,
        }
    }
}

/// Handle to a running background monitor.
pub struct Monitor<D: Driver> {
    stop: Arc<AtomicBool>,
    task: JoinHandle<Reader<D>>,
}

impl<D: Driver + 'static> Reader<D> {
    /// Move this reader onto a background task and deliver detections to
    /// `callback`.
    ///
    /// The callback runs on the worker task; keep it short and hand heavy
    /// work to a channel. Stop the monitor with [`Monitor::stop`] to get the
    /// reader back.
    pub fn monitor<F>(self, options: MonitorOptions, callback: F) -> Monitor<D>
    where
        F: FnMut(TagDetection) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(monitor_loop(self, options, callback, Arc::clone(&stop)));
        Monitor { stop, task }
    }
}

impl<D: Driver> Monitor<D> {
    /// Request a cooperative stop and wait up to `join_timeout` for the
    /// worker to finish.
    ///
    /// Returns the reader (inventory stopped best-effort) on a clean join.
    /// Returns `None` if the worker panicked or the join window elapsed; in
    /// the latter case the task is aborted.
    pub async fn stop(self, join_timeout: Duration) -> Option<Reader<D>> {
        let Monitor { stop, mut task } = self;
        stop.store(true, Ordering::Relaxed);

        match tokio::time::timeout(join_timeout, &mut task).await {
            Ok(Ok(reader)) => Some(reader),
            Ok(Err(join_error)) => {
                error!(%join_error, "monitor worker did not shut down cleanly");
                None
            }
            Err(_elapsed) => {
                warn!(?join_timeout, "monitor join window elapsed, aborting worker");
                task.abort();
                None
            }
        }
    }

    /// True once the worker has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn monitor_loop<D, F>(
    mut reader: Reader<D>,
    options: MonitorOptions,
    mut callback: F,
    stop: Arc<AtomicBool>,
) -> Reader<D>
where
    D: Driver,
    F: FnMut(TagDetection) + Send,
{
    let mut debounce = Debounce::new(options.debounce_window);
    if let Some(cap) = options.max_tracked_tags {
        debounce = debounce.with_max_entries(cap);
    }

    if let Err(error) = reader.ensure_inventory().await {
        error!(%error, "monitor could not start inventory");
        return reader;
    }
    debug!("monitor running");

    let mut recovery_failures = 0u32;
    while !stop.load(Ordering::Relaxed) {
        match reader.poll(options.poll_timeout).await {
            Ok(Some(detection)) => {
                recovery_failures = 0;
                if debounce.accept(&detection, Instant::now()) {
                    callback(detection);
                }
            }
            Ok(None) => {
                recovery_failures = 0;
            }
            Err(error) => {
                warn!(%error, "monitor poll fault, restarting inventory");
                reader.stop_inventory_best_effort().await;
                match reader.ensure_inventory().await {
                    Ok(()) => recovery_failures = 0,
                    Err(restart_error) => {
                        recovery_failures += 1;
                        error!(%restart_error, recovery_failures, "inventory restart failed");
                        if recovery_failures >= options.max_recovery_failures {
                            break;
                        }
                    }
                }
            }
        }
    }

    reader.stop_inventory_best_effort().await;
    debug!("monitor stopped");
    reader
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryState;
    use crate::reader::ReaderOptions;
    use cf591_driver::mock::{MockDriver, MockDriverHandle};
    use cf591_driver::{Command, Endpoint};
    use std::sync::Mutex;

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

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl FnMut(TagDetection) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |detection: TagDetection| {
            sink.lock().unwrap().push(detection.epc_hex());
        };
        (seen, callback)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_debounced_detections() {
        let (reader, handle) = connected().await;

        // Same tag twice in quick succession, then a different one.
        handle.push_tag(&[0xAA, 0x01], -300, 1, 1);
        handle.push_tag(&[0xAA, 0x01], -310, 1, 1);
        handle.push_tag(&[0xBB, 0x02], -400, 1, 1);

        let (seen, callback) = collector();
        let monitor = reader.monitor(
            MonitorOptions {
                poll_timeout: Duration::from_millis(50),
                ..MonitorOptions::default()
            },
            callback,
        );

        // Let the worker drain the scripted reports.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let reader = monitor.stop(Duration::from_secs(2)).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["AA01", "BB02"]);
        assert_eq!(reader.inventory_state(), InventoryState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_returns_the_reader_and_stops_inventory() {
        let (reader, handle) = connected().await;
        let (_seen, callback) = collector();

        let monitor = reader.monitor(
            MonitorOptions {
                poll_timeout: Duration::from_millis(50),
                ..MonitorOptions::default()
            },
            callback,
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        let reader = monitor.stop(Duration::from_secs(2)).await.unwrap();
        assert!(reader.is_connected());
        assert!(handle.count(Command::StopInventory) >= 1);
    }
}
