//! The inventory controller state machine.
//!
//! Continuous inventory on this hardware is a modal state: between a start
//! and a stop command the device singulates tags on its own and buffers
//! reports, and several unrelated commands misbehave while it is active.
//! This module owns that mode. The state machine is small:
//!
//! ```text
//!            start                poll(timeout)
//!   Idle ───────────► Running ◄───────────────┐
//!    ▲                   │  │                 │
//!    │                   │  └─────────────────┘
//!    │       stop        ▼        (zero or one detection per poll)
//!    └────────────── Stopping
//! ```
//!
//! Rules the implementation enforces:
//!
//! - `start` on a `Running` controller quiesces first. Starting on top of a
//!   running inventory is undefined at the wire level and would carry stale
//!   anti-collision state into the new round.
//! - `stop` is idempotent, and a stop answered with "timeout" or "inventory
//!   already finished" is a successful stop: the device reports exactly that
//!   when the round self-terminated.
//! - `poll` converts the recoverable outcomes to `None`. No caller above
//!   this point ever treats an empty field as a failure.
//!
//! The state lock is held only across the check-and-transition itself, never
//! across a driver call, so a long poll cannot delay a concurrent state
//! observer. Interrupting an in-flight poll is not possible at the driver
//! boundary; stops rely on the poll's own timeout instead.

use std::fmt;
use std::time::Duration;

use cf591_core::{Error, Result, StatusOutcome, TagDetection};
use cf591_driver::{Command, Driver};
use tracing::{debug, warn};

use crate::reader::Reader;
use crate::session::timeout_ms_arg;

/// Per-poll wait window used by the composite read operations.
pub(crate) const READ_POLL_SLICE: Duration = Duration::from_millis(500);

/// Inventory mode of one reader session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryState {
    /// No inventory active; all commands are available.
    Idle,

    /// Continuous inventory is running and buffering tag reports.
    Running,

    /// A stop has been issued and is awaiting the device's acknowledgement.
    Stopping,
}

impl fmt::Display for InventoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
        })
    }
}

/// Tuning for [`Reader::read_many`].
#[derive(Debug, Clone)]
pub struct ReadManyOptions {
    /// Stop after this many detections; 0 means unbounded.
    pub max_count: usize,

    /// Wait window per poll.
    pub poll_timeout: Duration,

    /// Give up after this many consecutive empty polls.
    pub max_consecutive_empty: u32,
}

impl Default for ReadManyOptions {
    fn default() -> Self {
        Self {
            max_count: 0,
            poll_timeout: Duration::from_secs(1),
            max_consecutive_empty: 3,
        }
    }
}

impl<D: Driver> Reader<D> {
    /// Start continuous inventory.
    ///
    /// `count_limit` of 0 means unbounded; `param` is the inventory
    /// parameter word and is normally 0. If inventory is already active it
    /// is stopped first so the anti-collision algorithm restarts clean.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] if the device refuses the start. Transient
    /// refusals right after power-up are common; see
    /// [`ReaderOptions::start_retry`](crate::ReaderOptions) and the
    /// retry-wrapped paths that use it.
    pub async fn start_inventory(&mut self, count_limit: u8, param: u32) -> Result<()> {
        if self.inventory_state() != InventoryState::Idle {
            if let Err(error) = self.stop_inventory(self.options.stop_timeout).await {
                warn!(%error, "stop before restart failed");
            }
            self.set_inventory_state(InventoryState::Idle);
        }

        let mut args = Vec::with_capacity(5);
        args.push(count_limit);
        args.extend_from_slice(&param.to_le_bytes());

        let reply = self.session.invoke(Command::StartInventory, &args).await?;
        match reply.outcome {
            StatusOutcome::Success => {
                self.set_inventory_state(InventoryState::Running);
                debug!(count_limit, param, "inventory running");
                Ok(())
            }
            _ => {
                self.set_inventory_state(InventoryState::Idle);
                reply.success().map(drop)
            }
        }
    }

    /// Stop continuous inventory.
    ///
    /// A no-op when already idle. The device answers with a timeout or an
    /// "inventory finished" status when the round had already terminated on
    /// its own; both count as successful stops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] only for a real fault, in which case the
    /// controller assumes inventory is still running.
    pub async fn stop_inventory(&mut self, timeout: Duration) -> Result<()> {
        if self.inventory_state() == InventoryState::Idle {
            return Ok(());
        }
        self.set_inventory_state(InventoryState::Stopping);

        let reply = match self
            .session
            .invoke(Command::StopInventory, &timeout_ms_arg(timeout))
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                self.set_inventory_state(InventoryState::Running);
                return Err(error);
            }
        };

        match reply.outcome {
            StatusOutcome::Success | StatusOutcome::Timeout | StatusOutcome::EmptyOrStopped => {
                self.set_inventory_state(InventoryState::Idle);
                debug!("inventory stopped");
                Ok(())
            }
            StatusOutcome::Fault(status) => {
                self.set_inventory_state(InventoryState::Running);
                Err(Error::command(Command::StopInventory.name(), status))
            }
        }
    }

    /// Wait up to `timeout` for one buffered tag report.
    ///
    /// Returns `None` when nothing arrived in time or the inventory round
    /// ended; neither is an error. The wait is bounded by the device's own
    /// timeout handling, so this never blocks meaningfully past `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] for real device faults and
    /// [`Error::Payload`](cf591_core::Error::Payload) for an undecodable
    /// report.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<TagDetection>> {
        let reply = self
            .session
            .invoke(Command::PollTag, &timeout_ms_arg(timeout))
            .await?;

        match reply.outcome {
            StatusOutcome::Success => Ok(Some(TagDetection::decode(&reply.payload)?)),
            StatusOutcome::Timeout | StatusOutcome::EmptyOrStopped => Ok(None),
            StatusOutcome::Fault(status) => {
                Err(Error::command(Command::PollTag.name(), status))
            }
        }
    }

    /// Read one tag, then stop.
    ///
    /// Starts inventory (retry-wrapped), polls in bounded slices until a
    /// detection arrives or `timeout` elapses, and always stops inventory on
    /// the way out, error or not. The deadline is checked before each poll,
    /// so a detection delivered exactly at the deadline is still accepted.
    ///
    /// A timeout is a valid `None` result, not an error.
    pub async fn read_single(&mut self, timeout: Duration) -> Result<Option<TagDetection>> {
        self.ensure_inventory().await?;
        let result = self.wait_for_detection(timeout).await;
        self.stop_inventory_best_effort().await;
        result
    }

    /// Read tags until `max_count` is reached or the field stays empty.
    ///
    /// Same cleanup guarantee as [`read_single`](Self::read_single):
    /// inventory is stopped on every exit path.
    pub async fn read_many(&mut self, options: &ReadManyOptions) -> Result<Vec<TagDetection>> {
        self.ensure_inventory().await?;
        let result = self.collect_detections(options).await;
        self.stop_inventory_best_effort().await;
        result
    }

    async fn wait_for_detection(&mut self, timeout: Duration) -> Result<Option<TagDetection>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Sub-millisecond remainders still round up to one device tick.
            let slice = READ_POLL_SLICE
                .min(deadline - now)
                .max(Duration::from_millis(1));
            if let Some(detection) = self.poll(slice).await? {
                return Ok(Some(detection));
            }
        }
    }

    async fn collect_detections(&mut self, options: &ReadManyOptions) -> Result<Vec<TagDetection>> {
        let mut detections = Vec::new();
        let mut consecutive_empty = 0u32;

        loop {
            if options.max_count != 0 && detections.len() >= options.max_count {
                return Ok(detections);
            }
            match self.poll(options.poll_timeout).await? {
                Some(detection) => {
                    consecutive_empty = 0;
                    detections.push(detection);
                }
                None => {
                    consecutive_empty += 1;
                    if consecutive_empty >= options.max_consecutive_empty {
                        return Ok(detections);
                    }
                }
            }
        }
    }

    /// Make sure inventory is running, retrying the start per the configured
    /// schedule.
    ///
    /// This drives [`RetryPolicy`](crate::RetryPolicy)'s schedule inline
    /// rather than through [`RetryPolicy::run`](crate::RetryPolicy::run): the
    /// latter takes the retried operation as an async closure, whose
    /// higher-ranked borrow region cannot be proven `Send` on the current
    /// toolchain, which would stop this `&mut self` path from being driven on
    /// the spawned monitor task. The loop below is the exact equivalent of
    /// `retry.run("inventory start", || self.start_inventory(0, 0))`.
    pub(crate) async fn ensure_inventory(&mut self) -> Result<()> {
        if self.inventory_state() == InventoryState::Running {
            return Ok(());
        }
        let retry = self.options.start_retry.clone();
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.start_inventory(0, 0).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt < max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(%error, attempt, ?delay, "inventory start failed, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Cleanup stop: failures are logged and swallowed so cleanup itself
    /// never masks a primary result.
    pub(crate) async fn stop_inventory_best_effort(&mut self) {
        if let Err(error) = self.stop_inventory(self.options.stop_timeout).await {
            warn!(%error, "cleanup stop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderOptions;
    use cf591_core::status::code;
    use cf591_driver::Endpoint;
    use cf591_driver::mock::{MockDriver, MockDriverHandle, Scripted};

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

    #[tokio::test]
    async fn start_transitions_to_running() {
        let (mut reader, handle) = connected().await;

        reader.start_inventory(0, 0).await.unwrap();
        assert_eq!(reader.inventory_state(), InventoryState::Running);
        assert_eq!(handle.count(Command::StartInventory), 1);
        assert_eq!(handle.count(Command::StopInventory), 0);
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_no_op() {
        let (mut reader, handle) = connected().await;

        reader.stop_inventory(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reader.inventory_state(), InventoryState::Idle);
        assert_eq!(handle.count(Command::StopInventory), 0);
    }

    #[tokio::test]
    async fn double_start_quiesces_first() {
        let (mut reader, handle) = connected().await;

        reader.start_inventory(0, 0).await.unwrap();
        reader.start_inventory(0, 0).await.unwrap();

        assert_eq!(reader.inventory_state(), InventoryState::Running);
        assert_eq!(
            handle.command_sequence(),
            vec![
                Command::StartInventory,
                Command::StopInventory,
                Command::StartInventory,
            ]
        );
    }

    #[tokio::test]
    async fn stop_accepts_self_terminated_inventory() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        // Device reports "inventory already finished" on stop.
        handle.push(
            Command::StopInventory,
            Scripted::status(code::INVENTORY_STOPPED),
        );
        reader.stop_inventory(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reader.inventory_state(), InventoryState::Idle);

        // And "timeout" is an equally valid stop acknowledgement.
        reader.start_inventory(0, 0).await.unwrap();
        handle.push(Command::StopInventory, Scripted::status(code::COMM_TIMEOUT));
        reader.stop_inventory(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reader.inventory_state(), InventoryState::Idle);
    }

    #[tokio::test]
    async fn stop_fault_keeps_running_state() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        handle.push(
            Command::StopInventory,
            Scripted::status(code::MODULE_INTERNAL),
        );
        let error = reader
            .stop_inventory(Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(code::MODULE_INTERNAL));
        assert_eq!(reader.inventory_state(), InventoryState::Running);
    }

    #[tokio::test]
    async fn poll_converts_recoverable_outcomes_to_none() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        handle.push(Command::PollTag, Scripted::status(code::COMM_TIMEOUT));
        assert!(reader.poll(Duration::from_millis(10)).await.unwrap().is_none());

        handle.push(Command::PollTag, Scripted::status(code::INVENTORY_STOPPED));
        assert!(reader.poll(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poll_propagates_faults() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        handle.push(Command::PollTag, Scripted::status(code::BUFFER_OVERFLOW));
        let error = reader.poll(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(error.status(), Some(code::BUFFER_OVERFLOW));
    }

    #[tokio::test]
    async fn state_display() {
        assert_eq!(InventoryState::Idle.to_string(), "Idle");
        assert_eq!(InventoryState::Running.to_string(), "Running");
        assert_eq!(InventoryState::Stopping.to_string(), "Stopping");
    }
}
