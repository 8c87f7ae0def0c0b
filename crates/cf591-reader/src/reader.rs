//! The reader handle: connection lifecycle and shared state.
//!
//! [`Reader`] ties the transport session, the inventory state machine and
//! the configured policies together. Connection setup retries transient open
//! failures; teardown stops any running inventory best-effort so the
//! hardware is quiet for the next session, then closes the driver handle.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cf591_core::{PowerCap, Result};
use cf591_driver::{Driver, Endpoint};
use tracing::warn;

use crate::inventory::InventoryState;
use crate::retry::RetryPolicy;
use crate::session::Session;

/// Policies and limits for one reader connection.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Wait window for each open attempt.
    pub connect_timeout: Duration,

    /// Backoff schedule for opening the device.
    pub connect_retry: RetryPolicy,

    /// Backoff schedule for RF power changes.
    pub power_retry: RetryPolicy,

    /// Backoff schedule for inventory starts.
    pub start_retry: RetryPolicy,

    /// Wait window for implicit and cleanup inventory stops.
    pub stop_timeout: Duration,

    /// Highest RF power this unit's firmware accepts.
    pub power_cap: PowerCap,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            connect_retry: RetryPolicy::CONNECT,
            power_retry: RetryPolicy::POWER,
            start_retry: RetryPolicy::START_INVENTORY,
            stop_timeout: Duration::from_secs(1),
            power_cap: PowerCap::Standard,
        }
    }
}

/// Handle to one connected CF591 reader.
///
/// All operations take `&mut self`; one reader drives one device. To poll in
/// the background while the application does other work, hand the reader to
/// [`monitor`](Reader::monitor), which returns it on shutdown.
#[derive(Debug)]
pub struct Reader<D: Driver> {
    pub(crate) session: Session<D>,
    pub(crate) state: Arc<Mutex<InventoryState>>,
    pub(crate) options: ReaderOptions,
}

impl<D: Driver> Reader<D> {
    /// Connect to the device at `endpoint`.
    ///
    /// Open attempts are retried per `options.connect_retry`; devices
    /// commonly need a moment after power-on or USB re-enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](cf591_core::Error::Connection) once the
    /// retry schedule is exhausted. That is a hard error: check cabling and
    /// device permissions.
    pub async fn connect(driver: D, endpoint: Endpoint, options: ReaderOptions) -> Result<Self> {
        let session = Session::open(
            driver,
            endpoint,
            options.connect_timeout,
            &options.connect_retry,
        )
        .await?;

        Ok(Self {
            session,
            state: Arc::new(Mutex::new(InventoryState::Idle)),
            options,
        })
    }

    /// The endpoint this reader is attached to.
    pub fn endpoint(&self) -> &Endpoint {
        self.session.endpoint()
    }

    /// The configured policies and limits.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// True while the underlying session is open.
    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Current inventory state.
    pub fn inventory_state(&self) -> InventoryState {
        *self.state.lock().expect("inventory state lock poisoned")
    }

    /// Transition the inventory state machine.
    ///
    /// The lock is held only for the assignment, never across driver calls.
    pub(crate) fn set_inventory_state(&self, to: InventoryState) {
        *self.state.lock().expect("inventory state lock poisoned") = to;
    }

    /// Escape hatch: execute one raw command through the session funnel.
    ///
    /// Useful for vendor commands this crate has no typed wrapper for. The
    /// reply still goes through status classification like every other
    /// invocation.
    pub async fn invoke_raw(
        &mut self,
        command: cf591_driver::Command,
        args: &[u8],
    ) -> Result<crate::session::Reply> {
        self.session.invoke(command, args).await
    }

    /// Disconnect from the device.
    ///
    /// If inventory is still running a stop is issued first; failures there
    /// are logged and swallowed because the link is being torn down
    /// regardless. Consuming `self` makes a second disconnect impossible.
    pub async fn disconnect(mut self) {
        if self.inventory_state() != InventoryState::Idle {
            if let Err(error) = self.stop_inventory(self.options.stop_timeout).await {
                warn!(%error, "stop during disconnect failed");
            }
        }
        self.session.close().await;
    }
}
