//! Transport session over the device driver.
//!
//! A [`Session`] owns the driver and its open handle and funnels every
//! command through [`Session::invoke`], which is the single point where raw
//! status words are classified into [`StatusOutcome`] values. Layers above
//! never see a raw status code except inside an error.

use std::time::Duration;

use cf591_core::status::code;
use cf591_core::{Error, Result, StatusOutcome};
use cf591_driver::{Command, DeviceHandle, Driver, Endpoint};
use tracing::{debug, trace};

use crate::retry::RetryPolicy;

/// Encode a wait window as the u16 millisecond argument the command set
/// expects, saturating at the field width.
pub(crate) fn timeout_ms_arg(timeout: Duration) -> [u8; 2] {
    let ms = timeout.as_millis().min(u128::from(u16::MAX)) as u16;
    ms.to_le_bytes()
}

/// Classified result of one invocation.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Command this reply answers.
    pub command: Command,

    /// Classified outcome of the raw status word.
    pub outcome: StatusOutcome,

    /// Output payload, empty for commands without one.
    pub payload: Vec<u8>,
}

impl Reply {
    /// Require a successful outcome and return the payload.
    ///
    /// For commands where "nothing arrived" is not a valid answer, the
    /// recoverable outcomes are faults too; they are surfaced with their
    /// underlying status code.
    pub fn success(self) -> Result<Vec<u8>> {
        let status = match self.outcome {
            StatusOutcome::Success => return Ok(self.payload),
            StatusOutcome::Timeout => code::COMM_TIMEOUT,
            StatusOutcome::EmptyOrStopped => code::INVENTORY_STOPPED,
            StatusOutcome::Fault(status) => status,
        };
        Err(Error::command(self.command.name(), status))
    }
}

/// One open connection to a device.
#[derive(Debug)]
pub struct Session<D: Driver> {
    driver: D,
    endpoint: Endpoint,
    handle: Option<DeviceHandle>,
}

impl<D: Driver> Session<D> {
    /// Open a session, retrying per `retry`.
    ///
    /// # Errors
    ///
    /// Returns the last [`Error::Connection`] once the retry schedule is
    /// exhausted.
    pub async fn open(
        mut driver: D,
        endpoint: Endpoint,
        timeout: Duration,
        retry: &RetryPolicy,
    ) -> Result<Self> {
        let handle = retry
            .run("device open", async || driver.open(&endpoint, timeout).await)
            .await?;
        debug!(%endpoint, "session open");

        Ok(Self {
            driver,
            endpoint,
            handle: Some(handle),
        })
    }

    /// The endpoint this session is attached to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// True while the driver handle is open.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOpen`] if the session has been closed. Device
    /// faults are not errors at this layer; they come back as
    /// [`StatusOutcome::Fault`] inside the [`Reply`].
    pub async fn invoke(&mut self, command: Command, args: &[u8]) -> Result<Reply> {
        let Some(handle) = self.handle else {
            return Err(Error::NotOpen);
        };

        let raw = self.driver.invoke(handle, command, args).await;
        let outcome = raw.outcome();
        trace!(%command, ?outcome, "invoke");

        Ok(Reply {
            command,
            outcome,
            payload: raw.payload,
        })
    }

    /// Close the session. Idempotent; never fails.
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.driver.close(handle).await;
            debug!(endpoint = %self.endpoint, "session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf591_driver::mock::MockDriver;

    const OPEN_TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test]
    async fn invoke_classifies_at_the_boundary() {
        let (driver, handle) = MockDriver::new();
        let mut session = Session::open(
            driver,
            Endpoint::serial("/dev/ttyUSB0"),
            OPEN_TIMEOUT,
            &RetryPolicy::none(),
        )
        .await
        .unwrap();

        handle.push_tag(&[0xAA, 0xBB], -300, 1, 4);
        let reply = session
            .invoke(Command::PollTag, &timeout_ms_arg(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(reply.outcome, StatusOutcome::Success);
    }

    #[tokio::test]
    async fn invoke_after_close_is_not_open() {
        let (driver, _handle) = MockDriver::new();
        let mut session = Session::open(
            driver,
            Endpoint::serial("/dev/ttyUSB0"),
            OPEN_TIMEOUT,
            &RetryPolicy::none(),
        )
        .await
        .unwrap();

        session.close().await;
        assert!(!session.is_open());

        let result = session.invoke(Command::GetPower, &[]).await;
        assert!(matches!(result, Err(Error::NotOpen)));

        // Double close is a no-op.
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn open_retries_transient_failures() {
        let (driver, handle) = MockDriver::new();
        handle.fail_opens(2);

        let session = Session::open(
            driver,
            Endpoint::serial("/dev/ttyUSB0"),
            OPEN_TIMEOUT,
            &RetryPolicy::CONNECT,
        )
        .await
        .unwrap();

        assert!(session.is_open());
        assert_eq!(handle.opens(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn open_gives_up_after_schedule() {
        let (driver, handle) = MockDriver::new();
        handle.fail_opens(10);

        let result = Session::open(
            driver,
            Endpoint::serial("/dev/ttyUSB0"),
            OPEN_TIMEOUT,
            &RetryPolicy::new(3, Duration::from_millis(100), 1.5),
        )
        .await;

        assert!(matches!(result, Err(Error::Connection { .. })));
        assert_eq!(handle.opens(), 3);
    }

    #[test]
    fn reply_success_surfaces_recoverable_as_status() {
        let reply = Reply {
            command: Command::SetPower,
            outcome: StatusOutcome::Timeout,
            payload: Vec::new(),
        };
        let error = reply.success().unwrap_err();
        assert_eq!(error.status(), Some(code::COMM_TIMEOUT));
    }

    #[test]
    fn timeout_arg_saturates() {
        assert_eq!(timeout_ms_arg(Duration::from_millis(500)), [0xF4, 0x01]);
        assert_eq!(timeout_ms_arg(Duration::from_secs(600)), [0xFF, 0xFF]);
    }
}
