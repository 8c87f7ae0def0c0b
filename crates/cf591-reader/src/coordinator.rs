//! Scoped pausing of inventory around operations that need quiet RF.
//!
//! Tag memory access and Q-value queries misbehave while continuous
//! inventory is active, so they must run with the front-end quiesced.
//! [`Reader::with_inventory_paused`] is the one place that choreography
//! lives: capture whether inventory is running, stop if so, run the
//! operation, and restore the prior state on every exit path, success or
//! error.
//!
//! Both the pause and the resume are best-effort. The pause exists to quiet
//! the RF front-end, not to guarantee exclusivity, and the resume must never
//! turn a successful operation into a failure. Failures on either edge are
//! logged and swallowed; only the wrapped operation's own result propagates.

use cf591_core::Result;
use cf591_driver::Driver;
use tracing::warn;

use crate::inventory::InventoryState;
use crate::reader::Reader;

impl<D: Driver> Reader<D> {
    /// Run `op` with inventory paused, restoring the prior state afterwards.
    ///
    /// If inventory was running it is stopped before `op` and restarted
    /// (retry-wrapped) after `op`, whether `op` succeeded or not. State
    /// mutation goes through the controller's own start/stop entry points;
    /// this method only reads the state to decide what to restore.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use cf591_reader::Reader;
    /// # use cf591_driver::{mock::MockDriver, Command};
    /// # async fn example(reader: &mut Reader<MockDriver>) -> cf591_core::Result<()> {
    /// let q = reader
    ///     .with_inventory_paused(async |r| {
    ///         r.invoke_raw(Command::GetQValue, &[]).await?.success()
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_inventory_paused<T, F>(&mut self, op: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Self) -> Result<T>,
    {
        let was_running = self.inventory_state() == InventoryState::Running;

        if was_running
            && let Err(error) = self.stop_inventory(self.options.stop_timeout).await
        {
            warn!(%error, "pause stop failed, proceeding with RF possibly active");
        }

        let result = op(self).await;

        if was_running
            && let Err(error) = self.ensure_inventory().await
        {
            warn!(%error, "inventory resume failed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderOptions;
    use cf591_core::Error;
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

    #[tokio::test]
    async fn pauses_and_resumes_around_the_operation() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        let observed = reader
            .with_inventory_paused(async |r| Ok(r.inventory_state()))
            .await
            .unwrap();

        assert_eq!(observed, InventoryState::Idle);
        assert_eq!(reader.inventory_state(), InventoryState::Running);
        assert_eq!(handle.count(Command::StopInventory), 1);
        assert_eq!(handle.count(Command::StartInventory), 2);
    }

    #[tokio::test]
    async fn resumes_even_when_the_operation_fails() {
        let (mut reader, _handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        let result: Result<()> = reader
            .with_inventory_paused(async |_r| Err(Error::command("ReadMemory", 0xFFFF_FF08)))
            .await;

        assert_eq!(result.unwrap_err().status(), Some(0xFFFF_FF08));
        assert_eq!(reader.inventory_state(), InventoryState::Running);
    }

    #[tokio::test]
    async fn idle_reader_is_not_restarted() {
        let (mut reader, handle) = connected().await;

        let ran = reader
            .with_inventory_paused(async |_r| Ok(true))
            .await
            .unwrap();

        assert!(ran);
        assert_eq!(reader.inventory_state(), InventoryState::Idle);
        assert_eq!(handle.count(Command::StartInventory), 0);
        assert_eq!(handle.count(Command::StopInventory), 0);
    }

    #[tokio::test]
    async fn operation_runs_exactly_once_despite_pause_failure() {
        let (mut reader, handle) = connected().await;
        reader.start_inventory(0, 0).await.unwrap();

        // The pause stop faults; the operation must still run exactly once.
        handle.push(
            Command::StopInventory,
            Scripted::status(code::MODULE_INTERNAL),
        );

        let mut runs = 0;
        reader
            .with_inventory_paused(async |_r| {
                runs += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(runs, 1);
    }
}
