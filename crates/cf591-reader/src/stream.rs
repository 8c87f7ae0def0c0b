//! Pull-based detection stream.
//!
//! [`TagStream`] is the lazy counterpart to
//! [`read_many`](crate::Reader::read_many): the caller drives it one
//! detection at a time, and suspension happens at each poll boundary.
//! Cancellation is simply ceasing to pull.
//!
//! Unlike `read_single`/`read_many`, a stream does **not** stop inventory
//! when it ends or is dropped. Inventory persists so the next consumer (a
//! follow-up stream, a trigger read) can attach without restart churn; the
//! caller owns the final [`stop_inventory`](crate::Reader::stop_inventory).

use std::time::Duration;

use cf591_core::{Result, TagDetection};
use cf591_driver::Driver;

use crate::reader::Reader;

/// Tuning for [`Reader::stream`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Wait window per poll.
    pub poll_timeout: Duration,

    /// End the stream after this many consecutive empty polls; `None` keeps
    /// it alive through arbitrarily long quiet spells.
    pub max_consecutive_empty: Option<u32>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            max_consecutive_empty: Some(3),
        }
    }
}

/// Lazy sequence of tag detections borrowed from a reader.
#[derive(Debug)]
pub struct TagStream<'a, D: Driver> {
    reader: &'a mut Reader<D>,
    options: StreamOptions,
    consecutive_empty: u32,
    exhausted: bool,
}

impl<D: Driver> Reader<D> {
    /// Begin streaming detections.
    ///
    /// Ensures inventory is running (retry-wrapped start) and hands back a
    /// stream borrowing this reader. When the stream is done, inventory is
    /// **still running**; call [`stop_inventory`](Self::stop_inventory) when
    /// no more consumers are coming.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`](cf591_core::Error::Command) if inventory
    /// cannot be started.
    pub async fn stream(&mut self, options: StreamOptions) -> Result<TagStream<'_, D>> {
        self.ensure_inventory().await?;
        Ok(TagStream {
            reader: self,
            options,
            consecutive_empty: 0,
            exhausted: false,
        })
    }
}

impl<D: Driver> TagStream<'_, D> {
    /// Pull the next detection.
    ///
    /// Polls until a detection arrives or the consecutive-empty limit is
    /// reached; `Ok(None)` marks the end of the stream. Each restart of the
    /// count requires an actual detection, so a stream over an empty field
    /// ends after `max_consecutive_empty` polls.
    ///
    /// # Errors
    ///
    /// Device faults propagate and leave the stream usable; the caller
    /// decides whether to keep pulling.
    pub async fn next(&mut self) -> Result<Option<TagDetection>> {
        if self.exhausted {
            return Ok(None);
        }

        loop {
            match self.reader.poll(self.options.poll_timeout).await? {
                Some(detection) => {
                    self.consecutive_empty = 0;
                    return Ok(Some(detection));
                }
                None => {
                    self.consecutive_empty += 1;
                    if let Some(limit) = self.options.max_consecutive_empty
                        && self.consecutive_empty >= limit
                    {
                        self.exhausted = true;
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// True once the stream has ended.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InventoryState;
    use crate::reader::ReaderOptions;
    use cf591_driver::mock::{MockDriver, MockDriverHandle};
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

    fn options() -> StreamOptions {
        StreamOptions {
            poll_timeout: Duration::from_millis(10),
            max_consecutive_empty: Some(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_then_exhausts() {
        let (mut reader, handle) = connected().await;
        handle.push_tag(&[0x11, 0x22], -400, 1, 3);
        handle.push_tag(&[0x33, 0x44], -500, 1, 3);

        let mut stream = reader.stream(options()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().epc_hex(), "1122");
        assert_eq!(stream.next().await.unwrap().unwrap().epc_hex(), "3344");

        // Field is empty now; two empty polls end the stream.
        assert!(stream.next().await.unwrap().is_none());
        assert!(stream.is_exhausted());
        assert!(stream.next().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stream_does_not_auto_stop_inventory() {
        let (mut reader, handle) = connected().await;
        handle.push_tag(&[0xAA], -350, 1, 1);

        {
            let mut stream = reader.stream(options()).await.unwrap();
            while stream.next().await.unwrap().is_some() {}
        }

        assert_eq!(reader.inventory_state(), InventoryState::Running);
        assert_eq!(handle.count(Command::StopInventory), 0);

        reader.stop_inventory(Duration::from_secs(1)).await.unwrap();
        assert_eq!(handle.count(Command::StopInventory), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empties_between_detections_reset_the_limit() {
        let (mut reader, handle) = connected().await;
        handle.push_poll_timeouts(1);
        handle.push_tag(&[0xBB], -350, 1, 1);

        let mut stream = reader.stream(options()).await.unwrap();
        // One empty poll, then a detection; the empty count starts over.
        assert_eq!(stream.next().await.unwrap().unwrap().epc_hex(), "BB");
        assert!(!stream.is_exhausted());
    }
}
