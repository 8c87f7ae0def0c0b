//! Host-side controller for the CF591 UHF RFID reader.
//!
//! This crate drives a reader through the `cf591-driver` boundary: it owns
//! the transport session, the inventory state machine, and every policy the
//! device needs around it (retry on transient failures, debounced delivery,
//! pause-and-resume around memory operations).
//!
//! # Architecture
//!
//! ```text
//! application
//!     │  read_single / read_many / stream / trigger_read / monitor
//!     ▼
//! ┌───────────────────────────────────────────────┐
//! │ Reader                                        │
//! │   inventory controller   Idle/Running/Stopping│
//! │   paused-op coordinator  memory + Q value     │
//! │   retry policies         open / power / start │
//! ├───────────────────────────────────────────────┤
//! │ Session                  one invoke() funnel  │
//! │   status classification  outcome, not codes   │
//! └───────────────────────────────────────────────┘
//!     │ Driver (vendor library or mock)
//!     ▼
//!   device
//! ```
//!
//! # Reading tags
//!
//! ```no_run
//! use cf591_driver::{mock::MockDriver, Endpoint};
//! use cf591_reader::{Reader, ReaderOptions};
//! use std::time::Duration;
//!
//! # async fn example() -> cf591_core::Result<()> {
//! let (driver, _control) = MockDriver::new();
//! let mut reader = Reader::connect(
//!     driver,
//!     Endpoint::serial("/dev/ttyUSB0"),
//!     ReaderOptions::default(),
//! )
//! .await?;
//!
//! if let Some(tag) = reader.read_single(Duration::from_secs(3)).await? {
//!     println!("{} at {:.1} dBm", tag.epc_hex(), tag.rssi_dbm);
//! }
//!
//! reader.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! A timeout without a tag is a `None` result, never an error; the
//! controller absorbs the driver's "no tag yet" statuses internally.
//!
//! # One inventory per session
//!
//! A `Reader` is a single logical session and all methods take `&mut self`;
//! at most one inventory is ever active per session. For concurrent
//! consumers, run the reader in a [`Monitor`] and fan detections out from
//! the callback.

pub mod coordinator;
pub mod device;
pub mod inventory;
pub mod monitor;
pub mod reader;
pub mod retry;
pub mod session;
pub mod stream;
pub mod trigger;

// Re-export commonly used types for convenience
pub use device::{MemoryRead, MemoryWrite};
pub use inventory::{InventoryState, ReadManyOptions};
pub use monitor::{Monitor, MonitorOptions};
pub use reader::{Reader, ReaderOptions};
pub use retry::RetryPolicy;
pub use session::{Reply, Session};
pub use stream::{StreamOptions, TagStream};
pub use trigger::{FlushOptions, TriggerOptions};

// The vocabulary types applications handle directly.
pub use cf591_core::{
    ConfigPatch, Debounce, DeviceConfig, DeviceIdentity, Error, PowerCap, ReadRange, Result,
    StatusOutcome, TagDetection,
};
