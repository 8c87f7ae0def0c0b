//! Core vocabulary for the CF591 UHF RFID reader stack.
//!
//! This crate holds everything the host-side controller needs that does not
//! touch a device: the error taxonomy, classification of raw vendor status
//! codes, decoded tag detections, the device parameter block, the semantic
//! range-to-power mapping, and the per-tag debounce filter.
//!
//! Nothing here performs I/O or depends on an async runtime, which keeps all
//! of it trivially unit-testable. The driver boundary lives in
//! `cf591-driver` and the controller itself in `cf591-reader`.
//!
//! # Status classification
//!
//! The single most load-bearing piece is [`status::classify`]: it normalizes
//! the vendor's signed/unsigned 32-bit status words into a
//! [`StatusOutcome`], and it is the only place that decides which codes mean
//! "no tag yet" rather than "failure". Every layer above branches on the
//! outcome, never on raw codes.

pub mod config;
pub mod debounce;
pub mod error;
pub mod power;
pub mod status;
pub mod tag;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{ConfigPatch, DeviceConfig};
pub use debounce::Debounce;
pub use error::{Error, Result};
pub use power::{PowerCap, ReadRange, range_to_power};
pub use status::{StatusOutcome, classify};
pub use tag::TagDetection;
pub use types::{DeviceIdentity, LockAction, LockArea, MemoryBank, Region, WorkMode};
