//! The device driver trait.
//!
//! The vendor library is an opaque collaborator: it owns the wire protocol
//! and the air interface, and exposes a handle-based session with one entry
//! point per command. This module captures exactly that contract so the
//! controller can be written and tested against it without the vendor
//! binary. The driver must be fully initialized (library loaded, function
//! table resolved) before [`Driver::open`] is called.
//!
//! Methods are declared as `impl Future + Send` so sessions can be moved
//! onto background tasks; implementations simply write `async fn` (Edition
//! 2024 RPITIT). Implementations that wrap blocking foreign calls are
//! expected to hop onto a blocking thread internally. There is no
//! cancellation primitive at this boundary; every wait is bounded by the
//! timeout the command carries.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use cf591_core::{Result, StatusOutcome, classify};

use crate::command::Command;

/// Opaque handle to an open driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub i64);

/// Where the device is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Serial attachment through a character device.
    Serial {
        /// Device path, e.g. `/dev/ttyUSB0`.
        path: String,
        /// Baud rate, typically 115200.
        baud: u32,
    },

    /// Network attachment to the reader's TCP command port.
    Network {
        /// Host name or IP address.
        host: String,
        /// TCP port, typically 4001.
        port: u16,
    },
}

impl Endpoint {
    /// Serial endpoint with the common 115200 baud default.
    pub fn serial(path: impl Into<String>) -> Self {
        Self::Serial {
            path: path.into(),
            baud: 115_200,
        }
    }

    /// Serial endpoint with an explicit baud rate.
    pub fn serial_with_baud(path: impl Into<String>, baud: u32) -> Self {
        Self::Serial {
            path: path.into(),
            baud,
        }
    }

    /// Network endpoint.
    pub fn network(host: impl Into<String>, port: u16) -> Self {
        Self::Network {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, baud } => write!(f, "{path}@{baud}"),
            Self::Network { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Raw result of one driver invocation.
///
/// The status word is kept in the signed form the binding layer produced it
/// in; [`RawReply::outcome`] performs the unsigned masking and table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    /// Raw status word, possibly sign-extended.
    pub status: i32,

    /// Output payload, empty for commands without one.
    pub payload: Vec<u8>,
}

impl RawReply {
    /// Successful reply with a payload.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 0,
            payload: payload.into(),
        }
    }

    /// Reply carrying only a status code, surfaced in signed form.
    pub fn status(code: u32) -> Self {
        Self {
            status: code as i32,
            payload: Vec::new(),
        }
    }

    /// Classify the raw status word.
    pub fn outcome(&self) -> StatusOutcome {
        classify(self.status)
    }
}

/// Handle-based session contract of the vendor driver.
///
/// Implementations: the FFI wrapper around the vendor shared library in
/// deployments, [`MockDriver`](crate::mock::MockDriver) everywhere else.
pub trait Driver: Send {
    /// Open a session to the device at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](cf591_core::Error::Connection) if the
    /// port cannot be opened or the device does not answer within `timeout`.
    /// Fresh power-up and USB re-enumeration are known to fail transiently;
    /// callers wrap this in a retry policy.
    fn open(
        &mut self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> impl Future<Output = Result<DeviceHandle>> + Send;

    /// Close a session.
    ///
    /// Must tolerate stale handles; the physical link may already be gone.
    fn close(&mut self, handle: DeviceHandle) -> impl Future<Output = ()> + Send;

    /// Execute one command and return the raw status word plus any output
    /// payload.
    ///
    /// This is the single funnel every command goes through, which gives the
    /// session layer exactly one interception point for status
    /// classification.
    fn invoke(
        &mut self,
        handle: DeviceHandle,
        command: Command,
        args: &[u8],
    ) -> impl Future<Output = RawReply> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::serial("/dev/ttyUSB0").to_string(), "/dev/ttyUSB0@115200");
        assert_eq!(
            Endpoint::network("192.168.1.190", 4001).to_string(),
            "192.168.1.190:4001"
        );
    }

    #[test]
    fn raw_reply_outcome_masks_signed_status() {
        let reply = RawReply::status(0xFFFF_FF12);
        assert!(reply.status < 0, "status should be surfaced sign-extended");
        assert_eq!(reply.outcome(), StatusOutcome::Timeout);
    }

    #[test]
    fn ok_reply_is_success() {
        let reply = RawReply::ok(vec![1, 2, 3]);
        assert_eq!(reply.outcome(), StatusOutcome::Success);
        assert_eq!(reply.payload, vec![1, 2, 3]);
    }
}
