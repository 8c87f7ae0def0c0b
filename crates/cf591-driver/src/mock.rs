//! Scriptable mock driver for testing and development.
//!
//! [`MockDriver`] implements the [`Driver`] contract against an in-memory
//! script instead of hardware. The paired [`MockDriverHandle`] queues replies
//! per command and exposes the full call log, so tests can both stage device
//! behavior (timeouts, faults, tag reports) and assert on the command
//! sequence the controller produced.
//!
//! Timing is honest: an unscripted or timeout-classified poll sleeps for the
//! requested wait window through `tokio::time`, so `start_paused` tests see
//! realistic deadlines without real delays. Status codes are surfaced in
//! sign-extended form, the same way the vendor binding does it.
//!
//! # Examples
//!
//! ```
//! use cf591_driver::mock::MockDriver;
//! use cf591_driver::{Command, Driver, Endpoint};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut driver, handle) = MockDriver::new();
//! handle.push_tag(&[0xAB, 0xCD], -450, 1, 7);
//!
//! let session = driver
//!     .open(&Endpoint::serial("/dev/ttyUSB0"), Duration::from_secs(1))
//!     .await
//!     .unwrap();
//! let reply = driver
//!     .invoke(session, Command::PollTag, &500u16.to_le_bytes())
//!     .await;
//! assert!(reply.outcome().is_success());
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cf591_core::status::code;
use cf591_core::{DeviceConfig, Error, Result};
use tracing::trace;

use crate::command::Command;
use crate::driver::{DeviceHandle, Driver, Endpoint, RawReply};

/// One scripted reply for a command.
#[derive(Debug, Clone)]
pub struct Scripted {
    status: i32,
    payload: Vec<u8>,
    delay: Option<Duration>,
}

impl Scripted {
    /// Successful reply with a payload.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 0,
            payload: payload.into(),
            delay: None,
        }
    }

    /// Reply with only a status code, surfaced sign-extended.
    pub fn status(code: u32) -> Self {
        Self {
            status: code as i32,
            payload: Vec::new(),
            delay: None,
        }
    }

    /// Attach an explicit response latency.
    ///
    /// Without one, timeout-classified poll replies consume the caller's
    /// requested wait window and everything else returns immediately.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Successful poll reply carrying one encoded tag report.
    pub fn tag(epc: &[u8], rssi_tenth_dbm: i16, antenna: u8, channel: u8, sequence: u16) -> Self {
        Self::ok(tag_report(epc, rssi_tenth_dbm, antenna, channel, sequence))
    }
}

/// Encode a tag report payload the way the device does.
pub fn tag_report(epc: &[u8], rssi_tenth_dbm: i16, antenna: u8, channel: u8, sequence: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(11 + epc.len());
    payload.extend_from_slice(&sequence.to_le_bytes());
    payload.extend_from_slice(&rssi_tenth_dbm.to_le_bytes());
    payload.push(antenna);
    payload.push(channel);
    payload.extend_from_slice(&[0x00, 0x00]); // crc
    payload.extend_from_slice(&[0x30, 0x00]); // pc
    payload.push(epc.len() as u8);
    payload.extend_from_slice(epc);
    payload
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// The command that was invoked.
    pub command: Command,

    /// The raw argument bytes it was invoked with.
    pub args: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: HashMap<Command, VecDeque<Scripted>>,
    calls: Vec<CallRecord>,
    open_failures: u32,
    opens: u32,
    next_handle: i64,
    open_handle: Option<i64>,
}

/// Mock implementation of the vendor driver.
///
/// Created together with its [`MockDriverHandle`]; see the module docs.
#[derive(Debug)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Create a mock driver and its control handle.
    pub fn new() -> (Self, MockDriverHandle) {
        let state = Arc::new(Mutex::new(MockState {
            next_handle: 1,
            ..MockState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockDriverHandle { state },
        )
    }

    /// Default reply for a command with no scripted entry.
    fn default_reply(command: Command) -> Scripted {
        match command {
            Command::PollTag => Scripted::status(code::COMM_TIMEOUT),
            Command::GetPower => Scripted::ok(vec![26, 0]),
            Command::GetQValue => Scripted::ok(vec![4, 0]),
            Command::GetAntenna => Scripted::ok(vec![0x01]),
            Command::GetConfig => Scripted::ok(vec![0u8; DeviceConfig::WIRE_LEN]),
            Command::GetDeviceInfo => {
                let mut payload = vec![0u8; 32 + 32 + 12];
                payload[..4].copy_from_slice(b"mock");
                payload[32..36].copy_from_slice(b"mock");
                Scripted::ok(payload)
            }
            _ => Scripted::ok(Vec::new()),
        }
    }
}

impl Driver for MockDriver {
    async fn open(&mut self, endpoint: &Endpoint, _timeout: Duration) -> Result<DeviceHandle> {
        let handle = {
            let mut state = self.state.lock().expect("mock state poisoned");
            state.opens += 1;
            if state.open_failures > 0 {
                state.open_failures -= 1;
                None
            } else {
                let handle = state.next_handle;
                state.next_handle += 1;
                state.open_handle = Some(handle);
                Some(handle)
            }
        };

        handle
            .map(DeviceHandle)
            .ok_or_else(|| Error::connection(endpoint.to_string(), "scripted open failure"))
    }

    async fn close(&mut self, handle: DeviceHandle) {
        let mut state = self.state.lock().expect("mock state poisoned");
        if state.open_handle == Some(handle.0) {
            state.open_handle = None;
        }
    }

    async fn invoke(&mut self, handle: DeviceHandle, command: Command, args: &[u8]) -> RawReply {
        let scripted = {
            let mut state = self.state.lock().expect("mock state poisoned");
            state.calls.push(CallRecord {
                command,
                args: args.to_vec(),
            });

            if state.open_handle != Some(handle.0) {
                return RawReply::status(code::PORT_HANDLE);
            }

            state
                .scripts
                .get_mut(&command)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Self::default_reply(command))
        };

        // Replies that model "nothing arrived" consume the caller's wait
        // window unless the script pinned an explicit latency.
        let wait = scripted.delay.or_else(|| {
            (command == Command::PollTag && cf591_core::classify(scripted.status).is_recoverable())
                .then(|| requested_timeout(args))
        });
        if let Some(delay) = wait
            && !delay.is_zero()
        {
            tokio::time::sleep(delay).await;
        }
        trace!(%command, status = scripted.status, "mock reply");

        RawReply {
            status: scripted.status,
            payload: scripted.payload,
        }
    }
}

/// Requested wait window of a poll/stop command, from its argument bytes.
fn requested_timeout(args: &[u8]) -> Duration {
    match args {
        [low, high, ..] => Duration::from_millis(u64::from(u16::from_le_bytes([*low, *high]))),
        _ => Duration::ZERO,
    }
}

/// Control handle for a [`MockDriver`].
///
/// Clones share the same script and call log.
#[derive(Debug, Clone)]
pub struct MockDriverHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockDriverHandle {
    /// Queue a scripted reply for `command`.
    pub fn push(&self, command: Command, reply: Scripted) {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.scripts.entry(command).or_default().push_back(reply);
    }

    /// Queue a successful poll reply carrying one tag report.
    pub fn push_tag(&self, epc: &[u8], rssi_tenth_dbm: i16, antenna: u8, channel: u8) {
        let sequence = {
            let state = self.state.lock().expect("mock state poisoned");
            state
                .scripts
                .get(&Command::PollTag)
                .map_or(0, |queue| queue.len() as u16)
        };
        self.push(
            Command::PollTag,
            Scripted::tag(epc, rssi_tenth_dbm, antenna, channel, sequence + 1),
        );
    }

    /// Queue `count` timeout poll replies.
    pub fn push_poll_timeouts(&self, count: usize) {
        for _ in 0..count {
            self.push(Command::PollTag, Scripted::status(code::COMM_TIMEOUT));
        }
    }

    /// Make the next `count` open attempts fail.
    pub fn fail_opens(&self, count: u32) {
        self.state.lock().expect("mock state poisoned").open_failures = count;
    }

    /// Number of open attempts seen so far.
    pub fn opens(&self) -> u32 {
        self.state.lock().expect("mock state poisoned").opens
    }

    /// Full call log, in invocation order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().expect("mock state poisoned").calls.clone()
    }

    /// Command sequence of the call log.
    pub fn command_sequence(&self) -> Vec<Command> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .calls
            .iter()
            .map(|call| call.command)
            .collect()
    }

    /// Number of invocations of `command`.
    pub fn count(&self, command: Command) -> usize {
        self.state
            .lock()
            .expect("mock state poisoned")
            .calls
            .iter()
            .filter(|call| call.command == command)
            .count()
    }

    /// Forget the recorded calls, keeping any remaining script.
    pub fn clear_calls(&self) {
        self.state.lock().expect("mock state poisoned").calls.clear();
    }
}
