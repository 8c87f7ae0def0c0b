//! Suppression of repeated reports for the same physical tag.
//!
//! During continuous inventory a tag sitting in the field is reported many
//! times per second. [`Debounce`] turns that raw stream into one acceptance
//! per tag per window: a detection passes if its EPC has never been seen, or
//! if more than the configured window has elapsed since the last accepted
//! detection of that EPC.
//!
//! The filter does no I/O and takes the current instant as an argument, so
//! it can be tested without a clock.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use cf591_core::debounce::Debounce;
//!
//! let mut debounce = Debounce::new(Duration::from_millis(1000));
//! let now = Instant::now();
//!
//! assert!(debounce.accept_id(b"E200AB", now));
//! assert!(!debounce.accept_id(b"E200AB", now + Duration::from_millis(500)));
//! assert!(debounce.accept_id(b"E200AB", now + Duration::from_millis(1500)));
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::tag::TagDetection;

/// Per-tag acceptance filter with a fixed time window.
///
/// The window has no hidden default; callers state it explicitly. A window of
/// 1000 ms is a sensible starting point for human-paced presentation of
/// tags. State grows with the number of distinct EPCs; for long-running
/// monitors an entry cap with oldest-first eviction can be enabled with
/// [`with_max_entries`](Self::with_max_entries).
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    max_entries: Option<usize>,
    last_accepted: HashMap<Vec<u8>, Instant>,
}

impl Debounce {
    /// Create a filter with the given window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            max_entries: None,
            last_accepted: HashMap::new(),
        }
    }

    /// Cap the number of tracked EPCs, evicting the oldest entry when full.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether a detection should be delivered.
    ///
    /// On acceptance the record for the EPC is updated to `now`; rejected
    /// detections leave the record untouched, so a tag held in the field is
    /// reported once per window, not once per window after it leaves.
    pub fn accept(&mut self, detection: &TagDetection, now: Instant) -> bool {
        self.accept_id(&detection.epc, now)
    }

    /// [`accept`](Self::accept) keyed directly by identifier bytes.
    pub fn accept_id(&mut self, id: &[u8], now: Instant) -> bool {
        if let Some(&last) = self.last_accepted.get(id)
            && now.saturating_duration_since(last) <= self.window
        {
            return false;
        }

        self.last_accepted.insert(id.to_vec(), now);
        self.enforce_cap();
        true
    }

    /// Number of distinct EPCs currently tracked.
    pub fn len(&self) -> usize {
        self.last_accepted.len()
    }

    /// True if no EPC has been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.last_accepted.is_empty()
    }

    /// Forget all records, so every tag is fresh again.
    pub fn clear(&mut self) {
        self.last_accepted.clear();
    }

    fn enforce_cap(&mut self) {
        let Some(cap) = self.max_entries else {
            return;
        };
        while self.last_accepted.len() > cap {
            let oldest = self
                .last_accepted
                .iter()
                .min_by_key(|&(_, &at)| at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.last_accepted.remove(&id);
                }
                None => break,
            }
        }
    }
}
