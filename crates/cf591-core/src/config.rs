//! Device parameter block handling.
//!
//! The reader stores its working parameters in one fixed-layout record. The
//! wire protocol only supports reading and writing the record as a whole, so
//! changing a single field is always a read-modify-write: fetch a fresh
//! [`DeviceConfig`] snapshot, apply a [`ConfigPatch`], write the whole block
//! back.
//!
//! # Examples
//!
//! ```
//! use cf591_core::config::{ConfigPatch, DeviceConfig};
//!
//! let mut snapshot = DeviceConfig::decode(&[0u8; DeviceConfig::WIRE_LEN]).unwrap();
//! let patch = ConfigPatch::new().rf_power(20).q_value(0).session(0);
//! assert!(!patch.is_empty());
//!
//! patch.apply(&mut snapshot);
//! assert_eq!(snapshot.rf_power, 20);
//! assert_eq!(snapshot.q_value, 0);
//! ```

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Region, WorkMode};

/// Snapshot of the device parameter block.
///
/// Fields mirror the wire record one to one; values that this crate does not
/// interpret (interface selector, Wiegand framing, frequency plan) are kept
/// as raw bytes so a read-modify-write never loses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Bus address of the device.
    pub device_address: u8,
    /// Air-interface protocol selector.
    pub protocol: u8,
    /// Work mode, see [`WorkMode`].
    pub work_mode: u8,
    /// Host interface selector.
    pub interface: u8,
    /// Serial baud-rate selector.
    pub baud_rate: u8,
    /// Wiegand output framing.
    pub wiegand: u8,
    /// Antenna enable mask (bit 0 is antenna 1).
    pub antenna_mask: u8,
    /// Regulatory region, see [`Region`].
    pub region: u8,
    /// Start frequency, hopping upward.
    pub start_freq_up: u16,
    /// Start frequency, hopping downward.
    pub start_freq_down: u16,
    /// Frequency step.
    pub step_freq: u16,
    /// Number of frequency channels.
    pub channel_count: u8,
    /// RF output power in dBm.
    pub rf_power: u8,
    /// Memory area reported during inventory.
    pub inventory_area: u8,
    /// Anti-collision Q value.
    pub q_value: u8,
    /// Gen2 session flag.
    pub session: u8,
    /// Access operation start address.
    pub access_address: u8,
    /// Access operation data length.
    pub access_data_len: u8,
    /// Duplicate-filter window timer.
    pub filter_time: u8,
    /// External trigger hold timer.
    pub trigger_time: u8,
    /// Buzzer pulse timer.
    pub buzzer_time: u8,
    /// Heartbeat interval timer.
    pub heartbeat_time: u8,
}

impl DeviceConfig {
    /// Byte length of the parameter block on the wire.
    pub const WIRE_LEN: usize = 25;

    /// Decode a parameter block payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the payload is shorter than
    /// [`Self::WIRE_LEN`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::WIRE_LEN {
            return Err(Error::payload(
                "device parameters",
                format!("{} bytes, need {}", payload.len(), Self::WIRE_LEN),
            ));
        }

        let mut buf = payload;
        Ok(Self {
            device_address: buf.get_u8(),
            protocol: buf.get_u8(),
            work_mode: buf.get_u8(),
            interface: buf.get_u8(),
            baud_rate: buf.get_u8(),
            wiegand: buf.get_u8(),
            antenna_mask: buf.get_u8(),
            region: buf.get_u8(),
            start_freq_up: buf.get_u16(),
            start_freq_down: buf.get_u16(),
            step_freq: buf.get_u16(),
            channel_count: buf.get_u8(),
            rf_power: buf.get_u8(),
            inventory_area: buf.get_u8(),
            q_value: buf.get_u8(),
            session: buf.get_u8(),
            access_address: buf.get_u8(),
            access_data_len: buf.get_u8(),
            filter_time: buf.get_u8(),
            trigger_time: buf.get_u8(),
            buzzer_time: buf.get_u8(),
            heartbeat_time: buf.get_u8(),
        })
    }

    /// Encode the block for a whole-record write.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::WIRE_LEN);
        buf.put_u8(self.device_address);
        buf.put_u8(self.protocol);
        buf.put_u8(self.work_mode);
        buf.put_u8(self.interface);
        buf.put_u8(self.baud_rate);
        buf.put_u8(self.wiegand);
        buf.put_u8(self.antenna_mask);
        buf.put_u8(self.region);
        buf.put_u16(self.start_freq_up);
        buf.put_u16(self.start_freq_down);
        buf.put_u16(self.step_freq);
        buf.put_u8(self.channel_count);
        buf.put_u8(self.rf_power);
        buf.put_u8(self.inventory_area);
        buf.put_u8(self.q_value);
        buf.put_u8(self.session);
        buf.put_u8(self.access_address);
        buf.put_u8(self.access_data_len);
        buf.put_u8(self.filter_time);
        buf.put_u8(self.trigger_time);
        buf.put_u8(self.buzzer_time);
        buf.put_u8(self.heartbeat_time);
        buf
    }

    /// Work mode as a typed value, if the raw byte is known.
    pub fn work_mode(&self) -> Option<WorkMode> {
        WorkMode::from_u8(self.work_mode)
    }

    /// Region as a typed value, if the raw byte is known.
    pub fn region(&self) -> Option<Region> {
        Region::from_u8(self.region)
    }
}

/// Named optional updates merged into a [`DeviceConfig`] snapshot.
///
/// Only the fields that are set are written; everything else keeps the value
/// from the fetched snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub work_mode: Option<WorkMode>,
    pub rf_power: Option<u8>,
    pub antenna_mask: Option<u8>,
    pub region: Option<Region>,
    pub q_value: Option<u8>,
    pub session: Option<u8>,
    pub filter_time: Option<u8>,
    pub trigger_time: Option<u8>,
    pub buzzer_time: Option<u8>,
}

impl ConfigPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the work mode.
    pub fn work_mode(mut self, mode: WorkMode) -> Self {
        self.work_mode = Some(mode);
        self
    }

    /// Set the RF output power in dBm.
    pub fn rf_power(mut self, dbm: u8) -> Self {
        self.rf_power = Some(dbm);
        self
    }

    /// Set the antenna enable mask.
    pub fn antenna_mask(mut self, mask: u8) -> Self {
        self.antenna_mask = Some(mask);
        self
    }

    /// Set the regulatory region.
    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Set the anti-collision Q value.
    pub fn q_value(mut self, q: u8) -> Self {
        self.q_value = Some(q);
        self
    }

    /// Set the Gen2 session flag.
    pub fn session(mut self, session: u8) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the duplicate-filter window timer.
    pub fn filter_time(mut self, value: u8) -> Self {
        self.filter_time = Some(value);
        self
    }

    /// Set the external trigger hold timer.
    pub fn trigger_time(mut self, value: u8) -> Self {
        self.trigger_time = Some(value);
        self
    }

    /// Set the buzzer pulse timer.
    pub fn buzzer_time(mut self, value: u8) -> Self {
        self.buzzer_time = Some(value);
        self
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the set fields into a snapshot.
    pub fn apply(&self, config: &mut DeviceConfig) {
        if let Some(mode) = self.work_mode {
            config.work_mode = mode.as_u8();
        }
        if let Some(power) = self.rf_power {
            config.rf_power = power;
        }
        if let Some(mask) = self.antenna_mask {
            config.antenna_mask = mask;
        }
        if let Some(region) = self.region {
            config.region = region.as_u8();
        }
        if let Some(q) = self.q_value {
            config.q_value = q;
        }
        if let Some(session) = self.session {
            config.session = session;
        }
        if let Some(value) = self.filter_time {
            config.filter_time = value;
        }
        if let Some(value) = self.trigger_time {
            config.trigger_time = value;
        }
        if let Some(value) = self.buzzer_time {
            config.buzzer_time = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceConfig {
        let mut payload = vec![0u8; DeviceConfig::WIRE_LEN];
        payload[0] = 0x01; // device address
        payload[2] = 0x00; // work mode: command
        payload[6] = 0x01; // antenna 1
        payload[7] = 0x02; // region: ETSI
        payload[8] = 0x21; // start freq up, high byte
        payload[9] = 0xCA;
        payload[15] = 26; // rf power
        payload[17] = 4; // q value
        payload[23] = 10; // buzzer time
        DeviceConfig::decode(&payload).unwrap()
    }

    #[test]
    fn decode_encode_round_trip() {
        let config = sample();
        let encoded = config.encode();
        assert_eq!(encoded.len(), DeviceConfig::WIRE_LEN);
        assert_eq!(DeviceConfig::decode(&encoded).unwrap(), config);
    }

    #[test]
    fn decode_rejects_short_payload() {
        let result = DeviceConfig::decode(&[0u8; DeviceConfig::WIRE_LEN - 1]);
        assert!(matches!(result, Err(Error::Payload { .. })));
    }

    #[test]
    fn typed_accessors() {
        let config = sample();
        assert_eq!(config.work_mode(), Some(WorkMode::Command));
        assert_eq!(config.region(), Some(Region::Etsi));
        assert_eq!(config.start_freq_up, 0x21CA);
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let mut config = sample();
        let before = config.clone();

        ConfigPatch::new().q_value(0).session(0).apply(&mut config);

        assert_eq!(config.q_value, 0);
        assert_eq!(config.session, 0);
        assert_eq!(config.rf_power, before.rf_power);
        assert_eq!(config.antenna_mask, before.antenna_mask);
        assert_eq!(config.buzzer_time, before.buzzer_time);
    }

    #[test]
    fn empty_patch_is_identity() {
        let mut config = sample();
        let before = config.clone();
        let patch = ConfigPatch::new();

        assert!(patch.is_empty());
        patch.apply(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn patch_serializes() {
        let patch = ConfigPatch::new().rf_power(20).work_mode(WorkMode::Trigger);
        let json = serde_json::to_string(&patch).unwrap();
        let back: ConfigPatch = serde_json::from_str(&json).unwrap();
        assert_eq!(patch, back);
    }
}
