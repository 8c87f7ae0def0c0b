//! Decoded tag observations.
//!
//! A [`TagDetection`] is produced by decoding the payload of one successful
//! poll. Applications never construct detections themselves; they receive
//! them from the inventory controller and read the fields.

use bytes::Buf;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Fixed leading portion of a tag report payload, before the EPC bytes.
const REPORT_HEADER_LEN: usize = 2 + 2 + 1 + 1 + 2 + 2 + 1;

/// One decoded tag observation.
///
/// Immutable once constructed. The signal strength is converted from the
/// device's native tenths of a dBm to float dBm at this boundary, so
/// `rssi_dbm` is always directly comparable and printable.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct TagDetection {
    /// EPC identifier bytes (typically 12 bytes).
    pub epc: Vec<u8>,

    /// Signal strength in dBm.
    pub rssi_dbm: f32,

    /// Antenna that heard the tag (1-based).
    pub antenna: u8,

    /// Frequency channel the tag answered on.
    pub channel: u8,

    /// Protocol-control bytes from the tag reply.
    pub pc: [u8; 2],

    /// CRC bytes from the tag reply.
    pub crc: [u8; 2],

    /// Sequence number assigned by the device for the current inventory.
    pub sequence: u16,

    /// Host receive time of the report.
    pub seen_at: DateTime<Utc>,
}

impl TagDetection {
    /// Decode a detection from a raw poll payload.
    ///
    /// Layout: sequence (u16 LE), RSSI in 0.1 dBm (i16 LE), antenna, channel,
    /// CRC (2 bytes), PC (2 bytes), EPC length, EPC bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Payload`] if the payload is shorter than its header
    /// or than the EPC length it announces.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        if buf.remaining() < REPORT_HEADER_LEN {
            return Err(Error::payload(
                "tag report",
                format!("{} bytes, need at least {REPORT_HEADER_LEN}", buf.remaining()),
            ));
        }

        let sequence = buf.get_u16_le();
        let rssi_raw = buf.get_i16_le();
        let antenna = buf.get_u8();
        let channel = buf.get_u8();
        let mut crc = [0u8; 2];
        buf.copy_to_slice(&mut crc);
        let mut pc = [0u8; 2];
        buf.copy_to_slice(&mut pc);
        let epc_len = usize::from(buf.get_u8());

        if buf.remaining() < epc_len {
            return Err(Error::payload(
                "tag report",
                format!("EPC length {epc_len} exceeds {} remaining bytes", buf.remaining()),
            ));
        }
        let epc = buf.copy_to_bytes(epc_len).to_vec();

        Ok(Self {
            epc,
            rssi_dbm: f32::from(rssi_raw) / 10.0,
            antenna,
            channel,
            pc,
            crc,
            sequence,
            seen_at: Utc::now(),
        })
    }

    /// EPC as an uppercase hex string.
    pub fn epc_hex(&self) -> String {
        self.epc.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// EPC length in bytes.
    pub fn epc_len(&self) -> usize {
        self.epc.len()
    }
}

impl std::fmt::Display for TagDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.1} dBm, ant {}, ch {})",
            self.epc_hex(),
            self.rssi_dbm,
            self.antenna,
            self.channel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(epc: &[u8], rssi_raw: i16, antenna: u8, channel: u8, sequence: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&sequence.to_le_bytes());
        payload.extend_from_slice(&rssi_raw.to_le_bytes());
        payload.push(antenna);
        payload.push(channel);
        payload.extend_from_slice(&[0x12, 0x34]); // crc
        payload.extend_from_slice(&[0x30, 0x00]); // pc
        payload.push(epc.len() as u8);
        payload.extend_from_slice(epc);
        payload
    }

    #[test]
    fn decode_converts_rssi_to_dbm() {
        let payload = report(&[0xAB, 0xCD], -450, 1, 7, 3);
        let detection = TagDetection::decode(&payload).unwrap();

        assert_eq!(detection.epc_hex(), "ABCD");
        assert_eq!(detection.rssi_dbm, -45.0);
        assert_eq!(detection.antenna, 1);
        assert_eq!(detection.channel, 7);
        assert_eq!(detection.sequence, 3);
        assert_eq!(detection.crc, [0x12, 0x34]);
        assert_eq!(detection.pc, [0x30, 0x00]);
        assert_eq!(detection.epc_len(), 2);
    }

    #[test]
    fn decode_full_length_epc() {
        let epc: Vec<u8> = (0u8..12).collect();
        let detection = TagDetection::decode(&report(&epc, -321, 2, 12, 99)).unwrap();
        assert_eq!(detection.epc, epc);
        assert_eq!(detection.rssi_dbm, -32.1);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let result = TagDetection::decode(&[0x01, 0x00, 0x3E]);
        assert!(matches!(result, Err(Error::Payload { .. })));
    }

    #[test]
    fn decode_rejects_short_epc() {
        let mut payload = report(&[0xAA, 0xBB], -100, 1, 1, 1);
        let announced = payload.len() - REPORT_HEADER_LEN;
        payload[REPORT_HEADER_LEN - 1] = (announced + 1) as u8;
        assert!(TagDetection::decode(&payload).is_err());
    }

    #[test]
    fn display_is_compact() {
        let detection = TagDetection::decode(&report(&[0xDE, 0xAD], -450, 1, 5, 1)).unwrap();
        assert_eq!(detection.to_string(), "DEAD (-45.0 dBm, ant 1, ch 5)");
    }
}
