//! Classification of raw device status codes.
//!
//! Every call into the vendor command set yields a 32-bit status word from a
//! fixed constant table (success is `0`, all fault and flow-control codes sit
//! in the `0xFFFFFF01..=0xFFFFFF18` range). Depending on the call path the
//! binding layer may surface these as signed or unsigned integers, so
//! [`classify`] first masks the value to unsigned 32 bits and then matches
//! against the table.
//!
//! The one rule everything above this module depends on: **absence of a tag
//! is not an error**. A communication timeout while waiting for a tag and an
//! inventory round that ended on its own both classify as recoverable
//! outcomes, never as faults.
//!
//! # Examples
//!
//! ```
//! use cf591_core::status::{classify, StatusOutcome};
//!
//! assert_eq!(classify(0), StatusOutcome::Success);
//!
//! // Codes may arrive sign-extended from the binding layer.
//! assert_eq!(classify(0xFFFFFF12u32 as i32), StatusOutcome::Timeout);
//! assert_eq!(classify(0xFFFFFF07u32 as i32), StatusOutcome::EmptyOrStopped);
//!
//! assert!(matches!(classify(0xFFFFFF06u32 as i32), StatusOutcome::Fault(_)));
//! ```

/// Raw status constants of the vendor command set.
pub mod code {
    /// Command completed successfully.
    pub const OK: u32 = 0x0000_0000;
    /// Handle invalid or serial port parameter error.
    pub const PORT_HANDLE: u32 = 0xFFFF_FF01;
    /// Serial port could not be opened.
    pub const PORT_OPEN_FAILED: u32 = 0xFFFF_FF02;
    /// Internal error inside the vendor library.
    pub const LIB_INTERNAL: u32 = 0xFFFF_FF03;
    /// Parameter value incorrect or out of range.
    pub const PARAM: u32 = 0xFFFF_FF04;
    /// Serial number already exists.
    pub const SERIAL_NUM_EXISTS: u32 = 0xFFFF_FF05;
    /// Command failed inside the reader module.
    pub const MODULE_INTERNAL: u32 = 0xFFFF_FF06;
    /// No tag found, or the inventory round completed on its own.
    pub const INVENTORY_STOPPED: u32 = 0xFFFF_FF07;
    /// Tag did not answer within the air-interface window.
    pub const TAG_NO_RESPONSE: u32 = 0xFFFF_FF08;
    /// Tag data could not be demodulated.
    pub const TAG_DECODE: u32 = 0xFFFF_FF09;
    /// Tag data exceeds the maximum transmission length.
    pub const CODE_OVERFLOW: u32 = 0xFFFF_FF0A;
    /// Authentication failed.
    pub const AUTH_FAILED: u32 = 0xFFFF_FF0B;
    /// Password error.
    pub const PASSWORD: u32 = 0xFFFF_FF0C;
    /// SAM card not responding.
    pub const SAM_NO_RESPONSE: u32 = 0xFFFF_FF0D;
    /// SAM card command failed.
    pub const SAM_COMMAND: u32 = 0xFFFF_FF0E;
    /// Response from the reader was malformed.
    pub const RESPONSE_FORMAT: u32 = 0xFFFF_FF0F;
    /// Command succeeded with more data pending.
    pub const MORE_DATA: u32 = 0xFFFF_FF10;
    /// Reader-side buffer overflow.
    pub const BUFFER_OVERFLOW: u32 = 0xFFFF_FF11;
    /// Communication timeout; no data arrived in time.
    pub const COMM_TIMEOUT: u32 = 0xFFFF_FF12;
    /// Writing to the serial port failed.
    pub const SERIAL_WRITE: u32 = 0xFFFF_FF13;
    /// Reading from the serial port failed.
    pub const SERIAL_READ: u32 = 0xFFFF_FF14;
    /// No more data available.
    pub const NO_MORE_DATA: u32 = 0xFFFF_FF15;
    /// Network connection not established.
    pub const NET_UNCONNECTED: u32 = 0xFFFF_FF16;
    /// Network connection lost.
    pub const NET_DISCONNECTED: u32 = 0xFFFF_FF17;
    /// CRC error in the reader response.
    pub const RESPONSE_CRC: u32 = 0xFFFF_FF18;
}

/// Outcome of a single driver invocation.
///
/// Collapses the vendor constant table into the four cases callers actually
/// branch on. Produced exclusively by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Command completed and any output payload is valid.
    Success,

    /// The inventory round ended without (further) tags. Not an error.
    EmptyOrStopped,

    /// Nothing arrived within the wait window. Not an error.
    Timeout,

    /// The device reported a real fault; carries the masked status code.
    Fault(u32),
}

impl StatusOutcome {
    /// True for [`StatusOutcome::Success`].
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// True for the outcomes that mean "no tag yet, keep going".
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::EmptyOrStopped | Self::Timeout)
    }

    /// The fault code, if this outcome is a fault.
    pub fn fault_code(self) -> Option<u32> {
        match self {
            Self::Fault(status) => Some(status),
            _ => None,
        }
    }
}

/// Classify a raw status word as returned by the driver.
///
/// The raw value is masked to unsigned 32 bits before comparison because the
/// binding layer surfaces the same constants as negative signed integers on
/// some call paths.
pub fn classify(raw: i32) -> StatusOutcome {
    match raw as u32 {
        code::OK => StatusOutcome::Success,
        code::INVENTORY_STOPPED => StatusOutcome::EmptyOrStopped,
        code::COMM_TIMEOUT => StatusOutcome::Timeout,
        status => StatusOutcome::Fault(status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn zero_is_success() {
        assert_eq!(classify(0), StatusOutcome::Success);
        assert!(classify(0).is_success());
    }

    #[test]
    fn entire_fault_range_is_non_success() {
        for low in 0x01..=0x18u32 {
            let raw = 0xFFFF_FF00 | low;
            let outcome = classify(raw as i32);
            assert!(
                !outcome.is_success(),
                "status {raw:#010X} must not classify as success"
            );
        }
    }

    #[rstest]
    #[case(code::COMM_TIMEOUT, StatusOutcome::Timeout)]
    #[case(code::INVENTORY_STOPPED, StatusOutcome::EmptyOrStopped)]
    fn no_tag_codes_are_recoverable(#[case] raw: u32, #[case] expected: StatusOutcome) {
        let outcome = classify(raw as i32);
        assert_eq!(outcome, expected);
        assert!(outcome.is_recoverable());
        assert_eq!(outcome.fault_code(), None);
    }

    #[rstest]
    #[case(code::PORT_HANDLE)]
    #[case(code::MODULE_INTERNAL)]
    #[case(code::BUFFER_OVERFLOW)]
    #[case(code::RESPONSE_CRC)]
    fn hard_faults_carry_their_code(#[case] raw: u32) {
        let outcome = classify(raw as i32);
        assert_eq!(outcome, StatusOutcome::Fault(raw));
        assert!(!outcome.is_recoverable());
        assert_eq!(outcome.fault_code(), Some(raw));
    }

    #[test]
    fn signed_and_unsigned_forms_classify_identically() {
        // 0xFFFFFF12 sign-extends to -238 when surfaced as i32.
        assert_eq!(classify(-238), classify(0xFFFF_FF12u32 as i32));
        assert_eq!(classify(-238), StatusOutcome::Timeout);
    }

    #[test]
    fn unknown_codes_are_faults() {
        assert_eq!(classify(0x1234), StatusOutcome::Fault(0x1234));
    }
}
