//! Device-facing operations outside the inventory loop.
//!
//! Power, antenna, Q value, the parameter block, tag memory access and the
//! annunciator outputs (buzzer, relay). Operations that the hardware cannot
//! service during continuous inventory go through
//! [`with_inventory_paused`](crate::Reader::with_inventory_paused).

use std::time::Duration;

use cf591_core::{
    ConfigPatch, DeviceConfig, DeviceIdentity, Error, LockAction, LockArea, MemoryBank, ReadRange,
    Result, range_to_power,
};
use cf591_driver::{Command, Driver};
use tracing::debug;

use crate::reader::Reader;
use crate::session::timeout_ms_arg;

/// Valid Q values for the anti-collision algorithm.
const Q_RANGE: std::ops::RangeInclusive<u8> = 0..=15;

/// A tag memory read request.
#[derive(Debug, Clone)]
pub struct MemoryRead {
    /// Bank to read from.
    pub bank: MemoryBank,

    /// Starting word address (one word is two bytes).
    pub word_address: u16,

    /// Number of words to read.
    pub word_count: u8,

    /// Access password, if the bank is secured.
    pub password: Option<[u8; 4]>,

    /// Wait window for the tag reply.
    pub timeout: Duration,
}

impl MemoryRead {
    /// Read `word_count` words from `bank`, unsecured, with a 2 s window.
    pub fn new(bank: MemoryBank, word_address: u16, word_count: u8) -> Self {
        Self {
            bank,
            word_address,
            word_count,
            password: None,
            timeout: Duration::from_secs(2),
        }
    }

    /// Supply the access password.
    pub fn with_password(mut self, password: [u8; 4]) -> Self {
        self.password = Some(password);
        self
    }

    fn encode(&self) -> Vec<u8> {
        let mut args = Vec::with_capacity(11);
        args.push(0x00); // option: no select match
        args.extend_from_slice(&self.password.unwrap_or_default());
        args.push(self.bank.as_u8());
        args.extend_from_slice(&self.word_address.to_le_bytes());
        args.push(self.word_count);
        args.extend_from_slice(&timeout_ms_arg(self.timeout));
        args
    }
}

/// A tag memory write request.
#[derive(Debug, Clone)]
pub struct MemoryWrite {
    /// Bank to write to.
    pub bank: MemoryBank,

    /// Starting word address.
    pub word_address: u16,

    /// Data to write; must be an even number of bytes (word aligned).
    pub data: Vec<u8>,

    /// Access password, if the bank is secured.
    pub password: Option<[u8; 4]>,

    /// Wait window for the tag acknowledgement.
    pub timeout: Duration,
}

impl MemoryWrite {
    /// Write `data` to `bank`, unsecured, with a 2 s window.
    pub fn new(bank: MemoryBank, word_address: u16, data: Vec<u8>) -> Self {
        Self {
            bank,
            word_address,
            data,
            password: None,
            timeout: Duration::from_secs(2),
        }
    }

    /// Supply the access password.
    pub fn with_password(mut self, password: [u8; 4]) -> Self {
        self.password = Some(password);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::validation("write data must not be empty"));
        }
        if self.data.len() % 2 != 0 {
            return Err(Error::validation(format!(
                "write data must be word aligned, got {} bytes",
                self.data.len()
            )));
        }
        if self.data.len() / 2 > usize::from(u8::MAX) {
            return Err(Error::validation(format!(
                "write data too long: {} words, max {}",
                self.data.len() / 2,
                u8::MAX
            )));
        }
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        let mut args = Vec::with_capacity(11 + self.data.len());
        args.push(0x00); // option: no select match
        args.extend_from_slice(&self.password.unwrap_or_default());
        args.push(self.bank.as_u8());
        args.extend_from_slice(&self.word_address.to_le_bytes());
        args.push((self.data.len() / 2) as u8);
        args.extend_from_slice(&self.data);
        args.extend_from_slice(&timeout_ms_arg(self.timeout));
        args
    }
}

impl<D: Driver> Reader<D> {
    /// Firmware/hardware versions and the serial number.
    pub async fn device_identity(&mut self) -> Result<DeviceIdentity> {
        let payload = self
            .session
            .invoke(Command::GetDeviceInfo, &[])
            .await?
            .success()?;
        DeviceIdentity::decode(&payload)
    }

    /// Current RF output power in dBm.
    pub async fn rf_power(&mut self) -> Result<u8> {
        let payload = self.session.invoke(Command::GetPower, &[]).await?.success()?;
        payload
            .first()
            .copied()
            .ok_or_else(|| Error::payload("rf power", "empty payload"))
    }

    /// Set the RF output power in dBm.
    ///
    /// Retried per [`ReaderOptions::power_retry`](crate::ReaderOptions);
    /// power changes are the most failure-prone command right after
    /// power-up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any device I/O if `dbm` exceeds
    /// the configured [`PowerCap`].
    pub async fn set_rf_power(&mut self, dbm: u8) -> Result<()> {
        let cap = self.options.power_cap;
        if !cap.allows(dbm) {
            return Err(Error::validation(format!(
                "power must be 0-{} dBm, got {dbm}",
                cap.max_dbm()
            )));
        }

        let retry = self.options.power_retry.clone();
        retry
            .run("set rf power", async || {
                self.session
                    .invoke(Command::SetPower, &[dbm, 0])
                    .await?
                    .success()
                    .map(drop)
            })
            .await?;
        debug!(dbm, "rf power set");
        Ok(())
    }

    /// Set power from a semantic read range.
    pub async fn set_range(&mut self, range: ReadRange) -> Result<()> {
        let dbm = range_to_power(range, self.options.power_cap);
        self.set_rf_power(dbm).await
    }

    /// Current antenna enable mask.
    pub async fn antenna_mask(&mut self) -> Result<u8> {
        let payload = self
            .session
            .invoke(Command::GetAntenna, &[])
            .await?
            .success()?;
        payload
            .first()
            .copied()
            .ok_or_else(|| Error::payload("antenna mask", "empty payload"))
    }

    /// Set the antenna enable mask (bit 0 is antenna 1).
    pub async fn set_antenna_mask(&mut self, mask: u8) -> Result<()> {
        if mask == 0 {
            return Err(Error::validation("antenna mask must enable at least one antenna"));
        }
        self.session
            .invoke(Command::SetAntenna, &[mask])
            .await?
            .success()
            .map(drop)
    }

    /// Current anti-collision Q value.
    ///
    /// Some firmware revisions refuse this query during inventory, so it
    /// runs with inventory paused.
    pub async fn q_value(&mut self) -> Result<u8> {
        self.with_inventory_paused(async |reader| {
            let payload = reader
                .session
                .invoke(Command::GetQValue, &[])
                .await?
                .success()?;
            payload
                .first()
                .copied()
                .ok_or_else(|| Error::payload("q value", "empty payload"))
        })
        .await
    }

    /// Set the anti-collision Q value (0-15).
    ///
    /// Lower values favor sparse tag populations, higher values dense ones.
    pub async fn set_q_value(&mut self, q: u8) -> Result<()> {
        if !Q_RANGE.contains(&q) {
            return Err(Error::validation(format!("Q value must be 0-15, got {q}")));
        }
        self.with_inventory_paused(async |reader| {
            reader
                .session
                .invoke(Command::SetQValue, &[q, 0])
                .await?
                .success()
                .map(drop)
        })
        .await
    }

    /// Fetch the whole device parameter block.
    pub async fn device_config(&mut self) -> Result<DeviceConfig> {
        let payload = self
            .session
            .invoke(Command::GetConfig, &[])
            .await?
            .success()?;
        DeviceConfig::decode(&payload)
    }

    /// Apply a partial configuration update.
    ///
    /// The wire protocol has no partial-field set, so this is a
    /// read-modify-write: fetch a fresh snapshot, merge the patch, write the
    /// whole block back. Returns the configuration as written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any I/O for out-of-range fields
    /// (power beyond the cap, Q outside 0-15).
    pub async fn update_config(&mut self, patch: &ConfigPatch) -> Result<DeviceConfig> {
        if let Some(dbm) = patch.rf_power
            && !self.options.power_cap.allows(dbm)
        {
            return Err(Error::validation(format!(
                "power must be 0-{} dBm, got {dbm}",
                self.options.power_cap.max_dbm()
            )));
        }
        if let Some(q) = patch.q_value
            && !Q_RANGE.contains(&q)
        {
            return Err(Error::validation(format!("Q value must be 0-15, got {q}")));
        }

        let mut config = self.device_config().await?;
        if patch.is_empty() {
            return Ok(config);
        }
        patch.apply(&mut config);

        self.session
            .invoke(Command::SetConfig, &config.encode())
            .await?
            .success()?;
        debug!("device parameters updated");
        Ok(config)
    }

    /// Read tag memory, with inventory paused for the duration.
    pub async fn read_memory(&mut self, request: &MemoryRead) -> Result<Vec<u8>> {
        let args = request.encode();
        self.with_inventory_paused(async |reader| {
            reader
                .session
                .invoke(Command::ReadMemory, &args)
                .await?
                .success()
        })
        .await
    }

    /// Write tag memory, with inventory paused for the duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before any I/O for empty, unaligned or
    /// oversized data.
    pub async fn write_memory(&mut self, request: &MemoryWrite) -> Result<()> {
        request.validate()?;
        let args = request.encode();
        self.with_inventory_paused(async |reader| {
            reader
                .session
                .invoke(Command::WriteMemory, &args)
                .await?
                .success()
                .map(drop)
        })
        .await
    }

    /// Write a new EPC to the tag in the field.
    ///
    /// The EPC bank stores CRC and protocol-control words first; user EPC
    /// data starts at word 2.
    pub async fn write_epc(&mut self, epc: &[u8], password: Option<[u8; 4]>) -> Result<()> {
        let mut request = MemoryWrite::new(MemoryBank::Epc, 2, epc.to_vec());
        request.password = password;
        self.write_memory(&request).await
    }

    /// Change the lock state of a tag memory area.
    pub async fn lock_tag(
        &mut self,
        area: LockArea,
        action: LockAction,
        password: Option<[u8; 4]>,
    ) -> Result<()> {
        let mut args = Vec::with_capacity(6);
        args.extend_from_slice(&password.unwrap_or_default());
        args.push(area.as_u8());
        args.push(action.as_u8());
        self.session
            .invoke(Command::LockTag, &args)
            .await?
            .success()
            .map(drop)
    }

    /// Permanently disable the tag in the field. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an all-zero kill password; Gen2
    /// tags refuse the zero password, so sending it only wastes an
    /// air-interface round.
    pub async fn kill_tag(&mut self, kill_password: [u8; 4]) -> Result<()> {
        if kill_password == [0; 4] {
            return Err(Error::validation("kill password must be non-zero"));
        }
        self.session
            .invoke(Command::KillTag, &kill_password)
            .await?
            .success()
            .map(drop)
    }

    /// Enable the buzzer with the given pulse length (10 ms units).
    pub async fn enable_buzzer(&mut self, duration_10ms: u8) -> Result<()> {
        self.session
            .invoke(Command::EnableBuzzer, &[duration_10ms])
            .await?
            .success()
            .map(drop)
    }

    /// Disable the buzzer.
    pub async fn disable_buzzer(&mut self) -> Result<()> {
        self.session
            .invoke(Command::DisableBuzzer, &[])
            .await?
            .success()
            .map(drop)
    }

    /// Energize the relay for `hold_100ms` tenths of a second.
    pub async fn activate_relay(&mut self, hold_100ms: u8) -> Result<()> {
        self.session
            .invoke(Command::ActivateRelay, &[hold_100ms])
            .await?
            .success()
            .map(drop)
    }

    /// Release the relay.
    pub async fn deactivate_relay(&mut self, hold_100ms: u8) -> Result<()> {
        self.session
            .invoke(Command::DeactivateRelay, &[hold_100ms])
            .await?
            .success()
            .map(drop)
    }
}
