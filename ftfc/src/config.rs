use embedded_progmem::Geometry;

use crate::{error::FtfcError, registers::PHRASE_WINDOW_LEN};

/// Offset the controller adds to data-flash addresses.
///
/// The FTFC addresses the data-flash at 0x80_0000 in its own 24-bit address
/// space, while the memory map places it at [Geometry::start_address].
pub const DATA_FLASH_BIAS: u32 = 0x0080_0000;

/// Margin level used by the verify commands
pub const VERIFY_MARGIN: u8 = 1;

/// Optional extra steps around erase and program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Policy {
    /// Run a read 1s section check over the sector after each erase
    pub verify_erase: bool,
    /// Run a program check over every unit after a write.
    /// A failing check is logged only; the write still reports success.
    pub verify_write: bool,
    /// Skip units whose flash content already equals the source bytes
    pub skip_duplicate_writes: bool,
}

impl Default for Policy {
    /// Taken from the `verify-erase`, `verify-write` and
    /// `skip-duplicate-writes` cargo features.
    fn default() -> Self {
        Policy {
            verify_erase: cfg!(feature = "verify-erase"),
            verify_write: cfg!(feature = "verify-write"),
            skip_duplicate_writes: cfg!(feature = "skip-duplicate-writes"),
        }
    }
}

/// Parameters of the program partition command (FCCOB1..5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Partition {
    /// CSEc key size
    pub csec_key_size: u8,
    /// Verify only attribute (SFE)
    pub sfe: u8,
    /// FlexRAM load control, 0 loads the emulated EEPROM on reset
    pub flexram_load: u8,
    /// EEPROM data set size code
    pub eee_code: u8,
    /// FlexNVM partition code
    pub de_code: u8,
}

impl Partition {
    pub fn params(&self) -> [u8; 5] {
        [
            self.csec_key_size,
            self.sfe,
            self.flexram_load,
            self.eee_code,
            self.de_code,
        ]
    }
}

impl Default for Partition {
    fn default() -> Self {
        Partition {
            csec_key_size: 0x00,
            sfe: 0x00,
            flexram_load: 0x00,
            eee_code: 0x0F,
            de_code: 0x00,
        }
    }
}

/// Driver configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    pub geometry: Geometry,
    /// See [DATA_FLASH_BIAS]
    pub controller_bias: u32,
    /// Passed to the wait step between FSTAT polls
    pub poll_interval_ns: u32,
    pub policy: Policy,
    pub partition: Partition,
}

impl Config {
    pub fn new(geometry: Geometry) -> Self {
        Config {
            geometry,
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_controller_bias(mut self, bias: u32) -> Self {
        self.controller_bias = bias;
        self
    }

    /// Number of phrases the erase verify covers: one full sector.
    ///
    /// # Errors
    ///
    /// [FtfcError::UnsupportedGeometry] if the sector holds more phrases than
    /// the 16-bit count of the verify command.
    pub fn verify_span(&self) -> Result<u16, FtfcError> {
        u16::try_from(self.geometry.block_size() / self.geometry.write_unit())
            .map_err(|_| FtfcError::UnsupportedGeometry)
    }

    /// Check the geometry against what the controller can do.
    ///
    /// The phrase window takes exactly one write unit, so any other unit size
    /// would either spill past FCCOB or program stale window bytes.
    pub fn validate(&self) -> Result<(), FtfcError> {
        if self.geometry.write_unit() as usize != PHRASE_WINDOW_LEN {
            return Err(FtfcError::UnsupportedGeometry);
        }
        self.verify_span()?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            geometry: Geometry::S32K1XX_DFLASH,
            controller_bias: DATA_FLASH_BIAS,
            poll_interval_ns: 0,
            policy: Policy::default(),
            partition: Partition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn reference_device_defaults() {
        let config = Config::default();
        assert_eq!(config.geometry, Geometry::S32K1XX_DFLASH);
        assert_eq!(config.controller_bias, 0x80_0000);
        // 2048 / 8
        assert_eq!(config.verify_span(), Ok(256));
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.partition.params(), [0, 0, 0, 0x0F, 0]);
    }

    #[test]
    fn policy_follows_features() {
        let policy = Policy::default();
        assert_eq!(policy.verify_erase, cfg!(feature = "verify-erase"));
        assert_eq!(policy.verify_write, cfg!(feature = "verify-write"));
        assert_eq!(
            policy.skip_duplicate_writes,
            cfg!(feature = "skip-duplicate-writes")
        );
    }

    #[test]
    fn write_unit_must_match_phrase_window() {
        for unit in [4, 16] {
            let geometry = Geometry::new(0x1000_0000, 256, 2048, 4, unit).unwrap();
            assert_eq!(
                Config::new(geometry).validate(),
                Err(FtfcError::UnsupportedGeometry)
            );
        }
    }

    #[test]
    fn oversized_sector_is_rejected() {
        // 1 MiB sector is 131072 phrases, more than the verify count holds
        let geometry = Geometry::new(0x1000_0000, 8, 1 << 20, 1, 8).unwrap();
        let config = Config::new(geometry);
        assert_eq!(config.verify_span(), Err(FtfcError::UnsupportedGeometry));
        assert_eq!(config.validate(), Err(FtfcError::UnsupportedGeometry));

        // Largest sector that still fits
        let geometry = Geometry::new(0x1000_0000, 8, 0xFFFF * 8, 1, 8).unwrap();
        assert_eq!(Config::new(geometry).verify_span(), Ok(0xFFFF));
    }
}
