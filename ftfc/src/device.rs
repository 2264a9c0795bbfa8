use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_progmem::{
    check_read, check_write, BlockIndex, ByteAddress, ErrorType, Geometry, PageIndex, ProgMem,
};

use crate::{
    command::{Command, Sequencer, Status},
    config::{Config, VERIFY_MARGIN},
    error::FtfcError,
    registers::{
        opcode, FlashController, CHECK_WINDOW, CHECK_WINDOW_LEN, OCMDR_DFLASH_CACHE_OFF,
        PHRASE_WINDOW,
    },
};

/// Value of an erased flash byte
const ERASED: u8 = 0xFF;

/// FTFC data-flash driver.
///
/// Implements [embedded_progmem::ProgMem] on top of a [FlashController]. Every
/// call blocks until the controller is done; the caller must hold exclusive
/// access to the controller for the duration (no locking happens here, and
/// calling from an interrupt while another call runs is not supported).
pub struct DataFlash<C, D> {
    sequencer: Sequencer<C, D>,
    config: Config,
}

// Manually implement Debug to avoid bounds on the controller and delay
impl<C, D> Debug for DataFlash<C, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataFlash")
            .field("config", &self.config)
            .finish()
    }
}

impl<C: FlashController, D: DelayNs> DataFlash<C, D> {
    /// Create a new [DataFlash] over `controller`, polling with `delay`.
    ///
    /// # Errors
    ///
    /// [FtfcError::UnsupportedGeometry] if [Config::validate] rejects the
    /// geometry.
    pub fn new(controller: C, delay: D, config: Config) -> Result<Self, FtfcError> {
        config.validate()?;
        Ok(DataFlash {
            sequencer: Sequencer::new(controller, delay, config.poll_interval_ns),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &C {
        self.sequencer.controller()
    }

    pub fn controller_mut(&mut self) -> &mut C {
        self.sequencer.controller_mut()
    }

    /// Give back the controller and the wait step
    pub fn release(self) -> (C, D) {
        self.sequencer.release()
    }

    /// One-time bring-up: disable the data-flash cache, then program the
    /// FlexRAM/EEPROM partition from [Config::partition].
    ///
    /// Destructive. Run once on a blank device; running it on a device that is
    /// already partitioned is not guarded against.
    pub fn init(&mut self) -> Result<(), FtfcError> {
        // Rewrites the neighbouring descriptor bits as well
        self.sequencer
            .controller_mut()
            .write_cache_descriptor(OCMDR_DFLASH_CACHE_OFF);

        let partition = self.config.partition.params();
        let command = partition
            .iter()
            .fold(Command::new(opcode::PROGRAM_PARTITION), |cmd, &p| cmd.param(p));
        let status = self.sequencer.execute(&command);
        if status.is_failure() {
            warn!("Partition command failed, FSTAT {:#x}", status.bits());
            return Err(FtfcError::PartitionFailed(status));
        }
        info!("Data-flash partitioned, EEE code {:#x}", partition[3]);
        Ok(())
    }

    /// Controller address of an erase block. The subtraction wraps; only the
    /// low 24 bits reach the controller.
    fn block_controller_address(&self, block: BlockIndex) -> u32 {
        block
            .as_byte_offset(self.config.geometry.block_size())
            .wrapping_add(self.config.controller_bias)
            .wrapping_sub(self.config.geometry.start_address())
    }

    fn run(&mut self, command: &Command<'_>) -> Result<Status, Status> {
        let status = self.sequencer.execute(command);
        if status.is_failure() {
            Err(status)
        } else {
            Ok(status)
        }
    }

    /// Whether the flash at `offset` already holds exactly `unit`
    fn holds(&mut self, offset: u32, unit: &[u8]) -> bool {
        let base = self.config.geometry.start_address().wrapping_add(offset);
        let controller = self.sequencer.controller_mut();
        unit.iter()
            .enumerate()
            .all(|(i, &b)| controller.read_flash(base.wrapping_add(i as u32)) == b)
    }

    /// Program check every unit of a finished write.
    ///
    /// A failing check only ends the pass early; the write is still reported
    /// as successful.
    fn verify_written(&mut self, dest: u32, bytes: &[u8]) {
        let unit = self.config.geometry.write_unit() as usize;
        let mut dest = dest;
        for chunk in bytes.chunks(unit) {
            let expected = &chunk[..chunk.len().min(CHECK_WINDOW_LEN)];
            let command = Command::new(opcode::PROGRAM_CHECK)
                .address(dest)
                .param(VERIFY_MARGIN)
                .stage(CHECK_WINDOW, expected);
            if let Err(status) = self.run(&command) {
                warn!(
                    "Program check failed at {:#x}, FSTAT {:#x}",
                    dest,
                    status.bits()
                );
                return;
            }
            dest = dest.wrapping_add(unit as u32);
        }
    }
}

impl<C, D> ErrorType for DataFlash<C, D> {
    type Error = FtfcError;
}

impl<C: FlashController, D: DelayNs> ProgMem for DataFlash<C, D> {
    fn geometry(&self) -> &Geometry {
        &self.config.geometry
    }

    fn erase_block(&mut self, block: BlockIndex) -> Result<usize, Self::Error> {
        trace!("Erasing block {}", block.as_u32());
        let dest = self.block_controller_address(block);

        self.run(&Command::new(opcode::ERASE_SECTOR).address(dest))
            .map_err(FtfcError::EraseFailed)?;

        if self.config.policy.verify_erase {
            let span = self.config.verify_span()?;
            let command = Command::new(opcode::VERIFY_SECTION)
                .address(dest)
                .param((span >> 8) as u8)
                .param(span as u8)
                .param(VERIFY_MARGIN);
            self.run(&command).map_err(FtfcError::EraseVerifyFailed)?;
        }

        Ok(self.config.geometry.block_size() as usize)
    }

    fn is_page_erased(&mut self, page: PageIndex) -> Result<usize, Self::Error> {
        let geometry = self.config.geometry;
        if !geometry.contains_page(page) {
            return Err(FtfcError::OutOfBounds);
        }

        let base = geometry.address_of(page).as_u32();
        let page_size = geometry.page_size();
        let controller = self.sequencer.controller_mut();
        let first_programmed = (0..page_size)
            .find(|&i| controller.read_flash(base.wrapping_add(i)) != ERASED)
            .unwrap_or(page_size);
        Ok((page_size - first_programmed) as usize)
    }

    fn write(&mut self, addr: ByteAddress, bytes: &[u8]) -> Result<usize, Self::Error> {
        trace!("Writing {} bytes to {}", bytes.len(), addr);
        let offset = self.config.geometry.normalize(addr);
        check_write(&self.config.geometry, bytes.len())?;

        let unit = self.config.geometry.write_unit() as usize;
        let start = offset.wrapping_add(self.config.controller_bias);
        let mut dest = start;
        let mut src_offset = offset;
        for chunk in bytes.chunks(unit) {
            if self.config.policy.skip_duplicate_writes && self.holds(src_offset, chunk) {
                trace!("Skipping unchanged unit at {:#x}", dest);
            } else {
                let command = Command::new(opcode::PROGRAM_PHRASE)
                    .address(dest)
                    .stage(PHRASE_WINDOW, chunk);
                // Units already programmed are left as they are
                self.run(&command).map_err(FtfcError::ProgramFailed)?;
            }
            dest = dest.wrapping_add(unit as u32);
            src_offset = src_offset.wrapping_add(unit as u32);
        }

        if self.config.policy.verify_write {
            self.verify_written(start, bytes);
        }

        Ok(bytes.len())
    }

    fn read(&mut self, addr: ByteAddress, bytes: &mut [u8]) -> Result<usize, Self::Error> {
        check_read(&self.config.geometry, addr, bytes.len())?;
        let base = self
            .config
            .geometry
            .start_address()
            .wrapping_add(self.config.geometry.normalize(addr));
        let controller = self.sequencer.controller_mut();
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = controller.read_flash(base.wrapping_add(i as u32));
        }
        Ok(bytes.len())
    }
}
