//! FTFC register boundary.
//!
//! Offsets are relative to the FTFC base. The FCCOB bytes are laid out big
//! endian inside each 32-bit register, so FCCOB0 sits at 0x07 and FCCOB3 at
//! 0x04.

use core::ptr;

use crate::command::Status;

/// FTFC base address on S32K1xx
pub const FTFC_BASE: usize = 0x4002_0000;
/// MSCM on-chip memory descriptor for the data-flash (OCMDR1)
pub const MSCM_OCMDR_DFLASH: usize = 0x4000_1000 + 0x404;

/// Flash status register
pub const FSTAT: usize = 0x00;

/// Offsets of FCCOB0..FCCOBB, indexed by FCCOB number
pub const FCCOB: [usize; 12] = [
    0x07, 0x06, 0x05, 0x04, // FCCOB0..3
    0x0B, 0x0A, 0x09, 0x08, // FCCOB4..7
    0x0F, 0x0E, 0x0D, 0x0C, // FCCOB8..B
];

/// Where program-phrase payload bytes are written, in address order
pub const PHRASE_WINDOW: usize = 0x08;
/// Payload bytes accepted by the phrase window
pub const PHRASE_WINDOW_LEN: usize = 8;
/// Where program-check expected data is written, in address order
pub const CHECK_WINDOW: usize = 0x0C;
/// Expected data bytes accepted by the check window (one longword)
pub const CHECK_WINDOW_LEN: usize = 4;

/// FSTAT flags
pub mod fstat {
    /// Command complete. Writing 1 launches the loaded command.
    pub const CCIF: u8 = 0x80;
    /// Read collision error
    pub const RDCOLERR: u8 = 0x40;
    /// Access error
    pub const ACCERR: u8 = 0x20;
    /// Protection violation
    pub const FPVIOL: u8 = 0x10;
    /// Verify failure reported by the last command (read only)
    pub const MGSTAT0: u8 = 0x01;

    /// Write-1-to-clear error flags
    pub const CLEAR_ERRORS: u8 = FPVIOL | ACCERR | RDCOLERR;
    /// Flags that mark a command as failed
    pub const FAILURE: u8 = MGSTAT0 | FPVIOL | ACCERR | RDCOLERR;
}

/// FTFC command opcodes, written to FCCOB0
pub mod opcode {
    /// Read 1s section
    pub const VERIFY_SECTION: u8 = 0x01;
    /// Program check against expected data
    pub const PROGRAM_CHECK: u8 = 0x02;
    /// Program one phrase
    pub const PROGRAM_PHRASE: u8 = 0x07;
    /// Erase one flash sector
    pub const ERASE_SECTOR: u8 = 0x09;
    /// Program the FlexRAM/EEPROM partition
    pub const PROGRAM_PARTITION: u8 = 0x80;
}

/// Descriptor value that disables the data-flash cache.
///
/// The register holds other control bits too; this value rewrites all of them.
pub const OCMDR_DFLASH_CACHE_OFF: u32 = 0xC706_B030;

/// Access to the flash controller registers and the memory mapped flash array.
///
/// Each call is a single access, performed in program order. Implemented by
/// [Mmio] on hardware and by [crate::sim::SimulatedFtfc] in tests.
pub trait FlashController {
    /// Read one 8-bit FTFC register at `offset` from the base
    fn read_register(&mut self, offset: usize) -> u8;

    /// Write one 8-bit FTFC register at `offset` from the base
    fn write_register(&mut self, offset: usize, value: u8);

    /// Write the 32-bit data-flash memory descriptor in the MSCM
    fn write_cache_descriptor(&mut self, value: u32);

    /// Read one byte of flash through the memory map at absolute `address`
    fn read_flash(&mut self, address: u32) -> u8;

    /// Snapshot of FSTAT
    fn read_status(&mut self) -> Status {
        Status::new(self.read_register(FSTAT))
    }
}

/// Volatile register access at fixed addresses.
#[derive(Debug)]
pub struct Mmio {
    ftfc: *mut u8,
    ocmdr: *mut u32,
}

impl Mmio {
    /// Registers at the S32K1xx addresses.
    ///
    /// # Safety
    ///
    /// Only one instance may exist, and nothing else may touch the FTFC while
    /// it is in use.
    pub const unsafe fn new() -> Self {
        Self::with_base(FTFC_BASE, MSCM_OCMDR_DFLASH)
    }

    /// Registers at other addresses, for derivatives that move them.
    ///
    /// # Safety
    ///
    /// As [Mmio::new], and both addresses must be valid device registers.
    pub const unsafe fn with_base(ftfc_base: usize, ocmdr: usize) -> Self {
        Mmio {
            ftfc: ftfc_base as *mut u8,
            ocmdr: ocmdr as *mut u32,
        }
    }
}

impl FlashController for Mmio {
    fn read_register(&mut self, offset: usize) -> u8 {
        // SAFETY: offset stays inside the FTFC block owned by this instance
        unsafe { ptr::read_volatile(self.ftfc.add(offset)) }
    }

    fn write_register(&mut self, offset: usize, value: u8) {
        // SAFETY: as above
        unsafe { ptr::write_volatile(self.ftfc.add(offset), value) }
    }

    fn write_cache_descriptor(&mut self, value: u32) {
        // SAFETY: ocmdr was given as a valid register address at construction
        unsafe { ptr::write_volatile(self.ocmdr, value) }
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        // SAFETY: flash is byte addressable for reads across the memory map
        unsafe { ptr::read_volatile(address as usize as *const u8) }
    }
}
