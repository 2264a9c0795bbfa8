use crate::registers::{
    fstat, opcode, FlashController, CHECK_WINDOW, FCCOB, FSTAT, PHRASE_WINDOW,
};

/// A simulated FTFC with an in-memory data-flash array, for testing purposes.
///
/// Commands execute when CCIF is written, against `SIZE` bytes of flash mapped
/// at `start` (memory map) and `bias` (controller address space). Erase is
/// per `sector_size`, program ANDs a phrase into the array.
///
/// Faults can be injected per launch, completion can be delayed by a number
/// of FSTAT reads, and the controller can be made to never finish.
#[derive(Debug, Clone)]
pub struct SimulatedFtfc<const SIZE: usize> {
    storage: [u8; SIZE],
    registers: [u8; 0x10],
    start: u32,
    bias: u32,
    sector_size: u32,
    cache_descriptor: Option<u32>,
    partition: Option<[u8; 5]>,
    // Statistics
    launches: u32,
    error_clears: u32,
    launches_without_clear: u32,
    cleared_since_launch: bool,
    opcode_counts: [u32; 256],
    flash_reads: u32,
    // Behaviour
    latency: u32,
    busy_reads: u32,
    fault: Option<(u32, u8)>,
    hang: bool,
    hang_at: Option<u32>,
}

impl<const SIZE: usize> SimulatedFtfc<SIZE> {
    /// Creates a new, idle controller with fully erased flash.
    pub fn new(start: u32, bias: u32, sector_size: u32) -> Self {
        let mut registers = [0; 0x10];
        registers[FSTAT] = fstat::CCIF;
        Self {
            storage: [0xFF; SIZE],
            registers,
            start,
            bias,
            sector_size,
            cache_descriptor: None,
            partition: None,
            launches: 0,
            error_clears: 0,
            launches_without_clear: 0,
            cleared_since_launch: false,
            opcode_counts: [0; 256],
            flash_reads: 0,
            latency: 0,
            busy_reads: 0,
            fault: None,
            hang: false,
            hang_at: None,
        }
    }

    /// Keep CCIF low for `reads` FSTAT reads after each launch.
    pub fn with_latency(mut self, reads: u32) -> Self {
        self.latency = reads;
        self
    }

    /// OR `flags` into FSTAT when launch number `launch` (zero based) finishes.
    /// The command itself has no effect on the array.
    pub fn fail_launch(&mut self, launch: u32, flags: u8) {
        self.fault = Some((launch, flags));
    }

    /// Never raise CCIF again, starting now.
    pub fn hang(&mut self) {
        self.hang = true;
        self.registers[FSTAT] &= !fstat::CCIF;
    }

    /// Never raise CCIF again once launch number `launch` (zero based) starts.
    pub fn hang_at_launch(&mut self, launch: u32) {
        self.hang_at = Some(launch);
    }

    /// Flash content
    pub fn storage(&self) -> &[u8; SIZE] {
        &self.storage
    }

    /// Write raw bytes into the array, bypassing the controller
    pub fn preload(&mut self, offset: usize, bytes: &[u8]) {
        self.storage[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Total commands launched
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Commands launched with `opcode`
    pub fn launches_of(&self, opcode: u8) -> u32 {
        self.opcode_counts[opcode as usize]
    }

    /// Writes of the error clear pattern to FSTAT
    pub fn error_clears(&self) -> u32 {
        self.error_clears
    }

    /// Launches not preceded by an error clear since the previous launch
    pub fn launches_without_clear(&self) -> u32 {
        self.launches_without_clear
    }

    /// Bytes read through the memory map
    pub fn flash_reads(&self) -> u32 {
        self.flash_reads
    }

    /// Last value written to the MSCM data-flash descriptor
    pub fn cache_descriptor(&self) -> Option<u32> {
        self.cache_descriptor
    }

    /// FCCOB1..5 of the last partition command
    pub fn partition(&self) -> Option<[u8; 5]> {
        self.partition
    }

    /// Read FCCOB `n` as loaded by the last command
    pub fn fccob(&self, n: usize) -> u8 {
        self.registers[FCCOB[n]]
    }

    fn fccob_address(&self) -> u32 {
        (self.fccob(1) as u32) << 16 | (self.fccob(2) as u32) << 8 | self.fccob(3) as u32
    }

    /// Array offset of a controller address, if it falls inside the array
    fn offset_of(&self, address: u32, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.bias)? as usize;
        (offset + len <= SIZE).then_some(offset)
    }

    fn launch(&mut self) {
        let launch = self.launches;
        self.launches += 1;
        if !self.cleared_since_launch {
            self.launches_without_clear += 1;
        }
        self.cleared_since_launch = false;
        let op = self.fccob(0);
        self.opcode_counts[op as usize] += 1;
        if self.hang_at == Some(launch) {
            self.hang = true;
        }

        let flags = match self.fault {
            Some((at, flags)) if at == launch => flags,
            _ => self.run(op),
        };
        self.registers[FSTAT] = flags;
        self.busy_reads = self.latency;
    }

    /// Execute the loaded command, returning the FSTAT error flags it sets
    fn run(&mut self, op: u8) -> u8 {
        let address = self.fccob_address();
        match op {
            opcode::ERASE_SECTOR => {
                let Some(offset) = self.offset_of(address, self.sector_size as usize) else {
                    return fstat::ACCERR;
                };
                if offset % self.sector_size as usize != 0 {
                    return fstat::ACCERR;
                }
                self.storage[offset..offset + self.sector_size as usize].fill(0xFF);
                0
            }
            opcode::PROGRAM_PHRASE => {
                let Some(offset) = self.offset_of(address, 8) else {
                    return fstat::ACCERR;
                };
                if offset % 8 != 0 {
                    return fstat::ACCERR;
                }
                for i in 0..8 {
                    self.storage[offset + i] &= self.registers[PHRASE_WINDOW + i];
                }
                0
            }
            opcode::PROGRAM_CHECK => {
                let Some(offset) = self.offset_of(address, 4) else {
                    return fstat::ACCERR;
                };
                let matches = (0..4)
                    .all(|i| self.storage[offset + i] == self.registers[CHECK_WINDOW + i]);
                if matches {
                    0
                } else {
                    fstat::MGSTAT0
                }
            }
            opcode::VERIFY_SECTION => {
                let phrases = (self.fccob(4) as usize) << 8 | self.fccob(5) as usize;
                let Some(offset) = self.offset_of(address, phrases * 8) else {
                    return fstat::ACCERR;
                };
                if self.storage[offset..offset + phrases * 8].iter().all(|&b| b == 0xFF) {
                    0
                } else {
                    fstat::MGSTAT0
                }
            }
            opcode::PROGRAM_PARTITION => {
                if self.partition.is_some() {
                    return fstat::ACCERR;
                }
                self.partition = Some([
                    self.fccob(1),
                    self.fccob(2),
                    self.fccob(3),
                    self.fccob(4),
                    self.fccob(5),
                ]);
                0
            }
            _ => fstat::ACCERR,
        }
    }
}

impl<const SIZE: usize> FlashController for SimulatedFtfc<SIZE> {
    fn read_register(&mut self, offset: usize) -> u8 {
        if offset == FSTAT && !self.hang && self.registers[FSTAT] & fstat::CCIF == 0 {
            if self.busy_reads == 0 {
                self.registers[FSTAT] |= fstat::CCIF;
            } else {
                self.busy_reads -= 1;
            }
        }
        self.registers[offset]
    }

    fn write_register(&mut self, offset: usize, value: u8) {
        if offset != FSTAT {
            self.registers[offset] = value;
            return;
        }
        // Write 1 to clear
        if value & fstat::CLEAR_ERRORS == fstat::CLEAR_ERRORS {
            self.error_clears += 1;
            self.cleared_since_launch = true;
        }
        self.registers[FSTAT] &= !(value & fstat::CLEAR_ERRORS);
        if value & fstat::CCIF != 0 && self.registers[FSTAT] & fstat::CCIF != 0 {
            self.registers[FSTAT] &= !fstat::CCIF;
            self.launch();
        }
    }

    fn write_cache_descriptor(&mut self, value: u32) {
        self.cache_descriptor = Some(value);
    }

    fn read_flash(&mut self, address: u32) -> u8 {
        self.flash_reads += 1;
        address
            .checked_sub(self.start)
            .and_then(|offset| self.storage.get(offset as usize))
            .copied()
            .unwrap_or(0xFF)
    }
}
