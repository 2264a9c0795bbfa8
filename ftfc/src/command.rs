use embedded_hal::delay::DelayNs;

use crate::registers::{fstat, FlashController, FCCOB, FSTAT};

/// Parameter bytes that follow the opcode (FCCOB1..FCCOB6)
pub const MAX_PARAMS: usize = 6;

/// Snapshot of the FSTAT register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status(u8);

impl Status {
    pub const fn new(bits: u8) -> Self {
        Status(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// CCIF: no command in progress
    pub const fn is_complete(&self) -> bool {
        self.0 & fstat::CCIF != 0
    }

    /// MGSTAT0: erase or program verify failed
    pub const fn verify_failed(&self) -> bool {
        self.0 & fstat::MGSTAT0 != 0
    }

    /// FPVIOL: the command targeted a protected area
    pub const fn protection_violation(&self) -> bool {
        self.0 & fstat::FPVIOL != 0
    }

    /// ACCERR: illegal command or parameters
    pub const fn access_error(&self) -> bool {
        self.0 & fstat::ACCERR != 0
    }

    /// RDCOLERR: flash was read while the command ran
    pub const fn read_collision(&self) -> bool {
        self.0 & fstat::RDCOLERR != 0
    }

    /// Any of the flags that mark the command as failed
    pub const fn is_failure(&self) -> bool {
        self.0 & fstat::FAILURE != 0
    }
}

/// Payload written into a data window of the command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Staged<'a> {
    window: usize,
    bytes: &'a [u8],
}

/// One controller command: opcode, parameter bytes and an optional payload.
///
/// Built per command and dropped after the status is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    opcode: u8,
    params: [u8; MAX_PARAMS],
    len: usize,
    staged: Option<Staged<'a>>,
}

impl<'a> Command<'a> {
    pub const fn new(opcode: u8) -> Self {
        Command {
            opcode,
            params: [0; MAX_PARAMS],
            len: 0,
            staged: None,
        }
    }

    /// Append a parameter byte.
    ///
    /// # Panics
    ///
    /// If more than [MAX_PARAMS] parameters are appended.
    pub fn param(mut self, value: u8) -> Self {
        assert!(self.len < MAX_PARAMS, "FCCOB parameter buffer full");
        self.params[self.len] = value;
        self.len += 1;
        self
    }

    /// Append a 24-bit controller address, most significant byte first.
    pub fn address(self, address: u32) -> Self {
        self.param((address >> 16) as u8)
            .param((address >> 8) as u8)
            .param(address as u8)
    }

    /// Write `bytes` in address order starting at register offset `window`
    /// right before launch.
    pub fn stage(mut self, window: usize, bytes: &'a [u8]) -> Self {
        self.staged = Some(Staged { window, bytes });
        self
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn params(&self) -> &[u8] {
        &self.params[..self.len]
    }
}

/// Runs commands on the flash controller, one at a time.
///
/// The caller must hold exclusive access to the controller for the whole
/// call. Waiting has no timeout: a controller that never raises CCIF keeps
/// [Sequencer::execute] polling `delay` forever.
#[derive(Debug)]
pub struct Sequencer<C, D> {
    controller: C,
    delay: D,
    poll_interval_ns: u32,
}

impl<C: FlashController, D: DelayNs> Sequencer<C, D> {
    pub fn new(controller: C, delay: D, poll_interval_ns: u32) -> Self {
        Sequencer {
            controller,
            delay,
            poll_interval_ns,
        }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    pub fn release(self) -> (C, D) {
        (self.controller, self.delay)
    }

    /// Block until CCIF is set
    pub fn wait_ready(&mut self) {
        while !self.controller.read_status().is_complete() {
            self.delay.delay_ns(self.poll_interval_ns);
        }
    }

    /// Run one command and return the FSTAT snapshot taken after it finished.
    ///
    /// The command failed if [Status::is_failure] is set on the result.
    pub fn execute(&mut self, command: &Command<'_>) -> Status {
        // Idle
        self.wait_ready();

        // Clear stale errors
        self.controller.write_register(FSTAT, fstat::CLEAR_ERRORS);

        // Load
        self.controller.write_register(FCCOB[0], command.opcode);
        for (i, &value) in command.params().iter().enumerate() {
            self.controller.write_register(FCCOB[i + 1], value);
        }
        if let Some(staged) = command.staged {
            for (i, &value) in staged.bytes.iter().enumerate() {
                self.controller.write_register(staged.window + i, value);
            }
        }

        // Launch
        self.controller.write_register(FSTAT, fstat::CCIF);

        // Busy
        self.wait_ready();

        let status = self.controller.read_status();
        if status.is_failure() {
            debug!(
                "Command {:#x} failed, FSTAT {:#x}",
                command.opcode,
                status.bits()
            );
        } else {
            trace!("Command {:#x} done", command.opcode);
        }
        status
    }
}

/// Production wait step: spins the core between status polls.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusyWait;

impl DelayNs for BusyWait {
    fn delay_ns(&mut self, ns: u32) {
        // At most one iteration per nanosecond on any supported core clock
        for _ in 0..ns.max(1) {
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{opcode, PHRASE_WINDOW};

    use test_log::test;

    #[test]
    fn status_flags() {
        let status = Status::new(0x80);
        assert!(status.is_complete());
        assert!(!status.is_failure());

        let status = Status::new(0x80 | 0x10);
        assert!(status.protection_violation());
        assert!(status.is_failure());

        assert!(Status::new(0x01).verify_failed());
        assert!(Status::new(0x01).is_failure());
        assert!(Status::new(0x20).access_error());
        assert!(Status::new(0x40).read_collision());
        assert!(!Status::new(0x80 | 0x02).is_failure());
    }

    #[test]
    fn address_is_msb_first() {
        let command = Command::new(opcode::ERASE_SECTOR).address(0x80_1234);
        assert_eq!(command.opcode(), 0x09);
        assert_eq!(command.params(), &[0x80, 0x12, 0x34]);
    }

    #[test]
    fn params_and_payload() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let command = Command::new(opcode::PROGRAM_PHRASE)
            .address(0x80_0008)
            .stage(PHRASE_WINDOW, &data);
        assert_eq!(command.params().len(), 3);
        assert_eq!(
            command.staged,
            Some(Staged {
                window: PHRASE_WINDOW,
                bytes: &data
            })
        );
    }

    #[test]
    #[should_panic(expected = "FCCOB parameter buffer full")]
    fn seven_params_overflow() {
        let _ = Command::new(0)
            .address(0)
            .param(1)
            .param(2)
            .param(3)
            .param(4);
    }
}
