#![cfg_attr(not(test), no_std)]
// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod command;
pub mod config;
mod device;
pub mod error;
pub mod registers;
pub mod sim;

pub use command::{BusyWait, Command, Sequencer, Status};
pub use config::{Config, Partition, Policy, DATA_FLASH_BIAS};
pub use device::DataFlash;
pub use error::FtfcError;
pub use registers::{FlashController, Mmio};

/// Driver for the S32K1xx data-flash on real hardware
pub type S32kDataFlash = DataFlash<Mmio, BusyWait>;

/// Create the data-flash driver on the S32K1xx registers with the default
/// [Config]. The default geometry always passes [Config::validate].
///
/// # Safety
///
/// See [Mmio::new]: the returned driver must be the only user of the FTFC.
pub unsafe fn s32k_data_flash() -> Result<S32kDataFlash, FtfcError> {
    DataFlash::new(Mmio::new(), BusyWait, Config::default())
}
