use embedded_progmem::{ProgMemError, ProgMemErrorKind};

use crate::command::Status;

/// Error type for the FTFC data-flash driver.
///
/// Command failures carry the FSTAT snapshot so callers can tell a protection
/// violation from an access error. Transient and permanent faults are not
/// distinguished, and nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FtfcError {
    /// Sector erase failed.
    /// This can happen if the sector is protected or the address is illegal.
    #[error("Erase failed, FSTAT {0:?}")]
    EraseFailed(Status),
    /// Read 1s check after the erase found programmed bits
    #[error("Erase verify failed, FSTAT {0:?}")]
    EraseVerifyFailed(Status),
    /// Phrase program failed.
    /// Phrases programmed before the failing one stay programmed.
    #[error("Program failed, FSTAT {0:?}")]
    ProgramFailed(Status),
    /// Partition command rejected, typically because the device is already partitioned
    #[error("Partition failed, FSTAT {0:?}")]
    PartitionFailed(Status),
    /// Requested page or bytes out of bounds
    #[error("Requested page or bytes out of bounds")]
    OutOfBounds,
    /// Requested length not a whole number of write units
    #[error("Requested length not aligned to the write unit")]
    NotAligned,
    /// The geometry does not fit the controller: the write unit must match
    /// the phrase window and a sector must fit one verify command
    #[error("Geometry not supported by the controller")]
    UnsupportedGeometry,
}

impl FtfcError {
    /// FSTAT snapshot of the failed command, if the error came from one
    pub fn status(&self) -> Option<Status> {
        match self {
            FtfcError::EraseFailed(status)
            | FtfcError::EraseVerifyFailed(status)
            | FtfcError::ProgramFailed(status)
            | FtfcError::PartitionFailed(status) => Some(*status),
            FtfcError::OutOfBounds | FtfcError::NotAligned | FtfcError::UnsupportedGeometry => {
                None
            }
        }
    }
}

// Convert to the generic kind used by the storage layer
impl ProgMemError for FtfcError {
    fn kind(&self) -> ProgMemErrorKind {
        match self {
            FtfcError::EraseFailed(_) => ProgMemErrorKind::Io,
            FtfcError::EraseVerifyFailed(_) => ProgMemErrorKind::Io,
            FtfcError::ProgramFailed(_) => ProgMemErrorKind::Io,
            FtfcError::PartitionFailed(_) => ProgMemErrorKind::Io,
            FtfcError::OutOfBounds => ProgMemErrorKind::InvalidAddress,
            FtfcError::NotAligned => ProgMemErrorKind::InvalidArgument,
            FtfcError::UnsupportedGeometry => ProgMemErrorKind::InvalidArgument,
        }
    }
}

// This impl is only for the check_read / check_write helpers
impl From<ProgMemErrorKind> for FtfcError {
    fn from(kind: ProgMemErrorKind) -> Self {
        match kind {
            ProgMemErrorKind::InvalidArgument => FtfcError::NotAligned,
            _ => FtfcError::OutOfBounds,
        }
    }
}
