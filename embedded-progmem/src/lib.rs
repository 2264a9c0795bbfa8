#![cfg_attr(not(test), no_std)]

mod address;
mod geometry;
pub use address::{BlockIndex, ByteAddress, PageIndex};
pub use geometry::Geometry;

pub trait ProgMemError: core::fmt::Debug {
    /// Convert a specific program memory error into a generic error kind
    fn kind(&self) -> ProgMemErrorKind;
}

/// A trait that ProgMem implementations can use to share an error type.
pub trait ErrorType {
    /// Errors returned by this program memory.
    type Error: ProgMemError;
}

/// Program memory error kinds.
///
/// Implementations must map their error to those generic error kinds through the
/// [`ProgMemError`] trait. Each kind has a fixed negative error code, see
/// [`ProgMemErrorKind::errno`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ProgMemErrorKind {
    /// The address or page is outside the region.
    InvalidAddress,

    /// The length is not a whole number of write units, or the layout is invalid.
    InvalidArgument,

    /// The flash controller reported a failed command.
    Io,

    /// Access to a write protected area.
    ///
    /// Reserved: no driver in this workspace reports it yet.
    ReadOnly,

    /// Insufficient permissions (read/write protected).
    ///
    /// Reserved: no driver in this workspace reports it yet.
    AccessDenied,
}

impl ProgMemErrorKind {
    /// Negative error code for the signed count-or-error channel.
    pub const fn errno(&self) -> i32 {
        match self {
            ProgMemErrorKind::InvalidAddress => -14, // EFAULT
            ProgMemErrorKind::InvalidArgument => -22, // EINVAL
            ProgMemErrorKind::Io => -5,              // EIO
            ProgMemErrorKind::ReadOnly => -30,       // EROFS
            ProgMemErrorKind::AccessDenied => -13,   // EACCES
        }
    }
}

impl ProgMemError for ProgMemErrorKind {
    fn kind(&self) -> ProgMemErrorKind {
        *self
    }
}

impl core::fmt::Display for ProgMemErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ProgMemErrorKind::InvalidAddress => "invalid address",
            ProgMemErrorKind::InvalidArgument => "invalid argument",
            ProgMemErrorKind::Io => "flash command failed",
            ProgMemErrorKind::ReadOnly => "write protected",
            ProgMemErrorKind::AccessDenied => "access denied",
        };
        f.write_str(msg)
    }
}

/// Fold a byte count result into a single signed value: the count on
/// success, the negative error code of the error kind otherwise.
pub fn into_ssize<E: ProgMemError>(result: Result<usize, E>) -> isize {
    match result {
        Ok(count) => count as isize,
        Err(e) => e.kind().errno() as isize,
    }
}

/// Uniform, memory mapped program memory as seen by a storage layer.
///
/// Addresses passed in may be absolute (inside the memory map) or relative to
/// the start of the region; both resolve through [Geometry::normalize].
pub trait ProgMem: ErrorType {
    /// Fixed layout of the region
    fn geometry(&self) -> &Geometry;

    /// Number of erase blocks
    fn block_count(&self) -> usize {
        self.geometry().block_count() as usize
    }

    /// Whether all pages and all erase blocks have the same size
    fn is_uniform(&self) -> bool {
        self.geometry().is_uniform()
    }

    /// Read/write page size in bytes
    fn page_size(&self) -> usize {
        self.geometry().page_size() as usize
    }

    /// Erase block size in bytes
    fn erase_size(&self) -> usize {
        self.geometry().block_size() as usize
    }

    /// Address to page conversion. Not bounds checked.
    fn page_of(&self, addr: ByteAddress) -> PageIndex {
        self.geometry().page_of(addr)
    }

    /// Page to absolute address conversion. Not bounds checked.
    fn address_of(&self, page: PageIndex) -> ByteAddress {
        self.geometry().address_of(page)
    }

    /// Address to erase block conversion. Not bounds checked.
    fn block_of(&self, addr: ByteAddress) -> BlockIndex {
        self.geometry().block_of(addr)
    }

    /// Erase block to absolute address conversion. Not bounds checked.
    fn block_address(&self, block: BlockIndex) -> ByteAddress {
        self.geometry().block_address(block)
    }

    /// Erase one block, returning the number of bytes erased.
    ///
    /// The block index is not range checked.
    ///
    /// # Errors
    ///
    /// [ProgMemErrorKind::Io] if the controller reports the erase failed.
    fn erase_block(&mut self, block: BlockIndex) -> Result<usize, Self::Error>;

    /// Scan a page for programmed bytes.
    ///
    /// Returns the number of bytes from the first byte that is not erased to
    /// the end of the page, so `0` means the whole page is erased.
    ///
    /// # Errors
    ///
    /// [ProgMemErrorKind::InvalidAddress] if the page is outside the region.
    fn is_page_erased(&mut self, page: PageIndex) -> Result<usize, Self::Error>;

    /// Program `bytes` at `addr`, returning the number of bytes written.
    ///
    /// Not limited to a single page. If a unit fails part way through, units
    /// already programmed stay programmed.
    ///
    /// # Errors
    ///
    /// [ProgMemErrorKind::InvalidArgument] if the length is not a multiple of the
    /// write unit, [ProgMemErrorKind::Io] if the controller reports a failure.
    fn write(&mut self, addr: ByteAddress, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Copy mapped flash bytes starting at `addr` into `bytes`.
    ///
    /// # Errors
    ///
    /// [ProgMemErrorKind::InvalidAddress] if the range leaves the region.
    fn read(&mut self, addr: ByteAddress, bytes: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Return whether a read of `length` bytes at `addr` stays inside the region.
pub fn check_read(
    geometry: &Geometry,
    addr: ByteAddress,
    length: usize,
) -> Result<(), ProgMemErrorKind> {
    let offset = geometry.normalize(addr) as u64;
    if offset + length as u64 > geometry.capacity() as u64 {
        return Err(ProgMemErrorKind::InvalidAddress);
    }
    Ok(())
}

/// Return whether a write length is a whole number of write units.
///
/// Only the length is checked, the address is taken as given.
pub fn check_write(geometry: &Geometry, length: usize) -> Result<(), ProgMemErrorKind> {
    if length % geometry.write_unit() as usize != 0 {
        return Err(ProgMemErrorKind::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn error_codes() {
        assert_eq!(ProgMemErrorKind::InvalidAddress.errno(), -14);
        assert_eq!(ProgMemErrorKind::InvalidArgument.errno(), -22);
        assert_eq!(ProgMemErrorKind::Io.errno(), -5);
        assert_eq!(ProgMemErrorKind::ReadOnly.errno(), -30);
        assert_eq!(ProgMemErrorKind::AccessDenied.errno(), -13);
    }

    #[test]
    fn ssize_channel() {
        assert_eq!(into_ssize::<ProgMemErrorKind>(Ok(2048)), 2048);
        assert_eq!(into_ssize(Err::<usize, _>(ProgMemErrorKind::Io)), -5);
        assert_eq!(into_ssize(Err::<usize, _>(ProgMemErrorKind::InvalidArgument)), -22);
    }

    #[test]
    fn write_length_must_be_whole_units() {
        let geometry = Geometry::S32K1XX_DFLASH;
        assert_eq!(check_write(&geometry, 16), Ok(()));
        assert_eq!(check_write(&geometry, 0), Ok(()));
        assert_eq!(
            check_write(&geometry, 12),
            Err(ProgMemErrorKind::InvalidArgument)
        );
    }

    #[test]
    fn reads_stay_in_region() {
        let geometry = Geometry::new(0x1000, 16, 64, 2, 8).unwrap();
        assert_eq!(check_read(&geometry, ByteAddress::new(0x1000), 128), Ok(()));
        assert_eq!(check_read(&geometry, ByteAddress::new(64), 64), Ok(()));
        assert_eq!(
            check_read(&geometry, ByteAddress::new(0x1000 + 65), 64),
            Err(ProgMemErrorKind::InvalidAddress)
        );
    }
}
