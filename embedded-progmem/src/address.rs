use core::{
    fmt::Display,
    ops::{Add, AddAssign},
};

/// Index of a read/write page in program memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageIndex(pub(crate) u32);

impl PageIndex {
    pub fn new(index: u32) -> Self {
        PageIndex(index)
    }
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Byte offset of the page from the start of the region
    pub fn as_byte_offset(&self, page_size: u32) -> u32 {
        self.0.wrapping_mul(page_size)
    }
}

impl From<PageIndex> for u32 {
    fn from(pa: PageIndex) -> Self {
        pa.as_u32()
    }
}

impl Add<u32> for PageIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        PageIndex(self.0 + rhs)
    }
}

impl Display for PageIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Index of an erase block (sector) in program memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockIndex(pub(crate) u32);

impl BlockIndex {
    pub fn new(index: u32) -> Self {
        BlockIndex(index)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Byte offset of the block from the start of the region
    pub fn as_byte_offset(&self, block_size: u32) -> u32 {
        self.0.wrapping_mul(block_size)
    }
}

impl From<BlockIndex> for u32 {
    fn from(bi: BlockIndex) -> Self {
        bi.as_u32()
    }
}

impl Display for BlockIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Linear address of a byte, either absolute (memory mapped) or relative
/// to the start of the region. [crate::Geometry::normalize] accepts both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteAddress(pub(crate) u32);

impl ByteAddress {
    pub fn new(address: u32) -> Self {
        ByteAddress(address)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ByteAddress {
    fn from(address: u32) -> Self {
        ByteAddress(address)
    }
}

impl From<ByteAddress> for u32 {
    fn from(ba: ByteAddress) -> Self {
        ba.as_u32()
    }
}

impl Add<u32> for ByteAddress {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        ByteAddress(self.0.wrapping_add(rhs))
    }
}

impl AddAssign<u32> for ByteAddress {
    fn add_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl Display for ByteAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn byte_address_arithmetic_wraps() {
        let mut addr = ByteAddress::from(0xFFFF_FFF8);
        assert_eq!(addr + 8, ByteAddress::new(0));
        addr += 16;
        assert_eq!(u32::from(addr), 8);
        assert_eq!(format!("{}", ByteAddress::new(0x1000_0800)), "0x10000800");
    }

    #[test]
    fn index_conversions() {
        assert_eq!(PageIndex::new(3) + 2, PageIndex::new(5));
        assert_eq!(PageIndex::new(3).as_byte_offset(256), 768);
        assert_eq!(BlockIndex::new(2).as_byte_offset(2048), 4096);
        assert_eq!(u32::from(BlockIndex::new(7)), 7);
    }
}
