use crate::{BlockIndex, ByteAddress, PageIndex, ProgMemErrorKind};

/// Fixed layout of a uniform program memory region.
///
/// Every page has the same size and every erase block (sector) has the same
/// size. The value is immutable once built; drivers take it by value at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    start_address: u32,
    page_size: u32,
    block_size: u32,
    page_count: u32,
    block_count: u32,
    write_unit: u32,
}

impl Geometry {
    /// S32K1xx FlexNVM data-flash: 32 sectors of 2 KiB mapped at 0x1000_0000,
    /// programmed in 8 byte phrases.
    pub const S32K1XX_DFLASH: Geometry = Geometry {
        start_address: 0x1000_0000,
        page_size: 8,
        block_size: 2048,
        page_count: 2048 * 32 / 8,
        block_count: 32,
        write_unit: 8,
    };

    /// Build a geometry, deriving the page count from the block layout.
    ///
    /// # Errors
    ///
    /// [ProgMemErrorKind::InvalidArgument] if any size is zero, if the block size
    /// is not a whole number of pages, or if pages are not a whole number of
    /// write units.
    pub fn new(
        start_address: u32,
        page_size: u32,
        block_size: u32,
        block_count: u32,
        write_unit: u32,
    ) -> Result<Self, ProgMemErrorKind> {
        if page_size == 0 || block_size == 0 || block_count == 0 || write_unit == 0 {
            return Err(ProgMemErrorKind::InvalidArgument);
        }
        if block_size % page_size != 0 || page_size % write_unit != 0 {
            return Err(ProgMemErrorKind::InvalidArgument);
        }
        let page_count = (block_size / page_size)
            .checked_mul(block_count)
            .ok_or(ProgMemErrorKind::InvalidArgument)?;
        block_size
            .checked_mul(block_count)
            .ok_or(ProgMemErrorKind::InvalidArgument)?;
        Ok(Geometry {
            start_address,
            page_size,
            block_size,
            page_count,
            block_count,
            write_unit,
        })
    }

    pub const fn start_address(&self) -> u32 {
        self.start_address
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    pub const fn page_count(&self) -> u32 {
        self.page_count
    }

    pub const fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Size of the smallest programmable unit (phrase)
    pub const fn write_unit(&self) -> u32 {
        self.write_unit
    }

    pub const fn pages_per_block(&self) -> u32 {
        self.block_size / self.page_size
    }

    pub const fn capacity(&self) -> u32 {
        self.block_size * self.block_count
    }

    /// Always true, pages and blocks share one size each.
    pub const fn is_uniform(&self) -> bool {
        true
    }

    /// Strip the region start from an absolute address. Addresses below the
    /// start are taken as already relative.
    pub fn normalize(&self, addr: ByteAddress) -> u32 {
        if addr.0 >= self.start_address {
            addr.0 - self.start_address
        } else {
            addr.0
        }
    }

    /// Page containing `addr`. Not bounds checked: an address past the end
    /// gives a page index past the end.
    pub fn page_of(&self, addr: ByteAddress) -> PageIndex {
        PageIndex(self.normalize(addr) / self.page_size)
    }

    /// Absolute address of the first byte of `page`. Not bounds checked.
    pub fn address_of(&self, page: PageIndex) -> ByteAddress {
        ByteAddress(
            self.start_address
                .wrapping_add(page.as_byte_offset(self.page_size)),
        )
    }

    /// Erase block containing `addr`. Not bounds checked.
    pub fn block_of(&self, addr: ByteAddress) -> BlockIndex {
        BlockIndex(self.normalize(addr) / self.block_size)
    }

    /// Absolute address of the first byte of `block`. Not bounds checked.
    pub fn block_address(&self, block: BlockIndex) -> ByteAddress {
        ByteAddress(
            self.start_address
                .wrapping_add(block.as_byte_offset(self.block_size)),
        )
    }

    pub fn contains_page(&self, page: PageIndex) -> bool {
        page.0 < self.page_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn page_address_round_trip() {
        let geometry = Geometry::S32K1XX_DFLASH;
        for page in 0..geometry.page_count() {
            let page = PageIndex::new(page);
            assert_eq!(geometry.page_of(geometry.address_of(page)), page);
        }
    }

    #[test]
    fn relative_and_absolute_addresses_agree() {
        let geometry = Geometry::new(0x2000, 256, 1024, 4, 8).unwrap();
        assert_eq!(
            geometry.page_of(ByteAddress::new(0x2000 + 300)),
            geometry.page_of(ByteAddress::new(300))
        );
        assert_eq!(geometry.page_of(ByteAddress::new(300)), PageIndex::new(1));
        assert_eq!(geometry.block_of(ByteAddress::new(0x2000 + 1024)), BlockIndex::new(1));
        assert_eq!(geometry.block_address(BlockIndex::new(3)), ByteAddress::new(0x2C00));
    }

    #[test]
    fn out_of_range_is_not_clamped() {
        let geometry = Geometry::new(0, 64, 256, 2, 8).unwrap();
        assert_eq!(geometry.page_of(ByteAddress::new(10 * 64)), PageIndex::new(10));
        assert!(!geometry.contains_page(PageIndex::new(10)));
        assert_eq!(geometry.address_of(PageIndex::new(10)), ByteAddress::new(640));
    }

    #[test]
    fn derived_counts() {
        let geometry = Geometry::S32K1XX_DFLASH;
        assert_eq!(geometry.pages_per_block(), 256);
        assert_eq!(geometry.page_count(), 8192);
        assert_eq!(geometry.capacity(), 64 * 1024);
        assert!(geometry.is_uniform());
        assert_eq!(
            Geometry::new(0x1000_0000, 8, 2048, 32, 8).unwrap(),
            Geometry::S32K1XX_DFLASH
        );
    }

    #[test]
    fn rejects_non_uniform_layouts() {
        assert_eq!(
            Geometry::new(0, 100, 256, 2, 4),
            Err(ProgMemErrorKind::InvalidArgument)
        );
        assert_eq!(
            Geometry::new(0, 64, 256, 2, 48),
            Err(ProgMemErrorKind::InvalidArgument)
        );
        assert_eq!(Geometry::new(0, 0, 256, 2, 8), Err(ProgMemErrorKind::InvalidArgument));
    }
}
