use core::ops::Add;

pub const PAGE_SIZE: u32 = 4096;
pub const PAGE_MASK: u32 = PAGE_SIZE - 1;

/// Physical memory address. There is no translation in front of the bus, so
/// every effective address computed by an instruction is used as-is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysAddr(u32);

impl PhysAddr {
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    pub const fn val(&self) -> u32 {
        self.0
    }

    /// Physical frame number: the page-aligned base of this address.
    pub const fn frame(&self) -> u32 {
        self.0 & !PAGE_MASK
    }

    pub const fn page_offset(&self) -> usize {
        (self.0 & PAGE_MASK) as usize
    }
}

impl Add<u32> for PhysAddr {
    type Output = PhysAddr;

    fn add(self, rhs: u32) -> PhysAddr {
        PhysAddr(self.0.wrapping_add(rhs))
    }
}

impl core::fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Byte-addressed, big-endian memory as seen by the core.
///
/// Implementors provide byte access; halfword and word access are composed
/// from it most-significant byte first. No alignment is enforced.
pub trait Memory {
    fn read_byte(&mut self, addr: PhysAddr) -> u8;

    fn write_byte(&mut self, addr: PhysAddr, val: u8);

    fn read_half(&mut self, addr: PhysAddr) -> u16 {
        u16::from_be_bytes([self.read_byte(addr), self.read_byte(addr + 1)])
    }

    fn read_word(&mut self, addr: PhysAddr) -> u32 {
        u32::from_be_bytes([
            self.read_byte(addr),
            self.read_byte(addr + 1),
            self.read_byte(addr + 2),
            self.read_byte(addr + 3),
        ])
    }

    fn write_half(&mut self, addr: PhysAddr, val: u16) {
        for (i, byte) in val.to_be_bytes().into_iter().enumerate() {
            self.write_byte(addr + i as u32, byte);
        }
    }

    fn write_word(&mut self, addr: PhysAddr, val: u32) {
        for (i, byte) in val.to_be_bytes().into_iter().enumerate() {
            self.write_byte(addr + i as u32, byte);
        }
    }
}

/// One 4 KiB physical frame.
pub struct Page {
    data: Box<[u8; PAGE_SIZE as usize]>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; PAGE_SIZE as usize]),
        }
    }

    pub fn read_byte(&self, addr: PhysAddr) -> u8 {
        self.data[addr.page_offset()]
    }

    pub fn write_byte(&mut self, addr: PhysAddr, val: u8) {
        self.data[addr.page_offset()] = val;
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_and_offset_split() {
        let addr = PhysAddr::new(0x0040_1234);
        assert_eq!(addr.frame(), 0x0040_1000);
        assert_eq!(addr.page_offset(), 0x234);
    }

    #[test]
    fn address_arithmetic_wraps() {
        assert_eq!(PhysAddr::new(0xFFFF_FFFF) + 1, PhysAddr::new(0));
    }

    #[test]
    fn page_starts_zeroed() {
        let mut page = Page::new();
        assert_eq!(page.read_byte(PhysAddr::new(0xFFF)), 0);
        page.write_byte(PhysAddr::new(0x1FFF), 0xAB);
        assert_eq!(page.read_byte(PhysAddr::new(0xFFF)), 0xAB);
    }
}
