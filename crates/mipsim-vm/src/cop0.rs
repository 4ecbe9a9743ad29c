use crate::error::ConfigError;
use bitflags::bitflags;

/// Access policy of a single control register bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitPolicy {
    /// Never changes after reset.
    Locked,
    /// Readable by software, writable only by the hardware path.
    ReadOnly,
    /// Readable and writable by software.
    ReadWrite,
}

/// A 32-bit system-control register with a per-bit access policy.
///
/// The policy is derived at construction from two masks: a bit set in
/// `mask1` is visible (read-only unless also set in `mask2`), a bit set in
/// both is software-writable. A bit set only in `mask2` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemControlRegister {
    value: u32,
    mask1: u32,
    mask2: u32,
}

impl SystemControlRegister {
    pub fn new(reset: u32, mask1: u32, mask2: u32) -> Result<Self, ConfigError> {
        let invalid = mask2 & !mask1;
        if invalid != 0 {
            return Err(ConfigError::InvalidMask {
                bit: invalid.trailing_zeros(),
                mask1,
                mask2,
            });
        }
        Ok(Self {
            value: reset,
            mask1,
            mask2,
        })
    }

    pub fn read(&self) -> u32 {
        self.value
    }

    pub fn policy(&self, bit: u32) -> BitPolicy {
        let bit = 1u32 << (bit & 31);
        match (self.mask1 & bit != 0, self.mask2 & bit != 0) {
            (true, true) => BitPolicy::ReadWrite,
            (true, false) => BitPolicy::ReadOnly,
            _ => BitPolicy::Locked,
        }
    }

    /// Bits an MTC0 may change.
    pub fn software_mask(&self) -> u32 {
        self.mask1 & self.mask2
    }

    /// Write as MTC0 does: only ReadWrite bits take the new value.
    pub fn write_software(&mut self, val: u32) {
        let writable = self.software_mask();
        self.value = (self.value & !writable) | (val & writable);
    }

    /// Write as the processor itself does: everything but Locked bits.
    pub fn write_hardware(&mut self, val: u32) {
        self.value = (self.value & !self.mask1) | (val & self.mask1);
    }
}

/// Address of a register in the bank: register number and selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cop0Reg {
    pub num: u8,
    pub sel: u8,
}

impl Cop0Reg {
    pub const INDEX: Cop0Reg = Cop0Reg::new(0, 0);
    pub const RANDOM: Cop0Reg = Cop0Reg::new(1, 0);
    pub const ENTRY_LO0: Cop0Reg = Cop0Reg::new(2, 0);
    pub const ENTRY_LO1: Cop0Reg = Cop0Reg::new(3, 0);
    pub const CONTEXT: Cop0Reg = Cop0Reg::new(4, 0);
    pub const PAGE_MASK: Cop0Reg = Cop0Reg::new(5, 0);
    pub const WIRED: Cop0Reg = Cop0Reg::new(6, 0);
    pub const BAD_VADDR: Cop0Reg = Cop0Reg::new(8, 0);
    pub const COUNT: Cop0Reg = Cop0Reg::new(9, 0);
    pub const ENTRY_HI: Cop0Reg = Cop0Reg::new(10, 0);
    pub const COMPARE: Cop0Reg = Cop0Reg::new(11, 0);
    pub const STATUS: Cop0Reg = Cop0Reg::new(12, 0);
    pub const INT_CTL: Cop0Reg = Cop0Reg::new(12, 1);
    pub const CAUSE: Cop0Reg = Cop0Reg::new(13, 0);
    pub const EPC: Cop0Reg = Cop0Reg::new(14, 0);
    pub const PRID: Cop0Reg = Cop0Reg::new(15, 0);
    pub const EBASE: Cop0Reg = Cop0Reg::new(15, 1);
    pub const CONFIG0: Cop0Reg = Cop0Reg::new(16, 0);
    pub const CONFIG1: Cop0Reg = Cop0Reg::new(16, 1);
    pub const CONFIG2: Cop0Reg = Cop0Reg::new(16, 2);
    pub const CONFIG3: Cop0Reg = Cop0Reg::new(16, 3);
    pub const LL_ADDR: Cop0Reg = Cop0Reg::new(17, 0);
    pub const WATCH_LO: Cop0Reg = Cop0Reg::new(18, 0);
    pub const WATCH_HI: Cop0Reg = Cop0Reg::new(19, 0);
    pub const XCONTEXT: Cop0Reg = Cop0Reg::new(20, 0);
    pub const ERROR_EPC: Cop0Reg = Cop0Reg::new(30, 0);

    /// Out-of-range fields are masked to 5 and 3 bits.
    pub const fn new(num: u8, sel: u8) -> Self {
        Self {
            num: num & 0x1F,
            sel: sel & 0x7,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = match (self.num, self.sel) {
            (0, 0) => "Index",
            (1, 0) => "Random",
            (2, 0) => "EntryLo0",
            (3, 0) => "EntryLo1",
            (4, 0) => "Context",
            (5, 0) => "PageMask",
            (6, 0) => "Wired",
            (8, 0) => "BadVAddr",
            (9, 0) => "Count",
            (10, 0) => "EntryHi",
            (11, 0) => "Compare",
            (12, 0) => "Status",
            (12, 1) => "IntCtl",
            (13, 0) => "Cause",
            (14, 0) => "EPC",
            (15, 0) => "PRId",
            (15, 1) => "EBase",
            (16, 0) => "Config",
            (16, 1) => "Config1",
            (16, 2) => "Config2",
            (16, 3) => "Config3",
            (17, 0) => "LLAddr",
            (18, 0) => "WatchLo",
            (19, 0) => "WatchHi",
            (20, 0) => "XContext",
            (30, 0) => "ErrorEPC",
            _ => return None,
        };
        Some(name)
    }
}

impl core::fmt::Display for Cop0Reg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "cop0[{}, {}]", self.num, self.sel),
        }
    }
}

bitflags! {
    /// Status register (12, 0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const IE = 1 << 0;
        const EXL = 1 << 1;
        const ERL = 1 << 2;
        const UM = 1 << 4;
        const IM0 = 1 << 8;
        const IM1 = 1 << 9;
        const IM2 = 1 << 10;
        const IM3 = 1 << 11;
        const IM4 = 1 << 12;
        const IM5 = 1 << 13;
        const IM6 = 1 << 14;
        const IM7 = 1 << 15;
        const NMI = 1 << 19;
        const SR = 1 << 20;
        const TS = 1 << 21;
        const BEV = 1 << 22;
        const RE = 1 << 25;
        const FR = 1 << 26;
        const RP = 1 << 27;
        const CU0 = 1 << 28;
        const CU1 = 1 << 29;
        const CU2 = 1 << 30;
        const CU3 = 1 << 31;
    }
}

impl Status {
    /// Interrupt mask bit for pin `irq` (0-7).
    pub fn im(irq: u8) -> Status {
        Status::from_bits_retain(1 << (8 + u32::from(irq & 7)))
    }
}

bitflags! {
    /// Cause register (13, 0).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cause: u32 {
        const IP0 = 1 << 8;
        const IP1 = 1 << 9;
        const IP2 = 1 << 10;
        const IP3 = 1 << 11;
        const IP4 = 1 << 12;
        const IP5 = 1 << 13;
        const IP6 = 1 << 14;
        const IP7 = 1 << 15;
        const WP = 1 << 22;
        const IV = 1 << 23;
        const PCI = 1 << 26;
        const DC = 1 << 27;
        const CE = 0b11 << 28;
        const TI = 1 << 30;
        const BD = 1 << 31;
    }
}

impl Cause {
    pub const EXC_CODE_SHIFT: u32 = 2;
    pub const EXC_CODE_MASK: u32 = 0x1F << Self::EXC_CODE_SHIFT;

    /// Pending bit for interrupt pin `irq` (0-7).
    pub fn ip(irq: u8) -> Cause {
        Cause::from_bits_retain(1 << (8 + u32::from(irq & 7)))
    }

    pub fn exc_code(&self) -> u8 {
        ((self.bits() & Self::EXC_CODE_MASK) >> Self::EXC_CODE_SHIFT) as u8
    }
}

/// Number of entries in the TLB data table.
pub const TLB_ENTRIES: u32 = 16;

/// (register, reset value, mask1, mask2)
const LAYOUT: &[(Cop0Reg, u32, u32, u32)] = &[
    (Cop0Reg::INDEX, 0, 0x8000_003F, 0x0000_003F),
    (Cop0Reg::RANDOM, TLB_ENTRIES - 1, 0x0000_003F, 0),
    (Cop0Reg::ENTRY_LO0, 0, 0xFFFF_FFFF, 0x7FFF_FFFF),
    (Cop0Reg::ENTRY_LO1, 0, 0xFFFF_FFFF, 0x7FFF_FFFF),
    (Cop0Reg::CONTEXT, 0, 0xFFFF_FFF0, 0xFF80_0000),
    (Cop0Reg::PAGE_MASK, 0, 0x1FFF_F000, 0x1FFF_F000),
    (Cop0Reg::WIRED, 0, 0x0000_003F, 0x0000_003F),
    (Cop0Reg::BAD_VADDR, 0, 0xFFFF_FFFF, 0),
    (Cop0Reg::COUNT, 0, 0xFFFF_FFFF, 0xFFFF_FFFF),
    (Cop0Reg::ENTRY_HI, 0, 0xFFFF_E0FF, 0xFFFF_E0FF),
    (Cop0Reg::COMPARE, 0, 0xFFFF_FFFF, 0xFFFF_FFFF),
    // Reset with BEV and ERL set: boot vectors, interrupts held off.
    (Cop0Reg::STATUS, 0x0040_0004, 0xFE78_FF17, 0x1A78_FF17),
    // IPTI: the timer is wired to IP7.
    (Cop0Reg::INT_CTL, 0xE000_0000, 0xFC00_03E0, 0x0000_03E0),
    (Cop0Reg::CAUSE, 0, 0xFCC0_FF7C, 0x08C0_0300),
    (Cop0Reg::EPC, 0, 0xFFFF_FFFF, 0xFFFF_FFFF),
    (Cop0Reg::PRID, 0x0001_9300, 0x00FF_FFFF, 0),
    (Cop0Reg::EBASE, 0x8000_0000, 0xFFFF_F3FF, 0x3FFF_F000),
    // M, BE (big-endian), AR=1 (release 2), MT=1 (TLB), K0=2 (uncached).
    (Cop0Reg::CONFIG0, 0x8000_8482, 0xFFFF_FFFF, 0x0000_0007),
    // M, MMUSize = entries - 1, no caches, no FPU.
    (
        Cop0Reg::CONFIG1,
        0x8000_0000 | ((TLB_ENTRIES - 1) << 25),
        0xFFFF_FFFF,
        0,
    ),
    (Cop0Reg::CONFIG2, 0x8000_0000, 0xFFFF_FFFF, 0),
    (Cop0Reg::CONFIG3, 0, 0xFFFF_FFFF, 0),
    (Cop0Reg::LL_ADDR, 0, 0xFFFF_FFFF, 0),
    (Cop0Reg::WATCH_LO, 0, 0xFFFF_FFFF, 0xFFFF_FFFF),
    (Cop0Reg::WATCH_HI, 0, 0x40FF_0FFF, 0x40FF_0FF8),
    // 64-bit only; present but locked at zero on a 32-bit core.
    (Cop0Reg::XCONTEXT, 0, 0, 0),
    (Cop0Reg::ERROR_EPC, 0, 0xFFFF_FFFF, 0xFFFF_FFFF),
];

/// The system-control coprocessor register bank, indexed by
/// (register number, selector). Unpopulated slots are reserved: they read
/// as zero and ignore writes.
#[derive(Debug, Clone)]
pub struct Cop0 {
    regs: [[Option<SystemControlRegister>; 8]; 32],
}

impl Cop0 {
    pub fn new() -> Result<Self, ConfigError> {
        let mut regs = [[None; 8]; 32];
        for &(reg, reset, mask1, mask2) in LAYOUT {
            let scr = SystemControlRegister::new(reset, mask1, mask2).map_err(|source| {
                ConfigError::Register {
                    reg: reg.num,
                    sel: reg.sel,
                    source: Box::new(source),
                }
            })?;
            regs[reg.num as usize][reg.sel as usize] = Some(scr);
        }
        Ok(Self { regs })
    }

    pub fn get(&self, reg: Cop0Reg) -> Option<&SystemControlRegister> {
        self.regs[reg.num as usize][reg.sel as usize].as_ref()
    }

    fn get_mut(&mut self, reg: Cop0Reg) -> Option<&mut SystemControlRegister> {
        self.regs[reg.num as usize][reg.sel as usize].as_mut()
    }

    pub fn is_implemented(&self, reg: Cop0Reg) -> bool {
        self.get(reg).is_some()
    }

    pub fn read(&self, reg: Cop0Reg) -> u32 {
        self.get(reg).map_or(0, SystemControlRegister::read)
    }

    /// MTC0 write path. Returns the bits actually changed.
    pub fn write_software(&mut self, reg: Cop0Reg, val: u32) -> u32 {
        match self.get_mut(reg) {
            Some(scr) => {
                let old = scr.read();
                scr.write_software(val);
                old ^ scr.read()
            }
            None => 0,
        }
    }

    pub fn write_hardware(&mut self, reg: Cop0Reg, val: u32) {
        if let Some(scr) = self.get_mut(reg) {
            scr.write_hardware(val);
        }
    }

    pub fn set_hardware(&mut self, reg: Cop0Reg, bits: u32) {
        let val = self.read(reg) | bits;
        self.write_hardware(reg, val);
    }

    pub fn clear_hardware(&mut self, reg: Cop0Reg, bits: u32) {
        let val = self.read(reg) & !bits;
        self.write_hardware(reg, val);
    }

    pub fn status(&self) -> Status {
        Status::from_bits_retain(self.read(Cop0Reg::STATUS))
    }

    pub fn cause(&self) -> Cause {
        Cause::from_bits_retain(self.read(Cop0Reg::CAUSE))
    }

    /// Advance the per-cycle counters: Count increments, Random walks down
    /// from the top TLB index to Wired and wraps. Returns true when Count
    /// reaches a non-zero Compare, in which case Cause.TI is already set.
    pub fn tick(&mut self) -> bool {
        let count = self.read(Cop0Reg::COUNT).wrapping_add(1);
        self.write_hardware(Cop0Reg::COUNT, count);

        let wired = self.read(Cop0Reg::WIRED) % TLB_ENTRIES;
        let random = self.read(Cop0Reg::RANDOM);
        let next = if random <= wired || random >= TLB_ENTRIES {
            TLB_ENTRIES - 1
        } else {
            random - 1
        };
        self.write_hardware(Cop0Reg::RANDOM, next);

        let compare = self.read(Cop0Reg::COMPARE);
        if compare != 0 && count == compare {
            self.set_hardware(Cop0Reg::CAUSE, Cause::TI.bits());
            return true;
        }
        false
    }
}
