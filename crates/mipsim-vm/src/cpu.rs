#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0); // $zero, hard-wired
    pub const AT: Register = Register(1);
    pub const V0: Register = Register(2);
    pub const A0: Register = Register(4);
    pub const K0: Register = Register(26);
    pub const K1: Register = Register(27);
    pub const GP: Register = Register(28);
    pub const SP: Register = Register(29);
    pub const FP: Register = Register(30);
    pub const RA: Register = Register(31); // link register for JAL/BxxAL

    /// Builds a register from a 5-bit instruction field. Upper bits are ignored.
    pub const fn from_field(field: u32) -> Self {
        Register((field & 0x1F) as u8)
    }

    pub fn new(num: u8) -> Option<Self> {
        if num < 32 {
            Some(Register(num))
        } else {
            None
        }
    }

    pub fn val(&self) -> usize {
        self.0 as usize
    }

    pub fn abi_name(&self) -> &'static str {
        ABI_NAMES[self.val()]
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "${}", self.abi_name())
    }
}

const ABI_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "s8", "ra",
];

/// Integer register state of the core: the 32 GPRs plus PC, IR, HI and LO.
///
/// Register 0 is muted: every write to it is discarded here, so no
/// instruction has to special-case a `$zero` destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub pc: u32,
    pub ir: u32,
    pub hi: u32,
    pub lo: u32,
    regs: [u32; 32],
}

impl Cpu {
    pub fn new(entry_point: u32) -> Self {
        Self {
            pc: entry_point,
            ir: 0,
            hi: 0,
            lo: 0,
            regs: [0; 32],
        }
    }

    pub fn read_reg(&self, reg: Register) -> u32 {
        self.regs[reg.val()]
    }

    pub fn write_reg(&mut self, reg: Register, val: u32) {
        if reg != Register::ZERO {
            self.regs[reg.val()] = val;
        }
    }

    pub fn regs(&self) -> &[u32; 32] {
        &self.regs
    }
}

/// Two-stage branch-delay state.
///
/// A taken branch sets `delay` and `target`. The next fetch is the delay
/// slot and turns `delay` into `pending`; the fetch after that is redirected
/// to `target`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BranchState {
    pub delay: bool,
    pub pending: bool,
    pub target: u32,
}

impl BranchState {
    pub fn in_flight(&self) -> bool {
        self.delay || self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_register_is_muted() {
        let mut cpu = Cpu::new(0);
        cpu.write_reg(Register::ZERO, 0xDEAD_BEEF);
        assert_eq!(cpu.read_reg(Register::ZERO), 0);

        cpu.write_reg(Register::RA, 0xDEAD_BEEF);
        assert_eq!(cpu.read_reg(Register::RA), 0xDEAD_BEEF);
    }

    #[test]
    fn field_is_masked_to_five_bits() {
        assert_eq!(Register::from_field(0x3F), Register::RA);
        assert_eq!(Register::new(32), None);
        assert_eq!(Register::SP.to_string(), "$sp");
    }
}
