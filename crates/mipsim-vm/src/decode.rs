use crate::cpu::Register;

const OPCODE_MASK: u32 = 0xFC00_0000;
const RS_MASK: u32 = 0x03E0_0000;
const RT_MASK: u32 = 0x001F_0000;
const RD_MASK: u32 = 0x0000_F800;
const SHAMT_MASK: u32 = 0x0000_07C0;
const FUNCT_MASK: u32 = 0x0000_003F;
const IMM_MASK: u32 = 0x0000_FFFF;
const JIMM_MASK: u32 = 0x03FF_FFFF;

/// Every field of an instruction word, sliced per the R/I/J layouts.
///
/// Decoding cannot fail: all fields are extracted regardless of which
/// layout the opcode actually uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFields {
    pub word: u32,
    pub opcode: u8,
    pub rs: u8,
    pub rt: u8,
    pub rd: u8,
    pub shamt: u8,
    pub funct: u8,
    pub imm: u16,
    pub jimm: u32,
}

impl DecodedFields {
    pub fn decode(word: u32) -> Self {
        Self {
            word,
            opcode: ((word & OPCODE_MASK) >> 26) as u8,
            rs: ((word & RS_MASK) >> 21) as u8,
            rt: ((word & RT_MASK) >> 16) as u8,
            rd: ((word & RD_MASK) >> 11) as u8,
            shamt: ((word & SHAMT_MASK) >> 6) as u8,
            funct: (word & FUNCT_MASK) as u8,
            imm: (word & IMM_MASK) as u16,
            jimm: word & JIMM_MASK,
        }
    }

    pub fn rs_reg(&self) -> Register {
        Register::from_field(self.rs.into())
    }

    pub fn rt_reg(&self) -> Register {
        Register::from_field(self.rt.into())
    }

    pub fn rd_reg(&self) -> Register {
        Register::from_field(self.rd.into())
    }

    pub fn imm_sext(&self) -> u32 {
        self.imm as i16 as i32 as u32
    }

    pub fn imm_zext(&self) -> u32 {
        u32::from(self.imm)
    }

    /// Branch displacement in bytes.
    pub fn branch_offset(&self) -> u32 {
        self.imm_sext() << 2
    }

    /// COP0 selector for MFC0/MTC0.
    pub fn sel(&self) -> u8 {
        self.funct & 0x7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_type_fields() {
        // add $t4, $v0, $v1
        let f = DecodedFields::decode(0x0043_6020);
        assert_eq!(f.opcode, 0);
        assert_eq!(f.rs, 2);
        assert_eq!(f.rt, 3);
        assert_eq!(f.rd, 12);
        assert_eq!(f.shamt, 0);
        assert_eq!(f.funct, 0x20);
    }

    #[test]
    fn i_type_immediates() {
        // addi $v0, $zero, -200
        let f = DecodedFields::decode(0x2002_FF38);
        assert_eq!(f.opcode, 0x08);
        assert_eq!(f.rt, 2);
        assert_eq!(f.imm, 0xFF38);
        assert_eq!(f.imm_sext(), (-200i32) as u32);
        assert_eq!(f.imm_zext(), 0xFF38);
        assert_eq!(f.branch_offset(), (-800i32) as u32);
    }

    #[test]
    fn j_type_target() {
        let f = DecodedFields::decode(0x0C10_0000);
        assert_eq!(f.opcode, 0x03);
        assert_eq!(f.jimm, 0x0010_0000);
    }

    #[test]
    fn cop0_selector() {
        // mfc0 $t0, $16, 1
        let f = DecodedFields::decode(0x4008_8001);
        assert_eq!(f.opcode, 0x10);
        assert_eq!(f.rs, 0);
        assert_eq!(f.rt, 8);
        assert_eq!(f.rd, 16);
        assert_eq!(f.sel(), 1);
    }
}
