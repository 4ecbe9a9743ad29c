//! Opcode tables. Each slot either names an instruction or points at the
//! secondary table that resolves it.

use crate::decode::DecodedFields;
use crate::instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Op(Instruction),
    Special,
    RegImm,
    Cop0,
    /// COP0 with the CO bit set: selected by funct.
    Co,
    /// DI/EI, selected by the sc bit.
    Mfmc0,
    Special2,
    Special3,
    /// SEB/SEH/WSBH, selected by the sa field.
    Bshfl,
    /// SRL or ROTR, selected by rs bit 0.
    Srl,
    /// SRLV or ROTRV, selected by sa bit 0.
    Srlv,
}

use Entry::*;
use Instruction as I;

const RES: Entry = Op(I::Reserved);
const UNI: Entry = Op(I::Unimplemented);

#[rustfmt::skip]
static PRIMARY: [Entry; 64] = [
    // 0x00
    Special,      RegImm,       Op(I::J),     Op(I::Jal),
    Op(I::Beq),   Op(I::Bne),   Op(I::Blez),  Op(I::Bgtz),
    // 0x08
    Op(I::Addi),  Op(I::Addiu), Op(I::Slti),  Op(I::Sltiu),
    Op(I::Andi),  Op(I::Ori),   Op(I::Xori),  Op(I::Lui),
    // 0x10: COP1, COP2 and COP1X are not modelled
    Cop0,         UNI,          UNI,          UNI,
    Op(I::Beql),  Op(I::Bnel),  Op(I::Blezl), Op(I::Bgtzl),
    // 0x18
    RES,          RES,          RES,          RES,
    Special2,     RES,          RES,          Special3,
    // 0x20
    Op(I::Lb),    Op(I::Lh),    Op(I::Lwl),   Op(I::Lw),
    Op(I::Lbu),   Op(I::Lhu),   Op(I::Lwr),   RES,
    // 0x28
    Op(I::Sb),    Op(I::Sh),    Op(I::Swl),   Op(I::Sw),
    RES,          RES,          Op(I::Swr),   Op(I::Cache),
    // 0x30: LWC1, LWC2, LDC1, LDC2
    Op(I::Ll),    UNI,          UNI,          Op(I::Pref),
    RES,          UNI,          UNI,          RES,
    // 0x38: SWC1, SWC2, SDC1, SDC2
    Op(I::Sc),    UNI,          UNI,          RES,
    RES,          UNI,          UNI,          RES,
];

#[rustfmt::skip]
static SPECIAL: [Entry; 64] = [
    // 0x00: MOVCI is a floating point condition move
    Op(I::Sll),     UNI,            Srl,            Op(I::Sra),
    Op(I::Sllv),    RES,            Srlv,           Op(I::Srav),
    // 0x08
    Op(I::Jr),      Op(I::Jalr),    Op(I::Movz),    Op(I::Movn),
    Op(I::Syscall), Op(I::Break),   RES,            Op(I::Sync),
    // 0x10
    Op(I::Mfhi),    Op(I::Mthi),    Op(I::Mflo),    Op(I::Mtlo),
    RES,            RES,            RES,            RES,
    // 0x18
    Op(I::Mult),    Op(I::Multu),   Op(I::Div),     Op(I::Divu),
    RES,            RES,            RES,            RES,
    // 0x20
    Op(I::Add),     Op(I::Addu),    Op(I::Sub),     Op(I::Subu),
    Op(I::And),     Op(I::Or),      Op(I::Xor),     Op(I::Nor),
    // 0x28
    RES,            RES,            Op(I::Slt),     Op(I::Sltu),
    RES,            RES,            RES,            RES,
    // 0x30
    Op(I::Tge),     Op(I::Tgeu),    Op(I::Tlt),     Op(I::Tltu),
    Op(I::Teq),     RES,            Op(I::Tne),     RES,
    // 0x38
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
];

#[rustfmt::skip]
static REGIMM: [Entry; 32] = [
    // 0x00
    Op(I::Bltz),    Op(I::Bgez),    Op(I::Bltzl),   Op(I::Bgezl),
    RES,            RES,            RES,            RES,
    // 0x08
    Op(I::Tgei),    Op(I::Tgeiu),   Op(I::Tlti),    Op(I::Tltiu),
    Op(I::Teqi),    RES,            Op(I::Tnei),    RES,
    // 0x10
    Op(I::Bltzal),  Op(I::Bgezal),  Op(I::Bltzall), Op(I::Bgezall),
    RES,            RES,            RES,            RES,
    // 0x18: BPOSGE32 belongs to the DSP extension
    RES,            RES,            RES,            RES,
    UNI,            RES,            RES,            Op(I::Synci),
];

#[rustfmt::skip]
static COP0: [Entry; 32] = [
    // 0x00: RDPGPR and WRPGPR need shadow register sets
    Op(I::Mfc0),    RES,            RES,            RES,
    Op(I::Mtc0),    RES,            RES,            RES,
    RES,            RES,            UNI,            Mfmc0,
    RES,            RES,            UNI,            RES,
    // 0x10
    Co,             Co,             Co,             Co,
    Co,             Co,             Co,             Co,
    Co,             Co,             Co,             Co,
    Co,             Co,             Co,             Co,
];

#[rustfmt::skip]
static CO: [Entry; 64] = [
    // 0x00
    RES,            Op(I::Tlbr),    Op(I::Tlbwi),   RES,
    RES,            RES,            Op(I::Tlbwr),   RES,
    Op(I::Tlbp),    RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x10
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    Op(I::Eret),    RES,            RES,            RES,
    RES,            RES,            RES,            UNI,
    // 0x20
    Op(I::Wait),    RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x30
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
];

#[rustfmt::skip]
static SPECIAL2: [Entry; 64] = [
    // 0x00
    Op(I::Madd),    Op(I::Maddu),   Op(I::Mul),     RES,
    Op(I::Msub),    Op(I::Msubu),   RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x10
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x20
    Op(I::Clz),     Op(I::Clo),     RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x30: SDBBP is an EJTAG debug breakpoint
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            UNI,
];

#[rustfmt::skip]
static SPECIAL3: [Entry; 64] = [
    // 0x00
    Op(I::Ext),     RES,            RES,            RES,
    Op(I::Ins),     RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x10
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x20
    Bshfl,          RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    // 0x30: RDHWR
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            RES,
    RES,            RES,            RES,            UNI,
    RES,            RES,            RES,            RES,
];

/// Resolve a decoded word to the instruction that executes it.
pub fn lookup(fields: &DecodedFields) -> Instruction {
    let mut entry = PRIMARY[fields.opcode as usize & 0x3F];
    loop {
        entry = match entry {
            Op(instruction) => return instruction,
            Special => SPECIAL[fields.funct as usize & 0x3F],
            RegImm => REGIMM[fields.rt as usize & 0x1F],
            Cop0 => COP0[fields.rs as usize & 0x1F],
            Co => CO[fields.funct as usize & 0x3F],
            Special2 => SPECIAL2[fields.funct as usize & 0x3F],
            Special3 => SPECIAL3[fields.funct as usize & 0x3F],
            Srl => match fields.rs {
                0 => Op(I::Srl),
                1 => Op(I::Rotr),
                _ => RES,
            },
            Srlv => match fields.shamt {
                0 => Op(I::Srlv),
                1 => Op(I::Rotrv),
                _ => RES,
            },
            Bshfl => match fields.shamt {
                0x02 => Op(I::Wsbh),
                0x10 => Op(I::Seb),
                0x18 => Op(I::Seh),
                _ => RES,
            },
            Mfmc0 => {
                let sc = fields.funct & 0x20 != 0;
                if fields.rd != 12 || fields.funct & 0x1F != 0 || fields.shamt != 0 {
                    RES
                } else if sc {
                    Op(I::Ei)
                } else {
                    Op(I::Di)
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(word: u32) -> Instruction {
        lookup(&DecodedFields::decode(word))
    }

    #[test]
    fn primary_and_special() {
        assert_eq!(resolve(0x0000_0000), I::Sll);
        assert_eq!(resolve(0x0043_6020), I::Add);
        assert_eq!(resolve(0x0043_001A), I::Div);
        assert_eq!(resolve(0x2002_00C8), I::Addi);
        assert_eq!(resolve(0x0810_0000), I::J);
        assert_eq!(resolve(0x0C10_0000), I::Jal);
        assert_eq!(resolve(0x5043_FFFD), I::Beql);
    }

    #[test]
    fn regimm_by_rt() {
        assert_eq!(resolve(0x0441_FFFD), I::Bgez);
        assert_eq!(resolve(0x0451_FFFD), I::Bgezal);
        assert_eq!(resolve(0x0453_FFFD), I::Bgezall);
        assert_eq!(resolve(0x0452_FFFD), I::Bltzall);
    }

    #[test]
    fn secondary_selectors() {
        // srl vs rotr $v0, $v1, 4
        assert_eq!(resolve(0x0003_1102), I::Srl);
        assert_eq!(resolve(0x0023_1102), I::Rotr);
        // srlv vs rotrv
        assert_eq!(resolve(0x0083_1006), I::Srlv);
        assert_eq!(resolve(0x0083_1046), I::Rotrv);
        // seb, seh, wsbh
        assert_eq!(resolve(0x7C03_1420), I::Seb);
        assert_eq!(resolve(0x7C03_1620), I::Seh);
        assert_eq!(resolve(0x7C03_10A0), I::Wsbh);
        // clz, clo
        assert_eq!(resolve(0x7040_2020), I::Clz);
        assert_eq!(resolve(0x7040_2021), I::Clo);
    }

    #[test]
    fn cop0_space() {
        assert_eq!(resolve(0x4008_6000), I::Mfc0);
        assert_eq!(resolve(0x4088_6000), I::Mtc0);
        assert_eq!(resolve(0x4200_0018), I::Eret);
        assert_eq!(resolve(0x4200_0020), I::Wait);
        assert_eq!(resolve(0x4200_0008), I::Tlbp);
        assert_eq!(resolve(0x4162_6000), I::Di);
        assert_eq!(resolve(0x4162_6020), I::Ei);
        assert_eq!(resolve(0x4162_5000), I::Reserved);
    }

    #[test]
    fn gaps_are_distinguished_from_reserved() {
        // lwc1
        assert_eq!(resolve(0xC400_0000), I::Unimplemented);
        // sdbbp
        assert_eq!(resolve(0x7000_003F), I::Unimplemented);
        // deret
        assert_eq!(resolve(0x4200_001F), I::Unimplemented);
        // opcode 0x18
        assert_eq!(resolve(0x6000_0000), I::Reserved);
        // special funct 0x05
        assert_eq!(resolve(0x0000_0005), I::Reserved);
    }
}
