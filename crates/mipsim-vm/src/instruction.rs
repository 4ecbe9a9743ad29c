use crate::context::InstructionContext;
use crate::cop0::{Cause, Cop0Reg, Status};
use crate::cpu::Register;
use crate::exception::{ExceptionCode, PendingException};
use crate::memory::PhysAddr;
use crate::TIMER_IRQ;
use log::warn;

/// One behaviour per mnemonic. Operands are not carried here: every
/// instruction reads the fields it needs from the decoded word held by the
/// [`InstructionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Architecturally reserved encoding: raises Reserved Instruction.
    Reserved,
    /// Valid encoding the engine does not model.
    Unimplemented,

    // ========================================================================
    // Arithmetic and logic
    // ========================================================================
    /// rd = rs + rt, trapping on signed overflow
    Add,
    /// rd = rs + rt (wrapping)
    Addu,
    /// rt = rs + sext(imm), trapping on signed overflow
    Addi,
    /// rt = rs + sext(imm) (wrapping)
    Addiu,
    Sub,
    Subu,
    And,
    Andi,
    Or,
    Ori,
    Xor,
    Xori,
    Nor,
    /// rt = imm << 16
    Lui,
    Slt,
    Sltu,
    Slti,
    /// Unsigned compare against the sign-extended immediate.
    Sltiu,
    Movz,
    Movn,
    Clz,
    Clo,
    Seb,
    Seh,
    /// Swap bytes within halfwords.
    Wsbh,
    /// Extract bit field: rt = rs[pos + size - 1 : pos]
    Ext,
    /// Insert bit field: rt[msb : lsb] = rs[msb - lsb : 0]
    Ins,

    // ========================================================================
    // Shifts
    // ========================================================================
    Sll,
    Srl,
    Sra,
    Rotr,
    Sllv,
    Srlv,
    Srav,
    Rotrv,

    // ========================================================================
    // Multiply and divide
    // ========================================================================
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Madd,
    Maddu,
    Msub,
    Msubu,
    /// rd = low 32 bits of rs * rt; HI/LO untouched
    Mul,

    // ========================================================================
    // Branches and jumps
    // ========================================================================
    J,
    Jal,
    Jr,
    Jalr,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    Beql,
    Bnel,
    Blezl,
    Bgtzl,
    Bltzl,
    Bgezl,
    Bltzall,
    Bgezall,

    // ========================================================================
    // Loads and stores
    // ========================================================================
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    /// Load word left (unaligned, big-endian)
    Lwl,
    /// Load word right (unaligned, big-endian)
    Lwr,
    Sb,
    Sh,
    Sw,
    Swl,
    Swr,
    Ll,
    Sc,

    // ========================================================================
    // Traps and system
    // ========================================================================
    Syscall,
    Break,
    Tge,
    Tgeu,
    Tlt,
    Tltu,
    Teq,
    Tne,
    Tgei,
    Tgeiu,
    Tlti,
    Tltiu,
    Teqi,
    Tnei,
    Sync,
    Synci,
    Cache,
    Pref,

    // ========================================================================
    // Coprocessor 0
    // ========================================================================
    Mfc0,
    Mtc0,
    Di,
    Ei,
    Eret,
    Tlbr,
    Tlbwi,
    Tlbwr,
    Tlbp,
    Wait,
}

fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

fn trap_if(cond: bool) -> Result<(), ExceptionCode> {
    if cond {
        Err(ExceptionCode::Trap)
    } else {
        Ok(())
    }
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            Reserved => "reserved",
            Unimplemented => "unimplemented",
            Add => "add",
            Addu => "addu",
            Addi => "addi",
            Addiu => "addiu",
            Sub => "sub",
            Subu => "subu",
            And => "and",
            Andi => "andi",
            Or => "or",
            Ori => "ori",
            Xor => "xor",
            Xori => "xori",
            Nor => "nor",
            Lui => "lui",
            Slt => "slt",
            Sltu => "sltu",
            Slti => "slti",
            Sltiu => "sltiu",
            Movz => "movz",
            Movn => "movn",
            Clz => "clz",
            Clo => "clo",
            Seb => "seb",
            Seh => "seh",
            Wsbh => "wsbh",
            Ext => "ext",
            Ins => "ins",
            Sll => "sll",
            Srl => "srl",
            Sra => "sra",
            Rotr => "rotr",
            Sllv => "sllv",
            Srlv => "srlv",
            Srav => "srav",
            Rotrv => "rotrv",
            Mfhi => "mfhi",
            Mthi => "mthi",
            Mflo => "mflo",
            Mtlo => "mtlo",
            Mult => "mult",
            Multu => "multu",
            Div => "div",
            Divu => "divu",
            Madd => "madd",
            Maddu => "maddu",
            Msub => "msub",
            Msubu => "msubu",
            Mul => "mul",
            J => "j",
            Jal => "jal",
            Jr => "jr",
            Jalr => "jalr",
            Beq => "beq",
            Bne => "bne",
            Blez => "blez",
            Bgtz => "bgtz",
            Bltz => "bltz",
            Bgez => "bgez",
            Bltzal => "bltzal",
            Bgezal => "bgezal",
            Beql => "beql",
            Bnel => "bnel",
            Blezl => "blezl",
            Bgtzl => "bgtzl",
            Bltzl => "bltzl",
            Bgezl => "bgezl",
            Bltzall => "bltzall",
            Bgezall => "bgezall",
            Lb => "lb",
            Lbu => "lbu",
            Lh => "lh",
            Lhu => "lhu",
            Lw => "lw",
            Lwl => "lwl",
            Lwr => "lwr",
            Sb => "sb",
            Sh => "sh",
            Sw => "sw",
            Swl => "swl",
            Swr => "swr",
            Ll => "ll",
            Sc => "sc",
            Syscall => "syscall",
            Break => "break",
            Tge => "tge",
            Tgeu => "tgeu",
            Tlt => "tlt",
            Tltu => "tltu",
            Teq => "teq",
            Tne => "tne",
            Tgei => "tgei",
            Tgeiu => "tgeiu",
            Tlti => "tlti",
            Tltiu => "tltiu",
            Teqi => "teqi",
            Tnei => "tnei",
            Sync => "sync",
            Synci => "synci",
            Cache => "cache",
            Pref => "pref",
            Mfc0 => "mfc0",
            Mtc0 => "mtc0",
            Di => "di",
            Ei => "ei",
            Eret => "eret",
            Tlbr => "tlbr",
            Tlbwi => "tlbwi",
            Tlbwr => "tlbwr",
            Tlbp => "tlbp",
            Wait => "wait",
        }
    }

    /// Run the instruction against `ctx`.
    ///
    /// An `Err` is a guest-visible exception; the instruction has not
    /// written its destination when it returns one.
    pub fn execute(self, ctx: &mut InstructionContext<'_>) -> Result<(), ExceptionCode> {
        use Instruction::*;
        let f = ctx.fields;
        match self {
            Reserved => return Err(ExceptionCode::ReservedInstruction),
            Unimplemented => return Err(ExceptionCode::Unimplemented),

            // ----------------------------------------------------------------
            // Arithmetic and logic
            // ----------------------------------------------------------------
            Add => {
                let sum = (ctx.rs() as i32)
                    .checked_add(ctx.rt() as i32)
                    .ok_or(ExceptionCode::Overflow)?;
                ctx.set_rd(sum as u32);
            }
            Addu => ctx.set_rd(ctx.rs().wrapping_add(ctx.rt())),
            Addi => {
                let sum = (ctx.rs() as i32)
                    .checked_add(f.imm_sext() as i32)
                    .ok_or(ExceptionCode::Overflow)?;
                ctx.set_rt(sum as u32);
            }
            Addiu => ctx.set_rt(ctx.rs().wrapping_add(f.imm_sext())),
            Sub => {
                let diff = (ctx.rs() as i32)
                    .checked_sub(ctx.rt() as i32)
                    .ok_or(ExceptionCode::Overflow)?;
                ctx.set_rd(diff as u32);
            }
            Subu => ctx.set_rd(ctx.rs().wrapping_sub(ctx.rt())),
            And => ctx.set_rd(ctx.rs() & ctx.rt()),
            Andi => ctx.set_rt(ctx.rs() & f.imm_zext()),
            Or => ctx.set_rd(ctx.rs() | ctx.rt()),
            Ori => ctx.set_rt(ctx.rs() | f.imm_zext()),
            Xor => ctx.set_rd(ctx.rs() ^ ctx.rt()),
            Xori => ctx.set_rt(ctx.rs() ^ f.imm_zext()),
            Nor => ctx.set_rd(!(ctx.rs() | ctx.rt())),
            Lui => ctx.set_rt(f.imm_zext() << 16),
            Slt => ctx.set_rd(((ctx.rs() as i32) < (ctx.rt() as i32)) as u32),
            Sltu => ctx.set_rd((ctx.rs() < ctx.rt()) as u32),
            Slti => ctx.set_rt(((ctx.rs() as i32) < (f.imm_sext() as i32)) as u32),
            Sltiu => ctx.set_rt((ctx.rs() < f.imm_sext()) as u32),
            Movz => {
                if ctx.rt() == 0 {
                    ctx.set_rd(ctx.rs());
                }
            }
            Movn => {
                if ctx.rt() != 0 {
                    ctx.set_rd(ctx.rs());
                }
            }
            Clz => ctx.set_rd(ctx.rs().leading_zeros()),
            Clo => ctx.set_rd(ctx.rs().leading_ones()),
            Seb => ctx.set_rd(ctx.rt() as u8 as i8 as i32 as u32),
            Seh => ctx.set_rd(ctx.rt() as u16 as i16 as i32 as u32),
            Wsbh => {
                let rt = ctx.rt();
                ctx.set_rd(((rt & 0x00FF_00FF) << 8) | ((rt >> 8) & 0x00FF_00FF));
            }
            Ext => {
                let pos = u32::from(f.shamt);
                let size = u32::from(f.rd) + 1;
                ctx.set_rt((ctx.rs() >> pos) & low_mask(size));
            }
            Ins => {
                let lsb = u32::from(f.shamt);
                let msb = u32::from(f.rd);
                // msb < lsb is unpredictable; leave rt alone.
                if msb >= lsb {
                    let mask = low_mask(msb - lsb + 1) << lsb;
                    let merged = (ctx.rt() & !mask) | ((ctx.rs() << lsb) & mask);
                    ctx.set_rt(merged);
                }
            }

            // ----------------------------------------------------------------
            // Shifts
            // ----------------------------------------------------------------
            Sll => ctx.set_rd(ctx.rt() << f.shamt),
            Srl => ctx.set_rd(ctx.rt() >> f.shamt),
            Sra => ctx.set_rd(((ctx.rt() as i32) >> f.shamt) as u32),
            Rotr => ctx.set_rd(ctx.rt().rotate_right(f.shamt.into())),
            Sllv => ctx.set_rd(ctx.rt() << (ctx.rs() & 0x1F)),
            Srlv => ctx.set_rd(ctx.rt() >> (ctx.rs() & 0x1F)),
            Srav => ctx.set_rd(((ctx.rt() as i32) >> (ctx.rs() & 0x1F)) as u32),
            Rotrv => ctx.set_rd(ctx.rt().rotate_right(ctx.rs() & 0x1F)),

            // ----------------------------------------------------------------
            // Multiply and divide
            // ----------------------------------------------------------------
            Mfhi => ctx.set_rd(ctx.cpu.hi),
            Mflo => ctx.set_rd(ctx.cpu.lo),
            Mthi => ctx.set_hilo(ctx.rs(), ctx.cpu.lo),
            Mtlo => ctx.set_hilo(ctx.cpu.hi, ctx.rs()),
            Mult => {
                let product = i64::from(ctx.rs() as i32) * i64::from(ctx.rt() as i32);
                ctx.set_hilo((product >> 32) as u32, product as u32);
            }
            Multu => {
                let product = u64::from(ctx.rs()) * u64::from(ctx.rt());
                ctx.set_hilo((product >> 32) as u32, product as u32);
            }
            Div => {
                let (n, d) = (ctx.rs() as i32, ctx.rt() as i32);
                // Zero divisor: result undefined, HI/LO keep their values.
                if d != 0 {
                    ctx.set_hilo(n.wrapping_rem(d) as u32, n.wrapping_div(d) as u32);
                }
            }
            Divu => {
                let (n, d) = (ctx.rs(), ctx.rt());
                if d != 0 {
                    ctx.set_hilo(n % d, n / d);
                }
            }
            Madd | Msub => {
                let product = i64::from(ctx.rs() as i32) * i64::from(ctx.rt() as i32);
                let acc = ctx.hilo() as i64;
                let acc = match self {
                    Madd => acc.wrapping_add(product),
                    _ => acc.wrapping_sub(product),
                };
                ctx.set_hilo((acc >> 32) as u32, acc as u32);
            }
            Maddu | Msubu => {
                let product = u64::from(ctx.rs()) * u64::from(ctx.rt());
                let acc = match self {
                    Maddu => ctx.hilo().wrapping_add(product),
                    _ => ctx.hilo().wrapping_sub(product),
                };
                ctx.set_hilo((acc >> 32) as u32, acc as u32);
            }
            Mul => ctx.set_rd((ctx.rs() as i32).wrapping_mul(ctx.rt() as i32) as u32),

            // ----------------------------------------------------------------
            // Branches and jumps
            // ----------------------------------------------------------------
            J => ctx.jump((ctx.cpu.pc & 0xF000_0000) | (f.jimm << 2)),
            Jal => {
                ctx.set_reg(Register::RA, ctx.return_addr());
                ctx.jump((ctx.cpu.pc & 0xF000_0000) | (f.jimm << 2));
            }
            Jr => ctx.jump(ctx.rs()),
            Jalr => {
                let target = ctx.rs();
                ctx.set_rd(ctx.return_addr());
                ctx.jump(target);
            }
            Beq => ctx.branch_if(ctx.rs() == ctx.rt()),
            Bne => ctx.branch_if(ctx.rs() != ctx.rt()),
            Blez => ctx.branch_if((ctx.rs() as i32) <= 0),
            Bgtz => ctx.branch_if(ctx.rs() as i32 > 0),
            Bltz => ctx.branch_if((ctx.rs() as i32) < 0),
            Bgez => ctx.branch_if(ctx.rs() as i32 >= 0),
            Bltzal => {
                let taken = (ctx.rs() as i32) < 0;
                ctx.set_reg(Register::RA, ctx.return_addr());
                ctx.branch_if(taken);
            }
            Bgezal => {
                let taken = ctx.rs() as i32 >= 0;
                ctx.set_reg(Register::RA, ctx.return_addr());
                ctx.branch_if(taken);
            }
            Beql => ctx.branch_likely(ctx.rs() == ctx.rt()),
            Bnel => ctx.branch_likely(ctx.rs() != ctx.rt()),
            Blezl => ctx.branch_likely((ctx.rs() as i32) <= 0),
            Bgtzl => ctx.branch_likely(ctx.rs() as i32 > 0),
            Bltzl => ctx.branch_likely((ctx.rs() as i32) < 0),
            Bgezl => ctx.branch_likely(ctx.rs() as i32 >= 0),
            Bltzall => {
                let taken = (ctx.rs() as i32) < 0;
                ctx.set_reg(Register::RA, ctx.return_addr());
                ctx.branch_likely(taken);
            }
            Bgezall => {
                let taken = ctx.rs() as i32 >= 0;
                ctx.set_reg(Register::RA, ctx.return_addr());
                ctx.branch_likely(taken);
            }

            // ----------------------------------------------------------------
            // Loads and stores
            // ----------------------------------------------------------------
            Lb => {
                let addr = ctx.effective_addr();
                let val = ctx.load_byte(addr) as i8;
                ctx.set_rt(val as i32 as u32);
            }
            Lbu => {
                let addr = ctx.effective_addr();
                let val = ctx.load_byte(addr);
                ctx.set_rt(val.into());
            }
            Lh => {
                let addr = ctx.effective_addr();
                let val = ctx.load_half(addr) as i16;
                ctx.set_rt(val as i32 as u32);
            }
            Lhu => {
                let addr = ctx.effective_addr();
                let val = ctx.load_half(addr);
                ctx.set_rt(val.into());
            }
            Lw => {
                let addr = ctx.effective_addr();
                let val = ctx.load_word(addr);
                ctx.set_rt(val);
            }
            Lwl => {
                let addr = ctx.effective_addr();
                let word = ctx.load_word(PhysAddr::new(addr.val() & !3));
                let shift = 8 * (addr.val() & 3);
                ctx.set_rt((word << shift) | (ctx.rt() & !(u32::MAX << shift)));
            }
            Lwr => {
                let addr = ctx.effective_addr();
                let word = ctx.load_word(PhysAddr::new(addr.val() & !3));
                let shift = 8 * (3 - (addr.val() & 3));
                ctx.set_rt((word >> shift) | (ctx.rt() & !(u32::MAX >> shift)));
            }
            Sb => {
                let addr = ctx.effective_addr();
                ctx.store_byte(addr, ctx.rt() as u8);
            }
            Sh => {
                let addr = ctx.effective_addr();
                ctx.store_half(addr, ctx.rt() as u16);
            }
            Sw => {
                let addr = ctx.effective_addr();
                ctx.store_word(addr, ctx.rt());
            }
            Swl => {
                let addr = ctx.effective_addr();
                let aligned = PhysAddr::new(addr.val() & !3);
                let shift = 8 * (addr.val() & 3);
                let word = ctx.load_word(aligned);
                ctx.store_word(aligned, (word & !(u32::MAX >> shift)) | (ctx.rt() >> shift));
            }
            Swr => {
                let addr = ctx.effective_addr();
                let aligned = PhysAddr::new(addr.val() & !3);
                let shift = 8 * (3 - (addr.val() & 3));
                let word = ctx.load_word(aligned);
                ctx.store_word(aligned, (word & !(u32::MAX << shift)) | (ctx.rt() << shift));
            }
            Ll => {
                let addr = ctx.effective_addr();
                let val = ctx.load_word(addr);
                ctx.cop0.write_hardware(Cop0Reg::LL_ADDR, addr.val() >> 4);
                ctx.link.linked = true;
                ctx.set_rt(val);
            }
            Sc => {
                let addr = ctx.effective_addr();
                let success = ctx.link.linked;
                if success {
                    ctx.store_word(addr, ctx.rt());
                }
                ctx.link.linked = false;
                ctx.set_rt(success as u32);
            }

            // ----------------------------------------------------------------
            // Traps and system
            // ----------------------------------------------------------------
            Syscall => return Err(ExceptionCode::Syscall),
            Break => return Err(ExceptionCode::Breakpoint),
            Tge => trap_if(ctx.rs() as i32 >= ctx.rt() as i32)?,
            Tgeu => trap_if(ctx.rs() >= ctx.rt())?,
            Tlt => trap_if((ctx.rs() as i32) < ctx.rt() as i32)?,
            Tltu => trap_if(ctx.rs() < ctx.rt())?,
            Teq => trap_if(ctx.rs() == ctx.rt())?,
            Tne => trap_if(ctx.rs() != ctx.rt())?,
            Tgei => trap_if(ctx.rs() as i32 >= f.imm_sext() as i32)?,
            Tgeiu => trap_if(ctx.rs() >= f.imm_sext())?,
            Tlti => trap_if((ctx.rs() as i32) < f.imm_sext() as i32)?,
            Tltiu => trap_if(ctx.rs() < f.imm_sext())?,
            Teqi => trap_if(ctx.rs() == f.imm_sext())?,
            Tnei => trap_if(ctx.rs() != f.imm_sext())?,
            // Single core, no caches.
            Sync | Synci | Cache | Pref | Wait => {}

            // ----------------------------------------------------------------
            // Coprocessor 0
            // ----------------------------------------------------------------
            Mfc0 => {
                let val = ctx.cop0.read(ctx.cop0_reg());
                ctx.set_rt(val);
            }
            Mtc0 => mtc0(ctx),
            Di | Ei => {
                let status = ctx.cop0.read(Cop0Reg::STATUS);
                ctx.set_rt(status);
                let updated = if self == Ei {
                    status | Status::IE.bits()
                } else {
                    status & !Status::IE.bits()
                };
                ctx.write_cop0(Cop0Reg::STATUS, updated);
            }
            Eret => {
                let status = ctx.cop0.status();
                let (level, epc) = if status.contains(Status::ERL) {
                    (Status::ERL, Cop0Reg::ERROR_EPC)
                } else {
                    (Status::EXL, Cop0Reg::EPC)
                };
                ctx.cop0.clear_hardware(Cop0Reg::STATUS, level.bits());
                let target = ctx.cop0.read(epc);
                ctx.link.linked = false;
                ctx.redirect(target);
            }
            Tlbr => ctx.tlb.read_indexed(ctx.cop0),
            Tlbwi => ctx.tlb.write_indexed(ctx.cop0),
            Tlbwr => ctx.tlb.write_random(ctx.cop0),
            Tlbp => ctx.tlb.probe(ctx.cop0),
        }
        Ok(())
    }
}

fn mtc0(ctx: &mut InstructionContext<'_>) {
    let reg = ctx.cop0_reg();
    let val = ctx.rt();

    let writable = ctx.cop0.get(reg).map_or(0, |scr| scr.software_mask());
    if writable == 0 {
        warn!("mtc0 {:#010x} to {} ignored: no writable bits", val, reg);
        return;
    }
    let changed = Cause::from_bits_retain(ctx.write_cop0(reg, val));

    if reg == Cop0Reg::CAUSE {
        // Software interrupts are requested by setting IP0/IP1.
        let raised = changed & ctx.cop0.cause();
        for irq in 0..2 {
            if raised.contains(Cause::ip(irq)) {
                ctx.raise(PendingException::Interrupt(irq));
            }
        }
    } else if reg == Cop0Reg::COMPARE {
        let ack = Cause::TI | Cause::ip(TIMER_IRQ);
        ctx.cop0.clear_hardware(Cop0Reg::CAUSE, ack.bits());
    }
}

impl core::fmt::Display for Instruction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
