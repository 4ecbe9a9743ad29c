use crate::cop0::{Cause, Cop0, Cop0Reg, Status};
use crate::cpu::{BranchState, Cpu};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

pub const VECTOR_BASE: u32 = 0x8000_0000;
pub const BOOT_VECTOR_BASE: u32 = 0xBFC0_0200;
pub const TLB_REFILL_OFFSET: u32 = 0x000;
pub const GENERAL_OFFSET: u32 = 0x180;
pub const INTERRUPT_OFFSET: u32 = 0x200;

/// Architectural exception classes, by ExcCode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    Interrupt,
    TlbModified,
    TlbLoad,
    TlbStore,
    AddressLoad,
    AddressStore,
    BusInstruction,
    BusData,
    Syscall,
    Breakpoint,
    ReservedInstruction,
    CoprocessorUnusable,
    Overflow,
    Trap,
    FloatingPoint,
    Coprocessor2,
    Mdmx,
    Watch,
    MachineCheck,
    Thread,
    DspDisabled,
    CacheError,
    /// Any code the architecture leaves reserved.
    Reserved(u8),
    /// Engine gap: an encoding that exists but is not modelled here.
    Unimplemented,
}

impl ExceptionCode {
    /// ExcCode written to Cause. Unimplemented uses the
    /// implementation-dependent code 16.
    pub fn code(&self) -> u8 {
        use ExceptionCode::*;
        match self {
            Interrupt => 0,
            TlbModified => 1,
            TlbLoad => 2,
            TlbStore => 3,
            AddressLoad => 4,
            AddressStore => 5,
            BusInstruction => 6,
            BusData => 7,
            Syscall => 8,
            Breakpoint => 9,
            ReservedInstruction => 10,
            CoprocessorUnusable => 11,
            Overflow => 12,
            Trap => 13,
            FloatingPoint => 15,
            Unimplemented => 16,
            Coprocessor2 => 18,
            Mdmx => 22,
            Watch => 23,
            MachineCheck => 24,
            Thread => 25,
            DspDisabled => 26,
            CacheError => 30,
            Reserved(code) => code & 0x1F,
        }
    }

    pub fn from_code(code: u8) -> Self {
        use ExceptionCode::*;
        match code & 0x1F {
            0 => Interrupt,
            1 => TlbModified,
            2 => TlbLoad,
            3 => TlbStore,
            4 => AddressLoad,
            5 => AddressStore,
            6 => BusInstruction,
            7 => BusData,
            8 => Syscall,
            9 => Breakpoint,
            10 => ReservedInstruction,
            11 => CoprocessorUnusable,
            12 => Overflow,
            13 => Trap,
            15 => FloatingPoint,
            18 => Coprocessor2,
            22 => Mdmx,
            23 => Watch,
            24 => MachineCheck,
            25 => Thread,
            26 => DspDisabled,
            30 => CacheError,
            other => Reserved(other),
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        use ExceptionCode::*;
        match self {
            Interrupt => "Int",
            TlbModified => "Mod",
            TlbLoad => "TLBL",
            TlbStore => "TLBS",
            AddressLoad => "AdEL",
            AddressStore => "AdES",
            BusInstruction => "IBE",
            BusData => "DBE",
            Syscall => "Sys",
            Breakpoint => "Bp",
            ReservedInstruction => "RI",
            CoprocessorUnusable => "CpU",
            Overflow => "Ov",
            Trap => "Tr",
            FloatingPoint => "FPE",
            Coprocessor2 => "C2E",
            Mdmx => "MDMX",
            Watch => "WATCH",
            MachineCheck => "MCheck",
            Thread => "Thread",
            DspDisabled => "DSPDis",
            CacheError => "CacheErr",
            Reserved(_) => "Res",
            Unimplemented => "Unimpl",
        }
    }
}

impl core::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.mnemonic(), self.code())
    }
}

/// An event waiting for the exception controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingException {
    Exception(ExceptionCode),
    /// Interrupt pin IP0-IP7.
    Interrupt(u8),
}

/// FIFO of pending exceptions, shared between the cycle loop (the only
/// consumer) and any number of interrupt sources.
#[derive(Debug, Clone, Default)]
pub struct ExceptionQueue {
    inner: Arc<Mutex<VecDeque<PendingException>>>,
}

impl ExceptionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingException>> {
        // A producer that panicked mid-push leaves the queue intact.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_back(&self, event: PendingException) {
        self.lock().push_back(event);
    }

    /// Queue ahead of everything else; used for exceptions raised by the
    /// instruction that just executed.
    pub fn push_front(&self, event: PendingException) {
        self.lock().push_front(event);
    }

    pub fn pop(&self) -> Option<PendingException> {
        self.lock().pop_front()
    }

    /// Pop the head only if `pred` accepts it.
    pub fn pop_if(&self, pred: impl FnOnce(&PendingException) -> bool) -> Option<PendingException> {
        let mut queue = self.lock();
        match queue.front() {
            Some(head) if pred(head) => queue.pop_front(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn interrupt_line(&self) -> InterruptLine {
        InterruptLine {
            queue: self.clone(),
        }
    }
}

/// Handle for asserting interrupt pins from outside the cycle loop.
#[derive(Debug, Clone)]
pub struct InterruptLine {
    queue: ExceptionQueue,
}

impl InterruptLine {
    /// Assert pin `irq` (0-7). Out-of-range pins are masked.
    pub fn assert(&self, irq: u8) {
        self.queue.push_back(PendingException::Interrupt(irq & 7));
    }
}

/// Why an interrupt was discarded instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Status.IE clear.
    Disabled,
    /// Status.IM bit for the pin clear.
    Masked,
    /// Status.EXL or Status.ERL set.
    ExceptionLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    Vectored {
        code: ExceptionCode,
        epc: u32,
        vector: u32,
        in_delay_slot: bool,
    },
    Dropped {
        irq: u8,
        reason: DropReason,
    },
}

fn interrupt_blocked(status: Status, irq: u8) -> Option<DropReason> {
    if !status.contains(Status::IE) {
        Some(DropReason::Disabled)
    } else if !status.contains(Status::im(irq)) {
        Some(DropReason::Masked)
    } else if status.intersects(Status::EXL | Status::ERL) {
        Some(DropReason::ExceptionLevel)
    } else {
        None
    }
}

/// Process one pending event: mask interrupts, then vector.
///
/// All control register updates go through the hardware write path. A
/// dropped interrupt is not requeued; its source has to assert it again.
pub fn service(
    event: PendingException,
    cpu: &mut Cpu,
    cop0: &mut Cop0,
    branch: &mut BranchState,
) -> ServiceOutcome {
    let status = cop0.status();

    let code = match event {
        PendingException::Exception(code) => code,
        PendingException::Interrupt(irq) => {
            if let Some(reason) = interrupt_blocked(status, irq) {
                debug!("interrupt {} dropped: {:?}", irq, reason);
                return ServiceOutcome::Dropped { irq, reason };
            }
            cop0.set_hardware(Cop0Reg::CAUSE, Cause::ip(irq).bits());
            ExceptionCode::Interrupt
        }
    };

    let in_delay_slot = branch.pending;
    let (epc, offset) = if !status.contains(Status::EXL) {
        let epc = if in_delay_slot {
            cop0.set_hardware(Cop0Reg::CAUSE, Cause::BD.bits());
            cpu.pc.wrapping_sub(8)
        } else {
            cop0.clear_hardware(Cop0Reg::CAUSE, Cause::BD.bits());
            cpu.pc.wrapping_sub(4)
        };
        let offset = match code {
            ExceptionCode::TlbLoad | ExceptionCode::TlbStore => TLB_REFILL_OFFSET,
            ExceptionCode::Interrupt if cop0.cause().contains(Cause::IV) => INTERRUPT_OFFSET,
            _ => GENERAL_OFFSET,
        };
        (epc, offset)
    } else {
        // Nested entry still overwrites EPC.
        (cpu.pc.wrapping_sub(4), GENERAL_OFFSET)
    };
    cop0.write_hardware(Cop0Reg::EPC, epc);

    let cause = cop0.read(Cop0Reg::CAUSE) & !(Cause::CE.bits() | Cause::EXC_CODE_MASK);
    let exc_code = u32::from(code.code()) << Cause::EXC_CODE_SHIFT;
    cop0.write_hardware(Cop0Reg::CAUSE, cause | exc_code);
    cop0.set_hardware(Cop0Reg::STATUS, Status::EXL.bits());

    let base = if status.contains(Status::BEV) {
        BOOT_VECTOR_BASE
    } else {
        VECTOR_BASE
    };
    let vector = base.wrapping_add(offset);
    cpu.pc = vector;
    *branch = BranchState::default();

    debug!(
        "exception {} epc={:#010x} vector={:#010x}{}",
        code,
        epc,
        vector,
        if in_delay_slot { " (delay slot)" } else { "" }
    );
    ServiceOutcome::Vectored {
        code,
        epc,
        vector,
        in_delay_slot,
    }
}
