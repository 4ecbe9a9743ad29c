use crate::cop0::Cop0Reg;
use crate::cpu::Register;
use crate::exception::{DropReason, ExceptionCode};
use crate::instruction::Instruction;
use crate::memory::PhysAddr;
use log::trace;

/// Structured per-cycle observation of the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Fetch {
        pc: u32,
        word: u32,
        instruction: Instruction,
    },
    RegisterWrite {
        reg: Register,
        old: u32,
        new: u32,
    },
    HiLoWrite {
        hi: u32,
        lo: u32,
    },
    MemoryWrite {
        addr: PhysAddr,
        /// Access width in bytes.
        size: u8,
        value: u32,
    },
    Cop0Write {
        reg: Cop0Reg,
        value: u32,
    },
    ExceptionTaken {
        code: ExceptionCode,
        epc: u32,
        vector: u32,
        in_delay_slot: bool,
    },
    InterruptDropped {
        irq: u8,
        reason: DropReason,
    },
}

impl core::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TraceEvent::Fetch {
                pc,
                word,
                instruction,
            } => write!(f, "{:#010x}: {:08x} {}", pc, word, instruction),
            TraceEvent::RegisterWrite { reg, old, new } => {
                write!(f, "{} {:#010x} -> {:#010x}", reg, old, new)
            }
            TraceEvent::HiLoWrite { hi, lo } => write!(f, "hi={:#010x} lo={:#010x}", hi, lo),
            TraceEvent::MemoryWrite { addr, size, value } => {
                write!(f, "mem[{}]:{} <- {:#x}", addr, size, value)
            }
            TraceEvent::Cop0Write { reg, value } => write!(f, "{} <- {:#010x}", reg, value),
            TraceEvent::ExceptionTaken {
                code,
                epc,
                vector,
                in_delay_slot,
            } => write!(
                f,
                "exception {} epc={:#010x} vector={:#010x} bd={}",
                code, epc, vector, in_delay_slot
            ),
            TraceEvent::InterruptDropped { irq, reason } => {
                write!(f, "interrupt {} dropped ({:?})", irq, reason)
            }
        }
    }
}

/// Subscriber for trace events, installed with
/// [`VirtualMachine::set_tracer`](crate::VirtualMachine::set_tracer).
pub trait Tracer: Send {
    fn event(&mut self, event: &TraceEvent);
}

/// Forwards every event to `log::trace!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn event(&mut self, event: &TraceEvent) {
        trace!(target: "mipsim::trace", "{}", event);
    }
}

/// Keeps every event in memory. Handy in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    events: std::sync::Arc<std::sync::Mutex<Vec<TraceEvent>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<TraceEvent> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *events)
    }
}

impl Tracer for RecordingTracer {
    fn event(&mut self, event: &TraceEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
