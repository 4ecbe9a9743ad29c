use crate::cop0::{Cop0, Cop0Reg};
use crate::cpu::{BranchState, Cpu, Register};
use crate::decode::DecodedFields;
use crate::exception::{ExceptionQueue, PendingException};
use crate::memory::{Memory, PhysAddr};
use crate::system_bus::SystemBus;
use crate::tlb::Tlb;
use crate::trace::TraceEvent;

/// Load-linked state: the LL bit and nothing else, since there is only
/// one core to break the link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub linked: bool,
}

/// Everything one instruction may touch, borrowed from the machine for the
/// duration of a single cycle.
pub struct InstructionContext<'a> {
    pub fields: DecodedFields,
    pub cpu: &'a mut Cpu,
    pub bus: &'a mut SystemBus,
    pub cop0: &'a mut Cop0,
    pub tlb: &'a mut Tlb,
    pub branch: &'a mut BranchState,
    pub link: &'a mut LinkState,
    pub queue: &'a ExceptionQueue,
    events: Option<&'a mut Vec<TraceEvent>>,
}

impl<'a> InstructionContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fields: DecodedFields,
        cpu: &'a mut Cpu,
        bus: &'a mut SystemBus,
        cop0: &'a mut Cop0,
        tlb: &'a mut Tlb,
        branch: &'a mut BranchState,
        link: &'a mut LinkState,
        queue: &'a ExceptionQueue,
    ) -> Self {
        Self {
            fields,
            cpu,
            bus,
            cop0,
            tlb,
            branch,
            link,
            queue,
            events: None,
        }
    }

    /// Record register, HI/LO, memory and COP0 writes into `events`.
    pub fn with_events(mut self, events: &'a mut Vec<TraceEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn record(&mut self, event: TraceEvent) {
        if let Some(events) = self.events.as_mut() {
            events.push(event);
        }
    }

    // ------------------------------------------------------------------------
    // Registers
    // ------------------------------------------------------------------------

    pub fn rs(&self) -> u32 {
        self.cpu.read_reg(self.fields.rs_reg())
    }

    pub fn rt(&self) -> u32 {
        self.cpu.read_reg(self.fields.rt_reg())
    }

    pub fn set_reg(&mut self, reg: Register, val: u32) {
        let old = self.cpu.read_reg(reg);
        self.cpu.write_reg(reg, val);
        if reg != Register::ZERO {
            self.record(TraceEvent::RegisterWrite { reg, old, new: val });
        }
    }

    pub fn set_rd(&mut self, val: u32) {
        self.set_reg(self.fields.rd_reg(), val);
    }

    pub fn set_rt(&mut self, val: u32) {
        self.set_reg(self.fields.rt_reg(), val);
    }

    pub fn hilo(&self) -> u64 {
        (u64::from(self.cpu.hi) << 32) | u64::from(self.cpu.lo)
    }

    pub fn set_hilo(&mut self, hi: u32, lo: u32) {
        self.cpu.hi = hi;
        self.cpu.lo = lo;
        self.record(TraceEvent::HiLoWrite { hi, lo });
    }

    // ------------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------------

    /// base + sign-extended offset, no alignment check.
    pub fn effective_addr(&self) -> PhysAddr {
        PhysAddr::new(self.rs().wrapping_add(self.fields.imm_sext()))
    }

    pub fn load_byte(&mut self, addr: PhysAddr) -> u8 {
        self.bus.read_byte(addr)
    }

    pub fn load_half(&mut self, addr: PhysAddr) -> u16 {
        self.bus.read_half(addr)
    }

    pub fn load_word(&mut self, addr: PhysAddr) -> u32 {
        self.bus.read_word(addr)
    }

    pub fn store_byte(&mut self, addr: PhysAddr, val: u8) {
        self.bus.write_byte(addr, val);
        self.record(TraceEvent::MemoryWrite {
            addr,
            size: 1,
            value: val.into(),
        });
    }

    pub fn store_half(&mut self, addr: PhysAddr, val: u16) {
        self.bus.write_half(addr, val);
        self.record(TraceEvent::MemoryWrite {
            addr,
            size: 2,
            value: val.into(),
        });
    }

    pub fn store_word(&mut self, addr: PhysAddr, val: u32) {
        self.bus.write_word(addr, val);
        self.record(TraceEvent::MemoryWrite {
            addr,
            size: 4,
            value: val,
        });
    }

    // ------------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------------

    /// Address of the instruction after the delay slot.
    pub fn return_addr(&self) -> u32 {
        self.cpu.pc.wrapping_add(4)
    }

    /// Take a branch after the delay slot.
    pub fn jump(&mut self, target: u32) {
        self.branch.delay = true;
        self.branch.target = target;
    }

    pub fn branch_if(&mut self, taken: bool) {
        if taken {
            let target = self.cpu.pc.wrapping_add(self.fields.branch_offset());
            self.jump(target);
        }
    }

    /// Branch-likely: a branch not taken nullifies its delay slot.
    pub fn branch_likely(&mut self, taken: bool) {
        if taken {
            self.branch_if(true);
        } else {
            self.cpu.pc = self.cpu.pc.wrapping_add(4);
        }
    }

    /// Transfer control with no delay slot (ERET).
    pub fn redirect(&mut self, target: u32) {
        self.cpu.pc = target;
        *self.branch = BranchState::default();
    }

    pub fn raise(&self, event: PendingException) {
        self.queue.push_back(event);
    }

    // ------------------------------------------------------------------------
    // COP0
    // ------------------------------------------------------------------------

    pub fn cop0_reg(&self) -> Cop0Reg {
        Cop0Reg::new(self.fields.rd, self.fields.sel())
    }

    /// MTC0 write. Returns the bits that changed.
    pub fn write_cop0(&mut self, reg: Cop0Reg, val: u32) -> u32 {
        let changed = self.cop0.write_software(reg, val);
        let value = self.cop0.read(reg);
        self.record(TraceEvent::Cop0Write { reg, value });
        changed
    }
}
