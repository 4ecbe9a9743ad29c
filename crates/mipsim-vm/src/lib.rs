pub mod context;
pub mod cop0;
pub mod cpu;
pub mod decode;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod instruction;
pub mod memory;
pub mod system_bus;
pub mod tlb;
pub mod trace;

pub use context::*;
pub use cop0::*;
pub use cpu::*;
pub use decode::*;
pub use devices::*;
pub use error::*;
pub use exception::*;
pub use instruction::*;
pub use memory::*;
pub use system_bus::SystemBus;
pub use tlb::*;
pub use trace::*;

use log::{debug, trace, warn};

/// Reset vector.
pub const RESET_VECTOR: u32 = 0xBFC0_0000;
/// Initial value of $sp and $fp.
pub const DEFAULT_STACK_POINTER: u32 = 0x1001_0000;
/// Count/Compare interrupt pin.
pub const TIMER_IRQ: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub entry_point: u32,
    pub stack_pointer: u32,
    /// Return `VmError::Unimplemented` instead of vectoring when an
    /// encoding the engine does not model is executed.
    pub abort_on_unimplemented: bool,
    /// End `run` on BREAK instead of taking the Bp exception.
    pub stop_on_break: bool,
    /// Deliver Count/Compare interrupts on IP7.
    pub timer: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            entry_point: RESET_VECTOR,
            stack_pointer: DEFAULT_STACK_POINTER,
            abort_on_unimplemented: false,
            stop_on_break: false,
            timer: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Breakpoint,
    CycleLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// An instruction was fetched and executed. Any exception it raised is
    /// queued for the next cycle.
    Executed(Instruction),
    /// The cycle was spent servicing a pending exception or interrupt.
    Serviced(ServiceOutcome),
    Exit(ExitReason),
}

pub struct VirtualMachine {
    pub config: VmConfig,
    cpu: Cpu,
    bus: SystemBus,
    cop0: Cop0,
    tlb: Tlb,
    branch: BranchState,
    link: LinkState,
    queue: ExceptionQueue,
    tracer: Option<Box<dyn Tracer>>,
    events: Vec<TraceEvent>,
    cycle_count: u64,
}

impl VirtualMachine {
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        let mut cpu = Cpu::new(config.entry_point);
        cpu.write_reg(Register::SP, config.stack_pointer);
        cpu.write_reg(Register::FP, config.stack_pointer);
        debug!("vm created, entry point {:#010x}", config.entry_point);

        Ok(Self {
            cpu,
            bus: SystemBus::new(),
            cop0: Cop0::new()?,
            tlb: Tlb::new(),
            branch: BranchState::default(),
            link: LinkState::default(),
            queue: ExceptionQueue::new(),
            tracer: None,
            events: Vec::new(),
            cycle_count: 0,
            config,
        })
    }

    pub fn attach_device(&mut self, device: Box<dyn Device>) -> Result<(), VmError> {
        self.bus.attach_device(device)
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = Some(tracer);
    }

    pub fn clear_tracer(&mut self) {
        self.tracer = None;
        self.events.clear();
    }

    /// Run until BREAK (with `stop_on_break`) or until `max_cycles` more
    /// cycles have elapsed.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<ExitReason, VmError> {
        let limit = max_cycles.map(|n| self.cycle_count.saturating_add(n));
        loop {
            if limit.is_some_and(|limit| self.cycle_count >= limit) {
                return Ok(ExitReason::CycleLimit);
            }
            if let StepResult::Exit(reason) = self.step()? {
                return Ok(reason);
            }
        }
    }

    /// Advance one cycle: service one pending event if there is one,
    /// otherwise fetch, decode and execute one instruction.
    pub fn step(&mut self) -> Result<StepResult, VmError> {
        let result = match self.next_event() {
            Some(event) => {
                let outcome =
                    exception::service(event, &mut self.cpu, &mut self.cop0, &mut self.branch);
                self.emit(match outcome {
                    ServiceOutcome::Vectored {
                        code,
                        epc,
                        vector,
                        in_delay_slot,
                    } => TraceEvent::ExceptionTaken {
                        code,
                        epc,
                        vector,
                        in_delay_slot,
                    },
                    ServiceOutcome::Dropped { irq, reason } => {
                        TraceEvent::InterruptDropped { irq, reason }
                    }
                });
                StepResult::Serviced(outcome)
            }
            None => self.execute_next()?,
        };

        self.tick();
        self.cycle_count += 1;
        Ok(result)
    }

    /// An interrupt arriving between a taken branch and its delay slot
    /// waits one cycle for the slot to be fetched, so it vectors with
    /// Cause.BD set and EPC on the branch instead of losing the target.
    fn next_event(&self) -> Option<PendingException> {
        let slot_unfetched = self.branch.delay;
        self.queue
            .pop_if(|event| !(slot_unfetched && matches!(event, PendingException::Interrupt(_))))
    }

    fn execute_next(&mut self) -> Result<StepResult, VmError> {
        if self.branch.pending {
            self.cpu.pc = self.branch.target;
            self.branch.pending = false;
        }

        let pc = self.cpu.pc;
        let word = self.bus.read_word(PhysAddr::new(pc));
        self.cpu.ir = word;
        self.cpu.pc = pc.wrapping_add(4);

        if self.branch.delay {
            self.branch.delay = false;
            self.branch.pending = true;
        }

        let fields = DecodedFields::decode(word);
        let instruction = dispatch::lookup(&fields);
        trace!("{:#010x}: {:08x} {}", pc, word, instruction);

        let tracing = self.tracer.is_some();
        if tracing {
            self.events.push(TraceEvent::Fetch {
                pc,
                word,
                instruction,
            });
        }

        let result = {
            let mut ctx = InstructionContext::new(
                fields,
                &mut self.cpu,
                &mut self.bus,
                &mut self.cop0,
                &mut self.tlb,
                &mut self.branch,
                &mut self.link,
                &self.queue,
            );
            if tracing {
                ctx = ctx.with_events(&mut self.events);
            }
            instruction.execute(&mut ctx)
        };
        self.flush_events();

        match result {
            Ok(()) => {}
            Err(ExceptionCode::Breakpoint) if self.config.stop_on_break => {
                debug!("break at {:#010x}", pc);
                return Ok(StepResult::Exit(ExitReason::Breakpoint));
            }
            Err(ExceptionCode::Unimplemented) => {
                warn!("unimplemented instruction {:08x} at {:#010x}", word, pc);
                if self.config.abort_on_unimplemented {
                    return Err(VmError::Unimplemented { pc, word });
                }
                self.queue
                    .push_front(PendingException::Exception(ExceptionCode::Unimplemented));
            }
            Err(code) => self.queue.push_front(PendingException::Exception(code)),
        }
        Ok(StepResult::Executed(instruction))
    }

    fn tick(&mut self) {
        for DeviceInterrupt { irq } in self.bus.tick_devices() {
            self.queue.push_back(PendingException::Interrupt(irq));
        }
        if self.cop0.tick() && self.config.timer {
            self.queue.push_back(PendingException::Interrupt(TIMER_IRQ));
        }
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.event(&event);
        }
    }

    fn flush_events(&mut self) {
        if let Some(tracer) = self.tracer.as_mut() {
            for event in self.events.drain(..) {
                tracer.event(&event);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn reg(&self, reg: Register) -> u32 {
        self.cpu.read_reg(reg)
    }

    pub fn set_reg(&mut self, reg: Register, val: u32) {
        self.cpu.write_reg(reg, val);
    }

    pub fn hi(&self) -> u32 {
        self.cpu.hi
    }

    pub fn lo(&self) -> u32 {
        self.cpu.lo
    }

    pub fn pc(&self) -> u32 {
        self.cpu.pc
    }

    /// Jump directly, cancelling any branch in flight.
    pub fn set_pc(&mut self, pc: u32) {
        self.cpu.pc = pc;
        self.branch = BranchState::default();
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn read_word(&mut self, addr: u32) -> u32 {
        self.bus.read_word(PhysAddr::new(addr))
    }

    pub fn read_half(&mut self, addr: u32) -> u16 {
        self.bus.read_half(PhysAddr::new(addr))
    }

    pub fn read_byte(&mut self, addr: u32) -> u8 {
        self.bus.read_byte(PhysAddr::new(addr))
    }

    pub fn write_word(&mut self, addr: u32, val: u32) {
        self.bus.write_word(PhysAddr::new(addr), val);
    }

    pub fn write_half(&mut self, addr: u32, val: u16) {
        self.bus.write_half(PhysAddr::new(addr), val);
    }

    pub fn write_byte(&mut self, addr: u32, val: u8) {
        self.bus.write_byte(PhysAddr::new(addr), val);
    }

    pub fn memory(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    pub fn cop0(&self) -> &Cop0 {
        &self.cop0
    }

    pub fn cop0_mut(&mut self) -> &mut Cop0 {
        &mut self.cop0
    }

    pub fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub fn branch_state(&self) -> BranchState {
        self.branch
    }

    pub fn pending_exceptions(&self) -> &ExceptionQueue {
        &self.queue
    }

    pub fn interrupt_line(&self) -> InterruptLine {
        self.queue.interrupt_line()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }
}
