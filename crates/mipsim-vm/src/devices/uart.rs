use crate::devices::{Device, DeviceInterrupt};
use crate::error::DeviceError;
use crate::memory::PhysAddr;
use log::warn;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub const UART_BASE: u32 = 0xB400_03F8;
pub const UART_SIZE: u32 = 8;

// Register offsets
pub const RBR: u32 = 0x00; // Receiver Buffer Register (read, DLAB=0)
pub const THR: u32 = 0x00; // Transmitter Holding Register (write, DLAB=0)
pub const DLL: u32 = 0x00; // Divisor Latch Low (DLAB=1)
pub const IER: u32 = 0x01; // Interrupt Enable Register (DLAB=0)
pub const DLH: u32 = 0x01; // Divisor Latch High (DLAB=1)
pub const IIR: u32 = 0x02; // Interrupt Identification Register (read)
pub const FCR: u32 = 0x02; // FIFO Control Register (write)
pub const LCR: u32 = 0x03; // Line Control Register
pub const MCR: u32 = 0x04; // Modem Control Register
pub const LSR: u32 = 0x05; // Line Status Register
pub const MSR: u32 = 0x06; // Modem Status Register
pub const SCR: u32 = 0x07; // Scratch Register

const LCR_DLAB: u8 = 1 << 6;
const LSR_DR: u8 = 1 << 0;
const LSR_THRE: u8 = 1 << 5;
const LSR_TEMT: u8 = 1 << 6;
const IER_RX_AVAILABLE: u8 = 1 << 0;
const IIR_NO_INTERRUPT: u8 = 0x01;
const IIR_RX_AVAILABLE: u8 = 0x04;

/// Host-side handle for feeding received characters to the UART from any
/// thread.
#[derive(Clone, Default)]
pub struct UartInput {
    queue: Arc<Mutex<VecDeque<u8>>>,
}

impl UartInput {
    pub fn push(&self, byte: u8) {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(byte);
    }

    pub fn push_str(&self, text: &str) {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.extend(text.bytes());
    }

    fn pop(&self) -> Option<u8> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

/// 8250-compatible serial port. Transmitted bytes go to the output sink.
pub struct UartDevice {
    base: u32,
    output: Box<dyn Write + Send>,
    input: UartInput,
    irq: Option<u8>,
    rbr: u8,
    dll: u8,
    dlh: u8,
    ier: u8,
    fcr: u8,
    lcr: u8,
    mcr: u8,
    lsr: u8,
    msr: u8,
    scr: u8,
}

impl UartDevice {
    pub fn new() -> Self {
        Self::with_output(UART_BASE, Box::new(io::stdout()))
    }

    pub fn with_output(base: u32, output: Box<dyn Write + Send>) -> Self {
        Self {
            base,
            output,
            input: UartInput::default(),
            irq: None,
            rbr: 0,
            dll: 0,
            dlh: 0,
            ier: 0,
            fcr: 0,
            lcr: 0,
            mcr: 0,
            lsr: LSR_THRE | LSR_TEMT,
            msr: 0,
            scr: 0,
        }
    }

    /// Route the receive-data-available interrupt to hardware pin `irq`.
    pub fn with_interrupt(mut self, irq: u8) -> Self {
        self.irq = Some(irq);
        self
    }

    pub fn input(&self) -> UartInput {
        self.input.clone()
    }

    fn dlab(&self) -> bool {
        self.lcr & LCR_DLAB != 0
    }

    fn rx_interrupt_pending(&self) -> bool {
        self.lsr & LSR_DR != 0 && self.ier & IER_RX_AVAILABLE != 0
    }

    fn transmit(&mut self, byte: u8) {
        let result = self
            .output
            .write_all(&[byte])
            .and_then(|_| self.output.flush());
        if let Err(e) = result {
            warn!("UART output dropped byte {:#04x}: {}", byte, e);
        }
    }
}

impl Default for UartDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for UartDevice {
    fn name(&self) -> &str {
        "UART0"
    }

    fn addresses(&self) -> Vec<PhysAddr> {
        (0..UART_SIZE).map(|i| PhysAddr::new(self.base.wrapping_add(i))).collect()
    }

    fn init(&mut self) -> Result<(), DeviceError> {
        self.rbr = 0;
        self.dll = 0;
        self.dlh = 0;
        self.ier = 0;
        self.fcr = 0;
        self.lcr = 0;
        self.mcr = 0;
        self.lsr = LSR_THRE | LSR_TEMT;
        self.msr = 0;
        self.scr = 0;
        self.output.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, addr: PhysAddr) -> u8 {
        match addr.val().wrapping_sub(self.base) {
            RBR if self.dlab() => self.dll,
            RBR => {
                self.lsr &= !LSR_DR;
                self.rbr
            }
            IER if self.dlab() => self.dlh,
            IER => self.ier,
            IIR => {
                if self.rx_interrupt_pending() {
                    IIR_RX_AVAILABLE
                } else {
                    IIR_NO_INTERRUPT
                }
            }
            LCR => self.lcr,
            MCR => self.mcr,
            LSR => self.lsr,
            MSR => self.msr,
            SCR => self.scr,
            _ => 0,
        }
    }

    fn write_byte(&mut self, addr: PhysAddr, val: u8) {
        match addr.val().wrapping_sub(self.base) {
            DLL if self.dlab() => self.dll = val,
            THR => self.transmit(val),
            DLH if self.dlab() => self.dlh = val,
            IER => self.ier = val & 0x0F,
            FCR => self.fcr = val,
            LCR => self.lcr = val,
            MCR => self.mcr = val,
            SCR => self.scr = val,
            // LSR and MSR are read-only
            _ => {}
        }
    }

    fn tick(&mut self) -> Option<DeviceInterrupt> {
        if self.lsr & LSR_DR == 0 {
            if let Some(byte) = self.input.pop() {
                self.rbr = byte;
                self.lsr |= LSR_DR;
                if self.ier & IER_RX_AVAILABLE != 0 {
                    return self.irq.map(|irq| DeviceInterrupt { irq });
                }
            }
        }
        None
    }
}
