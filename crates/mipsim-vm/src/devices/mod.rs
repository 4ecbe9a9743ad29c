pub mod uart;

pub use uart::{UartDevice, UartInput, UART_BASE, UART_SIZE};

use crate::error::DeviceError;
use crate::memory::PhysAddr;

/// Interrupt request raised by a device on a hardware interrupt pin (IP2-IP7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInterrupt {
    pub irq: u8,
}

/// A memory-mapped peripheral.
///
/// The bus routes byte accesses to every address in `addresses()` to the
/// device before looking at paged memory.
pub trait Device: Send {
    /// Device name (for debugging)
    fn name(&self) -> &str;

    /// Fixed set of physical addresses claimed by the device.
    fn addresses(&self) -> Vec<PhysAddr>;

    /// Called once when the device is attached to the bus.
    fn init(&mut self) -> Result<(), DeviceError>;

    fn read_byte(&mut self, addr: PhysAddr) -> u8;

    fn write_byte(&mut self, addr: PhysAddr, val: u8);

    /// Called once per VM cycle.
    fn tick(&mut self) -> Option<DeviceInterrupt> {
        None
    }
}
