use crate::devices::{Device, DeviceInterrupt};
use crate::error::{MemoryError, VmError};
use crate::memory::{Memory, Page, PhysAddr};
use log::debug;
use std::collections::HashMap;

/// Physical address space: demand-allocated 4 KiB frames plus a table of
/// memory-mapped devices. Device addresses are checked before the frame
/// table, so a claimed address never reaches RAM.
pub struct SystemBus {
    pages: HashMap<u32, Page>,
    devices: Vec<Box<dyn Device>>,
    device_map: HashMap<u32, usize>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            devices: Vec::new(),
            device_map: HashMap::new(),
        }
    }

    /// Attach a device to every address it claims and initialise it.
    ///
    /// Fails without attaching anything if any of the addresses already
    /// belongs to another device. Claims are permanent.
    pub fn attach_device(&mut self, mut device: Box<dyn Device>) -> Result<(), VmError> {
        let addresses = device.addresses();
        for addr in &addresses {
            if let Some(&owner) = self.device_map.get(&addr.val()) {
                return Err(MemoryError::AddressClaimed {
                    addr: addr.val(),
                    owner: self.devices[owner].name().to_string(),
                }
                .into());
            }
        }

        device.init()?;
        debug!(
            "attached {} at {} addresses starting {}",
            device.name(),
            addresses.len(),
            addresses.first().copied().unwrap_or(PhysAddr::new(0))
        );

        let index = self.devices.len();
        for addr in addresses {
            self.device_map.insert(addr.val(), index);
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn is_device_address(&self, addr: PhysAddr) -> bool {
        self.device_map.contains_key(&addr.val())
    }

    /// Number of frames allocated so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Copy raw bytes into memory starting at `addr`.
    pub fn load(&mut self, addr: PhysAddr, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.write_byte(addr + i as u32, byte);
        }
    }

    /// Advance every device by one cycle, yielding the interrupts they raise.
    pub fn tick_devices(&mut self) -> impl Iterator<Item = DeviceInterrupt> + '_ {
        self.devices.iter_mut().filter_map(|device| device.tick())
    }

    fn device_for(&mut self, addr: PhysAddr) -> Option<&mut Box<dyn Device>> {
        let index = *self.device_map.get(&addr.val())?;
        self.devices.get_mut(index)
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory for SystemBus {
    fn read_byte(&mut self, addr: PhysAddr) -> u8 {
        if let Some(device) = self.device_for(addr) {
            return device.read_byte(addr);
        }
        // Untouched frames read as zero without being allocated.
        self.pages
            .get(&addr.frame())
            .map_or(0, |page| page.read_byte(addr))
    }

    fn write_byte(&mut self, addr: PhysAddr, val: u8) {
        if let Some(device) = self.device_for(addr) {
            device.write_byte(addr, val);
            return;
        }
        self.pages
            .entry(addr.frame())
            .or_default()
            .write_byte(addr, val);
    }
}
