#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("unimplemented instruction {word:#010x} at {pc:#010x}")]
    Unimplemented { pc: u32, word: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("bit {bit} is writable but not readable (mask1 {mask1:#010x}, mask2 {mask2:#010x})")]
    InvalidMask { bit: u32, mask1: u32, mask2: u32 },

    #[error("cop0 register ({reg}, {sel}): {source}")]
    Register {
        reg: u8,
        sel: u8,
        #[source]
        source: Box<ConfigError>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("address {addr:#010x} already claimed by device {owner}")]
    AddressClaimed { addr: u32, owner: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}
