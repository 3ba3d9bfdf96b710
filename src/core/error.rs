use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Out of space: no free blocks available")]
    OutOfSpace,

    #[error("Invalid sample id: {0} (valid ids are 0..=99)")]
    InvalidSampleId(u8),

    #[error("Invalid block index: {0}")]
    InvalidBlock(u16),

    #[error("Chain starting at block {start} has no end after {walked} blocks")]
    ChainCorruption { start: u16, walked: usize },

    #[error("Double free of block {0}")]
    DoubleFree(u16),

    #[error("Allocation tree node at block {node} claims space but has no free child")]
    TreeCorruption { node: u16 },

    #[error("Read past the end of the chain at block {0}")]
    EndOfChain(u16),

    #[error("Sample slot {0} is empty")]
    EmptySlot(u8),

    #[error("Sample handle is not open")]
    HandleNotOpen,

    #[error("Invalid sample type: {0}")]
    InvalidSampleType(u8),

    #[error("Address {address:#x} is outside the device (capacity {capacity:#x})")]
    AddressOutOfRange { address: u32, capacity: u32 },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Transfer length mismatch: expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u32, received: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
