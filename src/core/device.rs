//! Byte-addressable memory device abstraction
//!
//! The store only ever talks to memory through [`MemoryDevice`]: random
//! access for table records and [`MemoryCursor`] for streaming sample data.
//! Multi-byte values are stored little-endian.

use crate::error::{Result, StoreError};

/// Flat byte-addressable store of fixed capacity
pub trait MemoryDevice {
    /// Total number of addressable bytes
    fn capacity(&self) -> u32;

    /// Read the byte at `address`
    fn read(&self, address: u32) -> Result<u8>;

    /// Write `value` at `address`
    fn write(&mut self, address: u32, value: u8) -> Result<()>;

    fn read_word(&self, address: u32) -> Result<u16> {
        Ok(u16::from_le_bytes([self.read(address)?, self.read(address + 1)?]))
    }

    fn write_word(&mut self, address: u32, value: u16) -> Result<()> {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo)?;
        self.write(address + 1, hi)
    }

    fn read_dword(&self, address: u32) -> Result<u32> {
        Ok(u32::from_le_bytes([
            self.read(address)?,
            self.read(address + 1)?,
            self.read(address + 2)?,
            self.read(address + 3)?,
        ]))
    }

    fn write_dword(&mut self, address: u32, value: u32) -> Result<()> {
        for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write(address + offset as u32, byte)?;
        }
        Ok(())
    }

    /// Set `len` bytes starting at `start` to `value`
    fn fill(&mut self, start: u32, len: u32, value: u8) -> Result<()> {
        for address in start..start + len {
            self.write(address, value)?;
        }
        Ok(())
    }

    /// Zero the whole device
    fn clear(&mut self) -> Result<()> {
        let capacity = self.capacity();
        self.fill(0, capacity, 0)
    }
}

/// Auto-incrementing address for sequential access
///
/// Each cursor carries its own address, so any number of them can stream
/// over the same device without disturbing each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCursor {
    address: u32,
}

impl MemoryCursor {
    pub fn new(address: u32) -> Self {
        MemoryCursor { address }
    }

    pub fn set_address(&mut self, address: u32) {
        self.address = address;
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    /// Read the byte under the cursor and advance by one
    pub fn read_sequential<D: MemoryDevice + ?Sized>(&mut self, device: &D) -> Result<u8> {
        let value = device.read(self.address)?;
        self.address += 1;
        Ok(value)
    }

    /// Write a byte under the cursor and advance by one
    pub fn write_sequential<D: MemoryDevice + ?Sized>(
        &mut self,
        device: &mut D,
        value: u8,
    ) -> Result<()> {
        device.write(self.address, value)?;
        self.address += 1;
        Ok(())
    }
}

/// Volatile in-memory device
#[derive(Debug, Clone)]
pub struct RamDevice {
    bytes: Vec<u8>,
}

impl RamDevice {
    /// Create a zeroed device of `capacity` bytes
    pub fn new(capacity: u32) -> Self {
        RamDevice {
            bytes: vec![0u8; capacity as usize],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        RamDevice { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check(&self, address: u32, len: u32) -> Result<()> {
        let capacity = self.capacity();
        match address.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(StoreError::AddressOutOfRange { address, capacity }),
        }
    }
}

impl MemoryDevice for RamDevice {
    fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn read(&self, address: u32) -> Result<u8> {
        self.check(address, 1)?;
        Ok(self.bytes[address as usize])
    }

    fn write(&mut self, address: u32, value: u8) -> Result<()> {
        self.check(address, 1)?;
        self.bytes[address as usize] = value;
        Ok(())
    }

    fn fill(&mut self, start: u32, len: u32, value: u8) -> Result<()> {
        self.check(start, len)?;
        self.bytes[start as usize..(start + len) as usize].fill(value);
        Ok(())
    }
}
