//! File-backed memory device
//!
//! An image file is a byte-for-byte dump of the external memory, so it can be
//! prepared on a host and written to (or read back from) the SRAM.

use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Memory device persisted to a memory-mapped image file
pub struct ImageDevice {
    _file: File,
    map: MmapMut,
    path: PathBuf,
}

impl ImageDevice {
    /// Create (or truncate) an image of `capacity` zero bytes
    pub fn create<P: AsRef<Path>>(path: P, capacity: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(capacity as u64)?;

        Self::map(file, path.as_ref())
    }

    /// Open an existing image; its length is the device capacity
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len > u32::MAX as u64 {
            return Err(StoreError::InvalidLayout(format!(
                "image {:?} is {} bytes, larger than a 32-bit address space",
                path.as_ref(),
                len
            )));
        }

        Self::map(file, path.as_ref())
    }

    fn map(file: File, path: &Path) -> Result<Self> {
        // SAFETY: the image is owned by this process for the lifetime of the
        // device; nothing else truncates it while mapped.
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(ImageDevice {
            _file: file,
            map,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write dirty pages back to the image file
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn check(&self, address: u32, len: u32) -> Result<()> {
        let capacity = self.capacity();
        match address.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(StoreError::AddressOutOfRange { address, capacity }),
        }
    }
}

impl MemoryDevice for ImageDevice {
    fn capacity(&self) -> u32 {
        self.map.len() as u32
    }

    fn read(&self, address: u32) -> Result<u8> {
        self.check(address, 1)?;
        Ok(self.map[address as usize])
    }

    fn write(&mut self, address: u32, value: u8) -> Result<()> {
        self.check(address, 1)?;
        self.map[address as usize] = value;
        Ok(())
    }

    fn fill(&mut self, start: u32, len: u32, value: u8) -> Result<()> {
        self.check(start, len)?;
        self.map[start as usize..(start + len) as usize].fill(value);
        Ok(())
    }
}
