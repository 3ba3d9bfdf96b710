//! Sample types and the streaming handle

use crate::device::MemoryCursor;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Encoding of a sample's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SampleType {
    /// Unsigned 8-bit PCM, written straight to the DMC raw register
    #[default]
    Raw = 0,
    /// 4-bit delta-compressed PCM
    Dpcm = 1,
}

impl SampleType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SampleType::Raw),
            1 => Ok(SampleType::Dpcm),
            _ => Err(StoreError::InvalidSampleType(value)),
        }
    }
}

/// Read/write position within one sample's chain
///
/// Handles are plain values owned by the caller; any number may be open at
/// once. The store never checks `bytes_done` against `size`, so readers stop
/// (or loop) on their own. A fresh handle points at no chain until
/// `new_sample` or `load` opens it.
#[derive(Debug, Clone, Default)]
pub struct SampleHandle {
    pub(crate) sample_type: SampleType,
    pub(crate) size: u32,
    pub(crate) first_block: u16,
    pub(crate) current_block: u16,
    pub(crate) current_position: u16,
    pub(crate) bytes_done: u32,
    pub(crate) cursor: MemoryCursor,
    pub(crate) opened: bool,
}

impl SampleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind to the first byte of the chain
    pub fn reset(&mut self) {
        self.current_block = self.first_block;
        self.current_position = 0;
        self.bytes_done = 0;
    }

    pub fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn first_block(&self) -> u16 {
        self.first_block
    }

    pub fn current_block(&self) -> u16 {
        self.current_block
    }

    pub fn current_position(&self) -> u16 {
        self.current_position
    }

    pub fn bytes_done(&self) -> u32 {
        self.bytes_done
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// True once every byte of the declared size has been streamed
    pub fn is_done(&self) -> bool {
        self.bytes_done >= self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_codes() {
        assert_eq!(SampleType::from_u8(0).unwrap(), SampleType::Raw);
        assert_eq!(SampleType::from_u8(1).unwrap(), SampleType::Dpcm);
        assert_eq!(SampleType::Dpcm as u8, 1);
        assert!(matches!(
            SampleType::from_u8(7),
            Err(StoreError::InvalidSampleType(7))
        ));
    }

    #[test]
    fn test_reset_rewinds_cursor_only() {
        let mut handle = SampleHandle {
            sample_type: SampleType::Dpcm,
            size: 3000,
            first_block: 4,
            current_block: 9,
            current_position: 17,
            bytes_done: 2065,
            ..Default::default()
        };
        handle.reset();

        assert_eq!(handle.current_block(), 4);
        assert_eq!(handle.current_position(), 0);
        assert_eq!(handle.bytes_done(), 0);
        assert_eq!(handle.size(), 3000);
        assert_eq!(handle.sample_type(), SampleType::Dpcm);
    }

    #[test]
    fn test_new_handle_is_closed() {
        let mut handle = SampleHandle::new();
        assert!(!handle.is_open());
        handle.reset();
        assert!(!handle.is_open());
    }
}
