//! Sample playback reader
//!
//! Feeds the DMC channel one byte per tick. When the sample's declared size
//! has been played the handle is rewound; a looping voice keeps going, a
//! one-shot voice falls silent until restarted.

use crate::device::MemoryDevice;
use crate::error::Result;
use crate::sample::SampleHandle;
use crate::store::SampleStore;

#[derive(Debug, Clone)]
pub struct Playback {
    handle: SampleHandle,
    looping: bool,
    enabled: bool,
}

impl Playback {
    /// Start playing a loaded handle from its current position
    pub fn new(handle: SampleHandle, looping: bool) -> Self {
        Playback {
            enabled: handle.size() > 0,
            handle,
            looping,
        }
    }

    /// Next output byte, or `None` once a one-shot sample has ended
    ///
    /// Bytes are passed through as raw 8-bit PCM regardless of sample type.
    pub fn next_byte<D: MemoryDevice>(&mut self, store: &SampleStore<D>) -> Result<Option<u8>> {
        if !self.enabled {
            return Ok(None);
        }

        let value = store.read_byte(&mut self.handle)?;

        if self.handle.bytes_done() == self.handle.size() {
            self.handle.reset();
            if !self.looping {
                self.enabled = false;
            }
        }
        Ok(Some(value))
    }

    /// Rewind and re-enable
    pub fn restart(&mut self) {
        self.handle.reset();
        self.enabled = self.handle.size() > 0;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn handle(&self) -> &SampleHandle {
        &self.handle
    }
}
