//! Declared-length ingest session
//!
//! Incoming sample data arrives as an open-ended byte stream after a header
//! announcing slot, type and length. A [`SampleTransfer`] owns the slot for
//! the duration of the stream and makes sure a failed, short or abandoned
//! transfer leaves no half-written sample (and no leaked chain) behind:
//! dropping a transfer without [`SampleTransfer::finish`] deletes the slot.

use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::sample::{SampleHandle, SampleType};
use crate::store::SampleStore;
use tracing::{info, warn};

/// Steps on the transfer progress bar
pub const PROGRESS_STEPS: u8 = 16;

pub struct SampleTransfer<'a, D: MemoryDevice> {
    store: &'a mut SampleStore<D>,
    handle: SampleHandle,
    id: u8,
    cancelled: bool,
    finished: bool,
}

impl<'a, D: MemoryDevice> SampleTransfer<'a, D> {
    /// Create slot `id` (replacing any previous sample) and start receiving
    pub fn begin(
        store: &'a mut SampleStore<D>,
        id: u8,
        sample_type: SampleType,
        declared_size: u32,
    ) -> Result<Self> {
        let mut handle = SampleHandle::new();
        store.new_sample(&mut handle, id, sample_type, declared_size)?;

        Ok(SampleTransfer {
            store,
            handle,
            id,
            cancelled: false,
            finished: false,
        })
    }

    /// Store one data byte; bytes beyond the declared size are dropped
    ///
    /// A storage error cancels the transfer before it is returned.
    pub fn push(&mut self, value: u8) -> Result<()> {
        if self.cancelled {
            return Err(StoreError::EmptySlot(self.id));
        }
        if self.handle.is_done() {
            return Ok(());
        }

        if let Err(e) = self.store.write_serial(&mut self.handle, value) {
            warn!("Transfer into slot {} failed: {}", self.id, e);
            self.cancel();
            return Err(e);
        }
        Ok(())
    }

    pub fn push_all(&mut self, data: &[u8]) -> Result<()> {
        data.iter().try_for_each(|&value| self.push(value))
    }

    /// Completed fraction in `0..=PROGRESS_STEPS`
    pub fn progress(&self) -> u8 {
        let size = self.handle.size();
        if size == 0 {
            return PROGRESS_STEPS;
        }
        (self.handle.bytes_done() as u64 * PROGRESS_STEPS as u64 / size as u64) as u8
    }

    pub fn bytes_received(&self) -> u32 {
        self.handle.bytes_done()
    }

    /// End of stream: keep the sample if its length matches the header
    pub fn finish(mut self) -> Result<SampleHandle> {
        if self.cancelled {
            return Err(StoreError::EmptySlot(self.id));
        }

        let expected = self.handle.size();
        let received = self.handle.bytes_done();
        if received != expected {
            warn!(
                "Transfer into slot {} ended after {} of {} bytes",
                self.id, received, expected
            );
            self.cancel();
            return Err(StoreError::LengthMismatch { expected, received });
        }

        info!("Received sample {} ({} bytes)", self.id, received);
        self.finished = true;
        let mut handle = std::mem::take(&mut self.handle);
        handle.reset();
        Ok(handle)
    }

    /// Drop the partially received sample
    pub fn abort(mut self) -> Result<()> {
        if self.cancelled {
            return Ok(());
        }
        self.cancelled = true;
        self.store.delete(self.id)
    }

    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Err(e) = self.store.delete(self.id) {
            warn!("Could not release slot {} after failed transfer: {}", self.id, e);
        }
    }
}

impl<D: MemoryDevice> Drop for SampleTransfer<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel();
        }
    }
}
