//! Producer-side write contract
//!
//! [`SlotWriter`] is the reference implementation of the protocol's
//! writer contract: any external producer, in any language, must follow
//! the same sequence to interoperate. Bounds-check, lock, copy bytes,
//! commit header with valid set, post the signal, release the lock.

use crate::control::{ControlRegion, SlotHeader};
use crate::segment::DataSegment;
use crate::{Result, ShmError};
use frame_portal_core::PixelFormat;
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes frames into one slot.
///
/// This writer performs its byte copy and header commit inside the
/// control mutex, so two `SlotWriter`s racing for one slot resolve to
/// whole frames, last one wins. The protocol cannot force external
/// producers to copy under the mutex, though; one logical writer per
/// slot is a convention, not enforced.
pub struct SlotWriter {
    control: Arc<ControlRegion>,
    segment: DataSegment,
}

impl SlotWriter {
    /// Bind a writer to an already-mapped control region and segment
    pub fn new(control: Arc<ControlRegion>, segment: DataSegment) -> Self {
        Self { control, segment }
    }

    /// Map the namespace's control region and the slot's data segment,
    /// then bind a writer to them
    pub fn open(namespace: &crate::ShmNamespace, slot: usize) -> Result<Self> {
        let control = Arc::new(ControlRegion::open_or_create(namespace)?);
        let segment = DataSegment::open_or_create(namespace, slot)?;
        Ok(Self::new(control, segment))
    }

    /// Slot index this writer publishes to
    pub fn slot(&self) -> usize {
        self.segment.slot()
    }

    /// Publish one frame: copy the pixels into the slot's segment,
    /// commit the header, and wake the consumer.
    ///
    /// An oversized frame is dropped whole: no header mutation, no
    /// signal, no partial copy. Within a slot the most recent completed
    /// publish wins; earlier unconsumed frames are silently overwritten.
    pub fn publish(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: &[u8],
    ) -> Result<()> {
        let slot = self.segment.slot();
        let required = width as usize * height as usize * format.bytes_per_pixel();
        let capacity = self.segment.capacity();

        if required > capacity {
            warn!(slot, required, capacity, "dropping oversized frame");
            return Err(ShmError::CapacityExceeded { required, capacity });
        }
        if pixels.len() < required {
            return Err(ShmError::TruncatedFrame {
                provided: pixels.len(),
                required,
            });
        }

        let mut guard = self.control.lock()?;
        self.segment.bytes_mut()[..required].copy_from_slice(&pixels[..required]);
        guard.set_header(
            slot,
            SlotHeader {
                width: width as i32,
                height: height as i32,
                bytes_per_pixel: format.bytes_per_pixel() as i32,
                valid: 1,
            },
        );

        // Signal before the mutex drops, matching the wire contract; the
        // consumer re-validates headers under its own lock either way.
        self.control.post_signal()?;
        drop(guard);

        debug!(slot, width, height, bytes = required, "published frame");
        Ok(())
    }
}
