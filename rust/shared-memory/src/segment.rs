//! Per-slot frame data segments

use crate::region::SharedMemoryRegion;
use crate::{Result, ShmError, ShmNamespace, SLOT_CAPACITY, SLOT_COUNT};

/// One slot's raw pixel store: an independent shared-memory object sized
/// for the largest supported frame.
///
/// Segments carry no framing of their own; the byte length in use comes
/// from the slot's header in the control region, gated by its valid
/// flag.
#[derive(Debug)]
pub struct DataSegment {
    slot: usize,
    region: SharedMemoryRegion,
}

impl DataSegment {
    /// Map the data object for `slot`, creating it at full capacity if
    /// absent
    pub fn open_or_create(namespace: &ShmNamespace, slot: usize) -> Result<Self> {
        if slot >= SLOT_COUNT {
            return Err(ShmError::NoSuchSlot {
                slot,
                count: SLOT_COUNT,
            });
        }
        let region =
            SharedMemoryRegion::open_or_create(&namespace.frame_name(slot), SLOT_CAPACITY)?;
        Ok(Self { slot, region })
    }

    /// Slot index this segment belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Fixed byte capacity of the segment
    pub fn capacity(&self) -> usize {
        self.region.len()
    }

    /// Full view of the segment's bytes
    pub fn bytes(&self) -> &[u8] {
        self.region.as_slice()
    }

    /// Full mutable view of the segment's bytes
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.region.as_slice_mut()
    }
}
