//! Frame Portal - Shared Memory Module
//!
//! POSIX shared-memory frame transport: one control object carrying the
//! synchronization semaphores and per-slot headers, plus one data object
//! per slot holding raw pixel bytes. Producers publish with latest-wins
//! semantics per slot; a single consumer drains every valid slot per
//! wake-up.

pub mod control;
pub mod error;
pub mod region;
pub mod segment;
pub mod writer;

pub use control::*;
pub use error::*;
pub use region::*;
pub use segment::*;
pub use writer::*;

/// Number of frame slots shared by all participants
pub const SLOT_COUNT: usize = 4;

/// Capacity of one slot's data segment: the largest supported frame at
/// 4 bytes per pixel
pub const SLOT_CAPACITY: usize = 2048 * 2048 * 4;

/// Namespace all shared-memory object names derive from.
///
/// Every cooperating process must agree on the prefix; the default is
/// the production namespace, tests isolate themselves with unique ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmNamespace {
    prefix: String,
}

impl ShmNamespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Name of the control object
    pub fn control_name(&self) -> String {
        format!("/{}_ctl", self.prefix)
    }

    /// Name of one slot's data object
    pub fn frame_name(&self, slot: usize) -> String {
        format!("/{}_frame_{}", self.prefix, slot)
    }
}

impl Default for ShmNamespace {
    fn default() -> Self {
        Self::new("frame_portal")
    }
}

/// Remove every object in the namespace from the system.
///
/// The transport never does this on its own; objects persist across
/// process instances for inspection and reuse. This is the explicit
/// manual cleanup step, used by operators and test teardown.
pub fn unlink_all(namespace: &ShmNamespace) -> Result<()> {
    region::unlink(&namespace.control_name())?;
    for slot in 0..SLOT_COUNT {
        region::unlink(&namespace.frame_name(slot))?;
    }
    Ok(())
}
