//! Control region: the shared block of semaphores and slot headers
//!
//! All cooperating processes map the same control object. It carries the
//! counting "signal" semaphore a writer posts after each publish, the
//! binary "mutex" semaphore serializing every header access, and one
//! [`SlotHeader`] per slot. The mutex and signal are process-shared
//! `sem_t` values living inside the mapping itself.

use crate::region::SharedMemoryRegion;
use crate::{Result, ShmError, ShmNamespace, SLOT_CAPACITY, SLOT_COUNT};
use nix::errno::Errno;
use tracing::debug;

/// Per-slot frame header. Written by producers, cleared by the consumer,
/// always under the control mutex.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHeader {
    pub width: i32,
    pub height: i32,
    /// 3 (RGB) or 4 (RGBA)
    pub bytes_per_pixel: i32,
    /// Non-zero while the slot holds an unconsumed frame
    pub valid: i32,
}

impl SlotHeader {
    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }

    /// Byte length the header claims for its frame
    pub fn frame_len(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize
            * self.bytes_per_pixel.max(0) as usize
    }

    /// Whether the claimed frame fits a slot's data segment
    pub fn fits_slot(&self) -> bool {
        self.frame_len() <= SLOT_CAPACITY
    }
}

/// Shared control block layout.
///
/// The `initialized` flag is co-located with the semaphores so the
/// check-then-init races only at true first creation: the first opener
/// runs `sem_init` exactly once, re-openers never reset live semaphores.
#[repr(C)]
struct ControlBlock {
    initialized: i32,
    signal: libc::sem_t,
    mutex: libc::sem_t,
    headers: [SlotHeader; SLOT_COUNT],
}

/// Mapped control region plus the synchronization capabilities over it:
/// a ready signal ([`wait_signal`]/[`post_signal`]) and an exclusive
/// header view ([`lock`]).
///
/// [`wait_signal`]: ControlRegion::wait_signal
/// [`post_signal`]: ControlRegion::post_signal
/// [`lock`]: ControlRegion::lock
pub struct ControlRegion {
    region: SharedMemoryRegion,
}

impl ControlRegion {
    /// Map the namespace's control object, creating and initializing it
    /// if this is the first opener anywhere.
    pub fn open_or_create(namespace: &ShmNamespace) -> Result<Self> {
        let region = SharedMemoryRegion::open_or_create(
            &namespace.control_name(),
            std::mem::size_of::<ControlBlock>(),
        )?;
        let this = Self { region };

        let block = this.block();
        unsafe {
            if (*block).initialized == 0 {
                if libc::sem_init(std::ptr::addr_of_mut!((*block).signal), 1, 0) != 0 {
                    return Err(ShmError::sem("sem_init(signal)"));
                }
                if libc::sem_init(std::ptr::addr_of_mut!((*block).mutex), 1, 1) != 0 {
                    return Err(ShmError::sem("sem_init(mutex)"));
                }
                (*block).initialized = 1;
                debug!(name = %this.region.name(), "initialized control region");
            }
        }

        Ok(this)
    }

    fn block(&self) -> *mut ControlBlock {
        self.region.base_ptr() as *mut ControlBlock
    }

    fn signal_ptr(&self) -> *mut libc::sem_t {
        unsafe { std::ptr::addr_of_mut!((*self.block()).signal) }
    }

    fn mutex_ptr(&self) -> *mut libc::sem_t {
        unsafe { std::ptr::addr_of_mut!((*self.block()).mutex) }
    }

    /// Block until a writer posts the ready signal
    pub fn wait_signal(&self) -> Result<()> {
        loop {
            if unsafe { libc::sem_wait(self.signal_ptr()) } == 0 {
                return Ok(());
            }
            if Errno::last() != Errno::EINTR {
                return Err(ShmError::sem("sem_wait(signal)"));
            }
        }
    }

    /// Consume one pending signal token without blocking; returns
    /// whether a token was taken
    pub fn try_wait_signal(&self) -> Result<bool> {
        loop {
            if unsafe { libc::sem_trywait(self.signal_ptr()) } == 0 {
                return Ok(true);
            }
            match Errno::last() {
                Errno::EAGAIN => return Ok(false),
                Errno::EINTR => continue,
                _ => return Err(ShmError::sem("sem_trywait(signal)")),
            }
        }
    }

    /// Post the ready signal, waking the consumer
    pub fn post_signal(&self) -> Result<()> {
        if unsafe { libc::sem_post(self.signal_ptr()) } == 0 {
            Ok(())
        } else {
            Err(ShmError::sem("sem_post(signal)"))
        }
    }

    /// Acquire the header mutex; it is released when the guard drops
    pub fn lock(&self) -> Result<HeaderGuard<'_>> {
        loop {
            if unsafe { libc::sem_wait(self.mutex_ptr()) } == 0 {
                return Ok(HeaderGuard { control: self });
            }
            if Errno::last() != Errno::EINTR {
                return Err(ShmError::sem("sem_wait(mutex)"));
            }
        }
    }
}

// Safety: the mapping is process-shared by design and every header
// access goes through the cross-process mutex
unsafe impl Send for ControlRegion {}
unsafe impl Sync for ControlRegion {}

/// Exclusive view of the slot header array.
///
/// Holding the guard holds the cross-process mutex, so the critical
/// section should stay bounded: header reads/writes and at most one
/// frame copy.
pub struct HeaderGuard<'a> {
    control: &'a ControlRegion,
}

impl HeaderGuard<'_> {
    fn header_ptr(&self, slot: usize) -> *mut SlotHeader {
        assert!(slot < SLOT_COUNT, "slot {slot} out of range");
        unsafe { std::ptr::addr_of_mut!((*self.control.block()).headers[slot]) }
    }

    /// Copy of one slot's header
    pub fn header(&self, slot: usize) -> SlotHeader {
        unsafe { std::ptr::read(self.header_ptr(slot)) }
    }

    /// Overwrite one slot's header
    pub fn set_header(&mut self, slot: usize, header: SlotHeader) {
        unsafe { std::ptr::write(self.header_ptr(slot), header) }
    }

    /// Clear a slot's valid flag; the consumer's exclusive right
    pub fn clear_valid(&mut self, slot: usize) {
        let ptr = self.header_ptr(slot);
        unsafe { std::ptr::write(std::ptr::addr_of_mut!((*ptr).valid), 0) }
    }

    /// Whether any slot currently holds an unconsumed frame
    pub fn any_valid(&self) -> bool {
        (0..SLOT_COUNT).any(|slot| self.header(slot).is_valid())
    }
}

impl Drop for HeaderGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::sem_post(self.control.mutex_ptr());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::unlink;

    fn test_namespace(tag: &str) -> ShmNamespace {
        ShmNamespace::new(format!("fp_ctl_{}_{}", tag, uuid::Uuid::new_v4().simple()))
    }

    #[test]
    fn test_initialize_once_across_reopen() {
        let ns = test_namespace("once");

        let control = ControlRegion::open_or_create(&ns).unwrap();
        control.post_signal().unwrap();
        drop(control);

        // Re-opening must not reset the live semaphores: the token
        // posted through the first mapping is still pending.
        let control = ControlRegion::open_or_create(&ns).unwrap();
        assert!(control.try_wait_signal().unwrap());
        assert!(!control.try_wait_signal().unwrap());
        drop(control);

        unlink(&ns.control_name()).unwrap();
    }

    #[test]
    fn test_headers_start_invalid() {
        let ns = test_namespace("fresh");

        let control = ControlRegion::open_or_create(&ns).unwrap();
        let guard = control.lock().unwrap();
        assert!(!guard.any_valid());
        for slot in 0..SLOT_COUNT {
            assert_eq!(guard.header(slot).frame_len(), 0);
        }
        drop(guard);
        drop(control);

        unlink(&ns.control_name()).unwrap();
    }

    #[test]
    fn test_header_updates_visible_across_mappings() {
        let ns = test_namespace("update");

        let writer_side = ControlRegion::open_or_create(&ns).unwrap();
        let reader_side = ControlRegion::open_or_create(&ns).unwrap();

        {
            let mut guard = writer_side.lock().unwrap();
            guard.set_header(
                2,
                SlotHeader {
                    width: 64,
                    height: 64,
                    bytes_per_pixel: 4,
                    valid: 1,
                },
            );
        }

        {
            let mut guard = reader_side.lock().unwrap();
            let header = guard.header(2);
            assert!(header.is_valid());
            assert_eq!(header.frame_len(), 64 * 64 * 4);
            assert!(guard.any_valid());
            guard.clear_valid(2);
        }

        let guard = writer_side.lock().unwrap();
        assert!(!guard.any_valid());
        // Dimensions survive the clear; only the flag drops
        assert_eq!(guard.header(2).width, 64);
        drop(guard);

        drop(reader_side);
        drop(writer_side);
        unlink(&ns.control_name()).unwrap();
    }

    #[test]
    fn test_oversized_header_detected() {
        let header = SlotHeader {
            width: 2049,
            height: 2048,
            bytes_per_pixel: 4,
            valid: 1,
        };
        assert!(!header.fits_slot());

        let exact = SlotHeader {
            width: 2048,
            height: 2048,
            bytes_per_pixel: 4,
            valid: 1,
        };
        assert!(exact.fits_slot());
    }
}
