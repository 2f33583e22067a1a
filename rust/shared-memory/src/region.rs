//! Shared memory region management

use crate::{Result, ShmError};
use std::num::NonZeroUsize;
use std::os::fd::AsRawFd;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;

/// Mapped POSIX shared-memory object.
///
/// Dropping a region unmaps this process's view only; the underlying
/// object persists until someone explicitly calls [`unlink`].
#[derive(Debug)]
pub struct SharedMemoryRegion {
    /// Object name (leading slash included)
    name: String,
    /// Mapping size in bytes
    size: usize,
    /// Mapped base address
    ptr: NonNull<u8>,
}

impl SharedMemoryRegion {
    /// Open the named object, creating it at `size` bytes if absent, and
    /// map it read/write.
    ///
    /// The size is fixed and agreed by all cooperating processes, so the
    /// ftruncate is a no-op for an object that already exists at the
    /// right size.
    pub fn open_or_create(name: &str, size: usize) -> Result<Self> {
        validate_name(name)?;

        let fd = mman::shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )
        .map_err(|e| ShmError::os("shm_open", e))?;

        nix::unistd::ftruncate(&fd, size as libc::off_t)
            .map_err(|e| ShmError::os("ftruncate", e))?;

        let stat =
            nix::sys::stat::fstat(fd.as_raw_fd()).map_err(|e| ShmError::os("fstat", e))?;
        if (stat.st_size as usize) < size {
            return Err(ShmError::SizeMismatch {
                name: name.to_owned(),
                expected: size,
                actual: stat.st_size as usize,
            });
        }

        let length = NonZeroUsize::new(size)
            .ok_or_else(|| ShmError::MapFailed("zero-sized mapping".to_string()))?;
        let ptr = unsafe {
            mman::mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(&fd),
                0,
            )
        }
        .map_err(|e| ShmError::MapFailed(format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| ShmError::MapFailed("mmap returned null".to_string()))?;

        // The fd is not needed once the mapping exists; it closes when
        // `fd` goes out of scope here.
        Ok(Self {
            name: name.to_owned(),
            size,
            ptr,
        })
    }

    /// Object name this region was opened under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapping size in bytes
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Base address of the mapping
    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Get a slice view of the memory
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    /// Get a mutable slice view of the memory
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        // Unmap only. The object stays in the system for other
        // processes or a later instance; removal is an explicit,
        // external step via `unlink`.
        let _ = unsafe {
            mman::munmap(self.ptr.as_ptr() as *mut std::ffi::c_void, self.size)
        };
    }
}

// Safety: SharedMemoryRegion can be sent between threads
unsafe impl Send for SharedMemoryRegion {}
// Safety: SharedMemoryRegion can be shared between threads with proper synchronization
unsafe impl Sync for SharedMemoryRegion {}

/// Remove a named object from the system.
///
/// Never called by the transport itself; exists for operators and test
/// teardown. A missing object is not an error.
pub fn unlink(name: &str) -> Result<()> {
    validate_name(name)?;
    match mman::shm_unlink(name) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ENOENT) => Ok(()),
        Err(e) => Err(ShmError::os("shm_unlink", e)),
    }
}

/// Validate an object name
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 255 {
        return Err(ShmError::InvalidName(format!(
            "bad length {}",
            name.len()
        )));
    }
    if name.contains('\0') {
        return Err(ShmError::InvalidName("contains null byte".to_string()));
    }
    Ok(())
}
