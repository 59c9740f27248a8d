use std::{fmt, ops::Deref, os::raw::c_void, ptr::NonNull, slice};

use crate::v4l2;
use crate::v4l2_sys::{v4l2_memory_V4L2_MEMORY_MMAP, v4l2_memory_V4L2_MEMORY_USERPTR};

/// Memory used for buffer exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Mmap,
    UserPtr,
}

impl Memory {
    /// The `V4L2_MEMORY_*` code
    pub const fn code(self) -> u32 {
        match self {
            Memory::Mmap => v4l2_memory_V4L2_MEMORY_MMAP,
            Memory::UserPtr => v4l2_memory_V4L2_MEMORY_USERPTR,
        }
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Memory::Mmap => write!(f, "memory-mapped"),
            Memory::UserPtr => write!(f, "user pointer"),
        }
    }
}

/// Memory-mapped region of a driver buffer
///
/// The destructor automatically unmaps the memory.
pub struct Mmap {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mmap {
    /// Takes ownership of a mapping created with mmap(2).
    ///
    /// # Safety
    ///
    /// `ptr` must be the start of a live, readable mapping of exactly `len` bytes that
    /// nothing else unmaps.
    pub unsafe fn from_raw(ptr: NonNull<u8>, len: usize) -> Self {
        Mmap { ptr, len }
    }
}

impl Drop for Mmap {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = v4l2::munmap(self.ptr.as_ptr() as *mut c_void, self.len) {
                log::warn!("munmap of {} bytes failed: {}", self.len, e);
            }
        }
    }
}

impl Deref for Mmap {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for Mmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mmap")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
