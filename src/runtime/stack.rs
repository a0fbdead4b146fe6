//! Task stack memory.

use std::num::NonZeroUsize;
use std::{ffi, io, ptr};

#[cfg(not(target_os = "linux"))]
compile_error!("weft only supports Linux");

/// Why a stack could not be built.
///
/// The two stages fail independently: a partially built stack (mapped but
/// not guarded) is unmapped before the error is returned.
#[derive(Debug, thiserror::Error)]
pub(super) enum StackError {
    #[error("failed to map stack memory")]
    Map(#[source] io::Error),

    #[error("failed to protect the stack's guard pages")]
    Guard(#[source] io::Error),
}

#[derive(Debug)]
pub(super) struct Stack {
    pointer: *mut u8,
    length: usize,
}

impl Stack {
    /// Allocates a general purpose stack.
    /// Demand paging ensures that physical memory is allocated only as necessary, during a page fault.
    /// The stack is protected from overflow using guard pages.
    pub(super) fn new(guard_pages: NonZeroUsize, usable_pages: NonZeroUsize) -> Result<Self, StackError> {
        let (guard_pages, usable_pages) = (guard_pages.get(), usable_pages.get());
        let length = (guard_pages + usable_pages) * page_size();

        // kernel allocates an unused block of virtual memory
        let pointer = unsafe {
            libc::mmap(
                ptr::null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if pointer == libc::MAP_FAILED {
            let error = io::Error::last_os_error();
            return Err(StackError::Map(error));
        }

        // if guarding memory goes wrong then mmap gets cleaned up in Stack's drop
        let stack = Stack {
            pointer: pointer as *mut u8,
            length,
        };

        // located at the lowest addresses since the stack grows downward
        let result = unsafe { libc::mprotect(pointer, guard_pages * page_size(), libc::PROT_NONE) };
        if result == -1 {
            let error = io::Error::last_os_error();
            return Err(StackError::Guard(error));
        }

        Ok(stack)
    }

    /// Upper end of the stack memory, where execution starts.
    pub(super) fn base(&self) -> *mut u8 {
        // safety: part of same allocation, can't overflow
        unsafe { self.pointer.add(self.length) }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let result = unsafe { libc::munmap(self.pointer as *mut ffi::c_void, self.length) };
        assert_eq!(result, 0);
    }
}

pub(super) fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
