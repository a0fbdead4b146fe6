//! Abstraction over userspace stack switching.
//!
//! Provides an implementation for every supported CPU architecture.

use std::arch::global_asm;

/// Handle to a stack pointer set up for context switching.
#[repr(transparent)]
#[derive(Debug, Copy, Clone)]
pub(super) struct Continuation(*const ());

extern "C" {
    /// Initializes a fresh stack for context switching.
    ///
    /// [stack] is the upper end of the stack memory (stacks grow downward)
    /// and must be 16-byte aligned. The first [jump] to the returned
    /// continuation enters [func].
    pub(super) fn prepare_stack(stack: *mut u8, func: extern "C" fn() -> !) -> Continuation;

    /// Executes a context switch.
    ///
    /// Spills callee-saved registers, sets [from] to the updated stack pointer.
    /// Sets the stack pointer to [to], restores registers.
    ///
    /// The call returns when some later jump resumes the continuation saved
    /// through [from].
    pub(super) fn jump(from: *mut Continuation, to: *const Continuation);
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("weft only supports x86_64 and aarch64");

#[cfg(target_arch = "x86_64")]
global_asm!(include_str!("assembly/x86_64.s"));

#[cfg(target_arch = "aarch64")]
global_asm!(include_str!("assembly/aarch64.s"));
