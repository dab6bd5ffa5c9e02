#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Minimal cooperative multithreading for bare-metal targets.
//!
//! A [`Kernel`] manages a fixed pool of threads that share one CPU by
//! yielding explicitly. Threads are spawned from a function pointer and an
//! `i32` argument, scheduled round robin, and synchronized with blocking
//! binary [`Mutex`]es that hand ownership directly to the next waiter.
//! Timer ticks and edge interrupts enter the kernel through
//! [`tick::timer_isr`] and [`tick::edge_isr`] once a kernel instance has
//! been registered.
//!
//! State is per-instance: two kernels never share anything, so the whole
//! scheduler can be exercised in ordinary host tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use cooperative_threads::{Kernel, yield_now};
//! use spin::Lazy;
//!
//! static KERNEL: Lazy<Kernel> = Lazy::new(Kernel::with_defaults);
//!
//! fn worker(arg: i32) {
//!     // do a slice of work
//!     KERNEL.yield_now();
//!     // do the rest
//!     let _ = arg;
//! }
//!
//! fn main_thread() {
//!     KERNEL.register_global();
//!     KERNEL.spawn(worker, 1);
//!     KERNEL.spawn(worker, 2);
//!     KERNEL.yield_now(); // workers run until they yield back
//! }
//! ```

pub mod arch;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod tick;

#[cfg(test)]
extern crate std;

extern crate alloc;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal builds; hosted targets use std's.
#[cfg(all(not(test), target_os = "none"))]
use core::panic::PanicInfo;

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    // On panic, mask interrupts and halt.
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    #[cfg(target_arch = "x86_64")]
    unsafe {
        core::arch::asm!("cli", options(nomem, nostack));
    }
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
        #[cfg(target_arch = "x86_64")]
        unsafe {
            core::arch::asm!("hlt", options(nomem, nostack));
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{critical, Arch, DefaultArch, IrqGuard};

// Kernel
pub use kernel::{Kernel, KernelConfig, DEFAULT_MAX_THREADS, DEFAULT_STACK_SIZE};

// Synchronization
pub use sync::Mutex;

// Threads
pub use thread::ThreadState;

// Memory management
pub use mem::Stack;

// Interrupt integration
pub use tick::{edge_isr, timer_isr, TickPolicy};

// Errors
pub use errors::{KernelResult, SpawnError};

/// Yield on the globally registered kernel.
///
/// Cooperative: the current thread goes to the back of the ready queue and
/// the head runs. Does nothing until a kernel has been registered with
/// [`Kernel::register_global`].
#[inline]
pub fn yield_now() {
    if let Some(kernel) = kernel::Kernel::global() {
        kernel.yield_now();
    }
}
