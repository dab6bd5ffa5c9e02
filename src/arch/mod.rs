//! Architecture abstraction for context switching and the interrupt gate.
//!
//! The kernel never touches machine state directly; everything it needs from
//! the CPU is behind the [`Arch`] trait: an opaque saved execution context,
//! the switch primitive, and interrupt masking for critical sections.

use core::marker::PhantomData;

/// Architecture abstraction trait.
///
/// Implemented once per supported CPU. The saved context must be complete
/// enough that resuming it reproduces the exact point of suspension: stack
/// pointer, return address, and every callee-saved register.
pub trait Arch {
    /// Architecture-specific saved execution context.
    type SavedContext: Send + Sync + Default;

    /// Capture the calling thread's continuation into `prev` and resume
    /// `next`.
    ///
    /// The call returns only when some later switch resumes `prev`; until
    /// then control runs wherever `next` was suspended. Switching a context
    /// to itself is a no-op and returns immediately.
    ///
    /// # Safety
    ///
    /// - `prev` and `next` must point to valid, properly aligned contexts
    ///   that stay alive until the switch (and any eventual resumption of
    ///   `prev`) has completed.
    /// - `next` must hold either a context captured by a previous switch or
    ///   one built by [`Arch::prepare_context`].
    /// - Must be called with interrupts masked.
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Build a bootstrap continuation for a brand-new thread.
    ///
    /// The first time `ctx` is resumed, execution enters `entry(arg)` on the
    /// stack whose highest usable address is `stack_top`. `entry` is the
    /// address of an `extern "C" fn(usize) -> !`; it must never return.
    ///
    /// # Safety
    ///
    /// `stack_top` must be the top of a writable region large enough for the
    /// thread's frames, exclusively owned by the new thread.
    unsafe fn prepare_context(
        ctx: &mut Self::SavedContext,
        entry: usize,
        stack_top: usize,
        arg: usize,
    );

    /// Mask all maskable interrupts on the current CPU.
    fn disable_interrupts();

    /// Unmask interrupts on the current CPU.
    fn enable_interrupts();

    /// Whether interrupts are currently unmasked.
    fn interrupts_enabled() -> bool;
}

/// Scoped interrupt mask: the kernel's critical-section primitive.
///
/// Construction records the current mask state and disables interrupts; drop
/// restores what was recorded rather than unconditionally re-enabling, so
/// nested sections (an ISR calling back into the scheduler, say) unwind
/// correctly.
pub struct IrqGuard<A: Arch> {
    was_enabled: bool,
    _arch: PhantomData<A>,
}

impl<A: Arch> IrqGuard<A> {
    #[inline]
    pub fn new() -> Self {
        let was_enabled = A::interrupts_enabled();
        A::disable_interrupts();
        Self {
            was_enabled,
            _arch: PhantomData,
        }
    }
}

impl<A: Arch> Default for IrqGuard<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> Drop for IrqGuard<A> {
    #[inline]
    fn drop(&mut self) {
        if self.was_enabled {
            A::enable_interrupts();
        }
    }
}

/// Run `body` with interrupts masked, restoring the previous mask state
/// afterwards.
#[inline]
pub fn critical<A: Arch, R>(body: impl FnOnce() -> R) -> R {
    let _guard = IrqGuard::<A>::new();
    body()
}

#[cfg(target_arch = "x86_64")]
pub mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::X64Arch as DefaultArch;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

// Other hosts get type-compatible stubs; no actual switching occurs there.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub mod stub;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub use stub::StubArch as DefaultArch;
