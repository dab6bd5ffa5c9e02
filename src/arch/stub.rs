//! Stub architecture for targets without a real switch implementation.
//!
//! Type-compatible no-ops so the crate still builds on unsupported hosts;
//! no actual context switching occurs here.

use super::Arch;
use portable_atomic::{AtomicBool, Ordering};

/// Saved execution context (stub version).
#[repr(C)]
#[derive(Debug, Default)]
pub struct StubContext {
    pub sp: u64,
    pub pc: u64,
}

pub struct StubArch;

impl Arch for StubArch {
    type SavedContext = StubContext;

    unsafe fn context_switch(_prev: *mut Self::SavedContext, _next: *const Self::SavedContext) {
        // No switch on unsupported targets.
    }

    unsafe fn prepare_context(
        ctx: &mut Self::SavedContext,
        entry: usize,
        stack_top: usize,
        _arg: usize,
    ) {
        ctx.sp = stack_top as u64;
        ctx.pc = entry as u64;
    }

    fn disable_interrupts() {
        IRQ_ENABLED.store(false, Ordering::Release);
    }

    fn enable_interrupts() {
        IRQ_ENABLED.store(true, Ordering::Release);
    }

    fn interrupts_enabled() -> bool {
        IRQ_ENABLED.load(Ordering::Acquire)
    }
}

static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);
