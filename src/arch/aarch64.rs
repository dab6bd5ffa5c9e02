//! AArch64 context switching and interrupt masking.
//!
//! Cooperative switches only need the AAPCS64 callee-saved set: x19-x28,
//! the frame pointer, the link register, the stack pointer, and d8-d15.
//! Caller-saved registers are dead across the `extern "C"` call into the
//! switch, and NEON volatile state with them.

use super::Arch;
use core::arch::global_asm;

#[cfg(not(target_os = "none"))]
use portable_atomic::{AtomicBool, Ordering};

/// Saved execution context for AArch64.
///
/// Field order is fixed: the assembly below addresses these by byte offset.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Aarch64Context {
    /// x19-x28 (0x00..0x50)
    pub x: [u64; 10],
    /// x29, frame pointer (0x50)
    pub fp: u64,
    /// x30, link register (0x58)
    pub lr: u64,
    /// Stack pointer (0x60)
    pub sp: u64,
    /// d8-d15, the callee-saved halves of the SIMD registers (0x68..0xa8)
    pub d: [u64; 8],
}

global_asm!(
    r#"
.section .text
.balign 16
.global __coop_context_switch
__coop_context_switch:
    stp x19, x20, [x0, #0x00]
    stp x21, x22, [x0, #0x10]
    stp x23, x24, [x0, #0x20]
    stp x25, x26, [x0, #0x30]
    stp x27, x28, [x0, #0x40]
    stp x29, x30, [x0, #0x50]
    mov x9, sp
    str x9, [x0, #0x60]
    stp d8, d9, [x0, #0x68]
    stp d10, d11, [x0, #0x78]
    stp d12, d13, [x0, #0x88]
    stp d14, d15, [x0, #0x98]

    ldp x19, x20, [x1, #0x00]
    ldp x21, x22, [x1, #0x10]
    ldp x23, x24, [x1, #0x20]
    ldp x25, x26, [x1, #0x30]
    ldp x27, x28, [x1, #0x40]
    ldp x29, x30, [x1, #0x50]
    ldr x9, [x1, #0x60]
    mov sp, x9
    ldp d8, d9, [x1, #0x68]
    ldp d10, d11, [x1, #0x78]
    ldp d12, d13, [x1, #0x88]
    ldp d14, d15, [x1, #0x98]
    ret

// Bootstrap shim for a thread's first resumption. prepare_context leaves the
// entry point in x19 and its argument in x20; the entry never returns.
.balign 16
.global __coop_thread_start
__coop_thread_start:
    mov x0, x20
    br x19
"#
);

extern "C" {
    fn __coop_context_switch(prev: *mut Aarch64Context, next: *const Aarch64Context);
    fn __coop_thread_start() -> !;
}

pub struct Aarch64Arch;

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe { __coop_context_switch(prev, next) }
    }

    unsafe fn prepare_context(
        ctx: &mut Self::SavedContext,
        entry: usize,
        stack_top: usize,
        arg: usize,
    ) {
        let start: unsafe extern "C" fn() -> ! = __coop_thread_start;

        ctx.x = [0; 10];
        ctx.x[0] = entry as u64; // x19
        ctx.x[1] = arg as u64; // x20
        ctx.fp = 0;
        ctx.lr = start as usize as u64;
        ctx.sp = (stack_top & !0xF) as u64; // SP must stay 16-aligned
        ctx.d = [0; 8];
    }

    #[cfg(target_os = "none")]
    fn disable_interrupts() {
        unsafe { core::arch::asm!("msr daifset, #2", options(nomem, nostack)) };
    }

    #[cfg(target_os = "none")]
    fn enable_interrupts() {
        unsafe { core::arch::asm!("msr daifclr, #2", options(nomem, nostack)) };
    }

    #[cfg(target_os = "none")]
    fn interrupts_enabled() -> bool {
        let daif: u64;
        unsafe {
            core::arch::asm!(
                "mrs {daif}, daif",
                daif = out(reg) daif,
                options(nomem, nostack)
            );
        }
        daif & 0x80 == 0 // I bit masks IRQs when set
    }

    #[cfg(not(target_os = "none"))]
    fn disable_interrupts() {
        IRQ_ENABLED.store(false, Ordering::Release);
    }

    #[cfg(not(target_os = "none"))]
    fn enable_interrupts() {
        IRQ_ENABLED.store(true, Ordering::Release);
    }

    #[cfg(not(target_os = "none"))]
    fn interrupts_enabled() -> bool {
        IRQ_ENABLED.load(Ordering::Acquire)
    }
}

// Hosted builds have no DAIF to poke; model the single CPU's mask state so
// the gate discipline stays observable in tests.
#[cfg(not(target_os = "none"))]
static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);
