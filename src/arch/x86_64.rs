//! x86-64 context switching and interrupt masking.
//!
//! The switch saves only what the System V ABI makes the callee's problem:
//! rbx, rbp, r12-r15 and the stack pointer. Everything else is dead across
//! an `extern "C"` call, so a cooperative switch can ignore it. The same
//! code runs bare-metal and in user mode, which is how the test suite drives
//! real context switches on a Linux host.

use super::Arch;
use core::arch::global_asm;

#[cfg(not(target_os = "none"))]
use portable_atomic::{AtomicBool, Ordering};

/// Saved execution context for x86-64.
///
/// Field order is fixed: the assembly below addresses these by byte offset.
#[repr(C)]
#[derive(Debug, Default)]
pub struct X64Context {
    pub rsp: u64, // 0x00
    pub rbp: u64, // 0x08
    pub rbx: u64, // 0x10
    pub r12: u64, // 0x18
    pub r13: u64, // 0x20
    pub r14: u64, // 0x28
    pub r15: u64, // 0x30
}

global_asm!(
    r#"
.section .text
.balign 16
.global __coop_context_switch
__coop_context_switch:
    mov [rdi + 0x00], rsp
    mov [rdi + 0x08], rbp
    mov [rdi + 0x10], rbx
    mov [rdi + 0x18], r12
    mov [rdi + 0x20], r13
    mov [rdi + 0x28], r14
    mov [rdi + 0x30], r15
    mov rsp, [rsi + 0x00]
    mov rbp, [rsi + 0x08]
    mov rbx, [rsi + 0x10]
    mov r12, [rsi + 0x18]
    mov r13, [rsi + 0x20]
    mov r14, [rsi + 0x28]
    mov r15, [rsi + 0x30]
    ret

// Bootstrap shim for a thread's first resumption. prepare_context leaves the
// entry point in r12 and its argument in r13; the shim moves the argument
// into the first-parameter slot and calls in. The entry never returns.
.balign 16
.global __coop_thread_start
__coop_thread_start:
    mov rdi, r13
    call r12
    ud2
"#
);

extern "C" {
    fn __coop_context_switch(prev: *mut X64Context, next: *const X64Context);
    fn __coop_thread_start() -> !;
}

pub struct X64Arch;

impl Arch for X64Arch {
    type SavedContext = X64Context;

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

        // One slot below a 16-byte boundary, holding the shim's address: the
        // switch's `ret` pops it, leaving rsp 16-aligned at the shim and
        // 8-mod-16 at the entry function, exactly as after a normal call.
        let mut sp = stack_top & !0xF;
        sp -= core::mem::size_of::<u64>();
        unsafe { (sp as *mut u64).write(start as usize as u64) };

        ctx.rsp = sp as u64;
        ctx.rbp = 0;
        ctx.rbx = 0;
        ctx.r12 = entry as u64;
        ctx.r13 = arg as u64;
        ctx.r14 = 0;
        ctx.r15 = 0;
    }

    #[cfg(target_os = "none")]
    fn disable_interrupts() {
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) };
    }

    #[cfg(target_os = "none")]
    fn enable_interrupts() {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
    }

    #[cfg(target_os = "none")]
    fn interrupts_enabled() -> bool {
        let rflags: u64;
        unsafe {
            core::arch::asm!(
                "pushfq",
                "pop {rflags}",
                rflags = out(reg) rflags,
                options(nomem)
            );
        }
        rflags & (1 << 9) != 0 // IF flag
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

// Hosted builds have no interrupt flag to poke; model the single CPU's mask
// state so the gate discipline stays observable in tests.
#[cfg(not(target_os = "none"))]
static IRQ_ENABLED: AtomicBool = AtomicBool::new(true);
