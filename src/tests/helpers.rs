//! Shared scaffolding for scheduler tests.
//!
//! Worker entry points are plain `fn(i32)`, so the kernel and any shared
//! mutex under test are published through thread-locals before spawning.
//! Thread-locals survive a context switch because switching stacks leaves
//! the TLS register alone, and each `#[test]` runs on its own OS thread,
//! so logs never bleed between tests.
//!
//! Workers must never panic: unwinding through a hand-built stack frame
//! aborts the process. Workers only record events; assertions happen back
//! on the test's own stack.

use crate::kernel::Kernel;
use crate::sync::Mutex;
use core::cell::{Cell, RefCell};
use core::ptr;
use std::vec::Vec;

std::thread_local! {
    static EVENTS: RefCell<Vec<i32>> = const { RefCell::new(Vec::new()) };
    static KERNEL: Cell<*const Kernel> = const { Cell::new(ptr::null()) };
    static MUTEX: Cell<*const Mutex> = const { Cell::new(ptr::null()) };
}

/// Publish `kernel` to this test's workers and clear the event log.
pub(crate) fn setup(kernel: &Kernel) {
    EVENTS.with(|e| e.borrow_mut().clear());
    KERNEL.with(|c| c.set(kernel as *const _));
    MUTEX.with(|c| c.set(ptr::null()));
}

pub(crate) fn set_mutex(mutex: &Mutex) {
    MUTEX.with(|c| c.set(mutex as *const _));
}

/// The kernel published by [`setup`]. The returned reference is only used
/// while the kernel is alive on the test's stack.
pub(crate) fn kernel() -> &'static Kernel {
    let ptr = KERNEL.with(|c| c.get());
    assert!(!ptr.is_null(), "setup() not called");
    unsafe { &*ptr }
}

pub(crate) fn mutex() -> &'static Mutex {
    let ptr = MUTEX.with(|c| c.get());
    assert!(!ptr.is_null(), "set_mutex() not called");
    unsafe { &*ptr }
}

pub(crate) fn log_event(value: i32) {
    EVENTS.with(|e| e.borrow_mut().push(value));
}

pub(crate) fn take_events() -> Vec<i32> {
    EVENTS.with(|e| e.borrow_mut().drain(..).collect())
}

// --- common worker bodies ---

/// Logs its argument and exits.
pub(crate) fn oneshot_worker(arg: i32) {
    log_event(arg);
}

/// Logs its argument, yields once, then logs `arg + 100`.
pub(crate) fn two_phase_worker(arg: i32) {
    log_event(arg);
    kernel().yield_now();
    log_event(arg + 100);
}

/// Runs three rounds of log-then-yield.
pub(crate) fn chatty_worker(arg: i32) {
    for _ in 0..3 {
        log_event(arg);
        kernel().yield_now();
    }
}

/// Takes the shared mutex, logs, yields inside the critical section, logs
/// again, then releases. Interleaved critical sections would show up as
/// split log pairs.
pub(crate) fn mutex_worker(arg: i32) {
    let k = kernel();
    k.lock(mutex());
    log_event(arg);
    k.yield_now();
    log_event(arg + 100);
    k.unlock(mutex());
}

/// Blocks on the shared mutex, then records whether the mutex was still
/// held when `lock` returned (positive arg: handoff kept it locked).
pub(crate) fn handoff_observer(arg: i32) {
    let k = kernel();
    k.lock(mutex());
    log_event(if mutex().is_locked() { arg } else { -arg });
    k.unlock(mutex());
    log_event(arg + 100);
}

/// Fills a local buffer, yields, then verifies nothing scribbled on it
/// (positive arg: buffer intact).
pub(crate) fn stack_scribbler(arg: i32) {
    let buf = [arg; 64];
    kernel().yield_now();
    let intact = buf.iter().all(|&v| v == arg);
    log_event(if intact { arg } else { -arg });
}
