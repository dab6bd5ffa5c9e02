//! Blocking binary mutexes with direct handoff.
//!
//! A [`Mutex`] here is a scheduling primitive, not a data guard: `lock`
//! parks the calling thread when the mutex is held, and `unlock` with
//! waiters present passes ownership straight to the head waiter and
//! dispatches it. The `locked` flag never drops to false during a handoff,
//! so no third thread can steal the mutex between release and wakeup.
//!
//! The mutex does not record its owner; as in the classic semaphore, any
//! thread may call `unlock`. Unlocking a free mutex with no waiters is a
//! no-op.

use crate::arch::{Arch, IrqGuard};
use crate::kernel::Kernel;
use crate::sched::Queue;
use crate::thread::ThreadState;

struct MutexInner {
    locked: bool,
    /// Parked threads, last-blocked-first-woken.
    waiters: Queue,
}

/// A binary mutex whose waiters block cooperatively.
///
/// The inner spinlock only guards the flag and the wait list for the
/// duration of a kernel call; it is never held across a context switch.
pub struct Mutex {
    inner: spin::Mutex<MutexInner>,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            inner: spin::Mutex::new(MutexInner {
                locked: false,
                waiters: Queue::new(),
            }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    pub fn has_waiters(&self) -> bool {
        !self.inner.lock().waiters.is_empty()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> Kernel<A> {
    /// Acquire `mutex`, blocking the current thread when it is held.
    ///
    /// A blocked thread leaves the ready queue entirely; it returns from
    /// this call only when an `unlock` hands the mutex over. On return the
    /// mutex is owned by the caller.
    pub fn lock(&self, mutex: &Mutex) {
        let _irq = IrqGuard::<A>::new();
        let mut inner = mutex.inner.lock();
        if !inner.locked {
            inner.locked = true;
            return;
        }
        let mut guard = self.lock_state();
        let st = &mut *guard;
        let cur = st.current;
        st.pool[cur].state = ThreadState::Blocked;
        inner.waiters.push_front(&mut st.pool, cur);
        st.blocked += 1;
        log::trace!("mutex: slot {} blocked", cur);
        let next = st
            .ready
            .pop_front(&mut st.pool)
            .expect("kernel: every runnable thread is blocked");
        // The mutex lock must be released before switching away, or the
        // dispatched thread could spin on it forever.
        drop(inner);
        self.dispatch(guard, next);
        // Resumed by direct handoff: the mutex is ours, and its locked
        // flag never went false in between.
    }

    /// Release `mutex`.
    ///
    /// With waiters present the head waiter receives the mutex directly
    /// and is dispatched at once; the caller moves to the ready tail and
    /// resumes later. With no waiters the flag is simply cleared, and
    /// unlocking an already-free mutex does nothing.
    pub fn unlock(&self, mutex: &Mutex) {
        let _irq = IrqGuard::<A>::new();
        let mut inner = mutex.inner.lock();
        let mut guard = self.lock_state();
        let st = &mut *guard;
        match inner.waiters.pop_front(&mut st.pool) {
            None => inner.locked = false,
            Some(waiter) => {
                // Handoff: `locked` stays true, ownership moves to the
                // waiter before anyone else can observe the mutex free.
                st.blocked -= 1;
                let cur = st.current;
                st.pool[cur].state = ThreadState::Ready;
                st.ready.push_back(&mut st.pool, cur);
                log::trace!("mutex: handoff to slot {}", waiter);
                drop(inner);
                self.dispatch(guard, waiter);
            }
        }
    }
}
