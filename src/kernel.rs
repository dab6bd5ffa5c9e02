//! Kernel core: thread pool, ready queue, and the dispatcher.
//!
//! All scheduling state lives in one [`Kernel`] instance behind a spinlock.
//! Threads are slots in a fixed pool allocated lazily on first use; slot 0
//! is the bootstrap thread, the caller that first entered the kernel, which
//! runs on its original stack and is never spawned or reclaimed.
//!
//! Queue discipline, chosen so that scheduling is fully deterministic:
//! spawn puts the new thread at the *head* of the ready queue (the most
//! recently spawned thread runs first), yield moves the current thread to
//! the *tail* before taking the head (round robin, so every ready thread
//! runs between two yields of any one thread), and a mutex wait list is
//! last-blocked-first-woken.

use crate::arch::{Arch, DefaultArch, IrqGuard};
use crate::errors::{KernelResult, SpawnError};
use crate::mem::Stack;
use crate::sched::Queue;
use crate::thread::{Tcb, ThreadState};
use crate::tick::TickPolicy;
use alloc::vec::Vec;
use core::ptr;
use portable_atomic::{AtomicPtr, AtomicU64, Ordering};

/// Default number of worker slots, matching small-MCU deployments.
pub const DEFAULT_MAX_THREADS: usize = 4;

/// Default per-thread stack size. Generous on a hosted target; shrink it
/// for real boards.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Value written at the base of every worker stack at pool initialization.
pub(crate) const STACK_CANARY: u64 = 0xC0DE_CAFE_DEAD_F00D;

/// Global kernel reference for interrupt service routines.
static GLOBAL_KERNEL: AtomicPtr<()> = AtomicPtr::new(ptr::null_mut());

/// Pool and stack sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Worker slots in the pool, not counting the bootstrap thread.
    pub max_threads: usize,
    /// Bytes per worker stack.
    pub stack_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

/// Everything the scheduler mutates, guarded by one lock.
pub(crate) struct KernelState<A: Arch> {
    /// Slot storage. Never grows after initialization, so raw context
    /// pointers taken during dispatch stay valid across the switch.
    pub(crate) pool: Vec<Tcb<A>>,
    pub(crate) free: Queue,
    pub(crate) ready: Queue,
    /// Slot index of the running thread.
    pub(crate) current: usize,
    /// Threads parked on mutex wait lists.
    pub(crate) blocked: usize,
    initialized: bool,
}

/// A cooperative multithreading kernel instance.
///
/// Instances are independent; nothing is shared between two kernels. The
/// kernel must outlive every thread it runs, which in practice means either
/// a `'static` instance or a scope where every spawned thread has finished
/// before the kernel is dropped.
pub struct Kernel<A: Arch = DefaultArch> {
    state: spin::Mutex<KernelState<A>>,
    config: KernelConfig,
    ticks: AtomicU64,
    tick_policy: spin::Mutex<TickPolicy>,
}

impl<A: Arch> Kernel<A> {
    pub const fn new(config: KernelConfig) -> Self {
        Self {
            state: spin::Mutex::new(KernelState {
                pool: Vec::new(),
                free: Queue::new(),
                ready: Queue::new(),
                current: 0,
                blocked: 0,
                initialized: false,
            }),
            config,
            ticks: AtomicU64::new(0),
            tick_policy: spin::Mutex::new(TickPolicy::Reschedule),
        }
    }

    pub fn config(&self) -> KernelConfig {
        self.config
    }

    /// Allocate the pool on first use. All `max_threads` stacks are carved
    /// out up front, so a later spawn can only fail by exhaustion.
    fn ensure_init(&self, state: &mut KernelState<A>) -> KernelResult<()> {
        if state.initialized {
            return Ok(());
        }
        state.pool.reserve_exact(self.config.max_threads + 1);
        state.pool.push(Tcb::bootstrap());
        for _ in 0..self.config.max_threads {
            let mut stack =
                Stack::allocate(self.config.stack_size).ok_or(SpawnError::OutOfMemory)?;
            stack.install_canary(STACK_CANARY);
            state.pool.push(Tcb::new_worker(stack));
        }
        for slot in 1..=self.config.max_threads {
            state.free.push_back(&mut state.pool, slot);
        }
        state.current = 0;
        state.blocked = 0;
        state.initialized = true;
        log::trace!(
            "kernel: pool initialized, {} worker slots of {} bytes",
            self.config.max_threads,
            self.config.stack_size
        );
        Ok(())
    }

    /// Lock the scheduler state, initializing the pool if this is the
    /// first entry into the kernel. Callers mask interrupts first.
    pub(crate) fn lock_state(&self) -> spin::MutexGuard<'_, KernelState<A>> {
        let mut guard = self.state.lock();
        self.ensure_init(&mut guard)
            .expect("kernel: thread pool initialization failed");
        guard
    }

    /// Spawn `entry(arg)` on a free pool slot.
    ///
    /// The new thread does not run yet; it is placed at the head of the
    /// ready queue and starts at the current thread's next yield.
    pub fn try_spawn(&self, entry: fn(i32), arg: i32) -> KernelResult<()> {
        let _irq = IrqGuard::<A>::new();
        let mut guard = self.state.lock();
        self.ensure_init(&mut guard)?;
        let st = &mut *guard;
        let slot = st
            .free
            .pop_front(&mut st.pool)
            .ok_or(SpawnError::PoolExhausted)?;
        let tcb = &mut st.pool[slot];
        tcb.entry = Some(entry);
        tcb.arg = arg;
        tcb.state = ThreadState::Ready;
        let stack_top = tcb
            .stack
            .as_ref()
            .expect("worker slots always carry a stack")
            .top();
        let trampoline: extern "C" fn(usize) -> ! = run_thread::<A>;
        // SAFETY: the slot owns its stack exclusively; the trampoline is a
        // diverging extern "C" fn, and the kernel pointer stays valid for
        // as long as the thread can run.
        unsafe {
            A::prepare_context(
                &mut tcb.context,
                trampoline as usize,
                stack_top,
                self as *const Self as usize,
            );
        }
        st.ready.push_front(&mut st.pool, slot);
        log::trace!("kernel: spawned slot {} (arg {})", slot, arg);
        Ok(())
    }

    /// Spawn, treating pool exhaustion or allocation failure as fatal.
    pub fn spawn(&self, entry: fn(i32), arg: i32) {
        if let Err(e) = self.try_spawn(entry, arg) {
            panic!("kernel: spawn failed: {}", e);
        }
    }

    /// Hand the CPU to the next ready thread, round robin.
    ///
    /// Returns when this thread is dispatched again. A thread yielding
    /// with nothing else ready requeues and redispatches itself, which
    /// the switch primitive treats as a no-op.
    pub fn yield_now(&self) {
        let _irq = IrqGuard::<A>::new();
        let mut guard = self.lock_state();
        let st = &mut *guard;
        let cur = st.current;
        st.pool[cur].state = ThreadState::Ready;
        st.ready.push_back(&mut st.pool, cur);
        let next = st
            .ready
            .pop_front(&mut st.pool)
            .expect("ready queue cannot be empty after a requeue");
        self.dispatch(guard, next);
    }

    /// Switch from the current thread to `next`. The state lock is
    /// released before the switch so the resumed thread can take it.
    ///
    /// The caller has already filed the current thread wherever it belongs
    /// (ready queue, a wait list) and set its state.
    pub(crate) fn dispatch(&self, mut guard: spin::MutexGuard<'_, KernelState<A>>, next: usize) {
        let st = &mut *guard;
        let prev = st.current;
        st.current = next;
        st.pool[next].state = ThreadState::Running;
        log::trace!("kernel: dispatch {} -> {}", prev, next);
        // Raw projections, not references: prev and next are the same slot
        // when a sole thread redispatches itself.
        let base = st.pool.as_mut_ptr();
        let prev_ctx = unsafe { ptr::addr_of_mut!((*base.add(prev)).context) };
        let next_ctx = unsafe { ptr::addr_of!((*base.add(next)).context) };
        drop(guard);
        // SAFETY: pool storage is stable after init; both contexts outlive
        // the switch, and interrupts are masked by our caller.
        unsafe { A::context_switch(prev_ctx, next_ctx) };
    }

    /// Body of every worker thread: run the entry function, then reclaim
    /// the slot and dispatch whatever is ready next. Never returns.
    fn run_current(&self) -> ! {
        let (entry, arg) = {
            let guard = self.state.lock();
            let tcb = &guard.pool[guard.current];
            (
                tcb.entry.expect("dispatched a slot with no entry point"),
                tcb.arg,
            )
        };
        A::enable_interrupts();
        entry(arg);
        // Thread finished. Its slot goes back on the free list and its
        // context is never resumed again.
        A::disable_interrupts();
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let done = st.current;
        st.pool[done].state = ThreadState::Free;
        st.pool[done].entry = None;
        st.free.push_back(&mut st.pool, done);
        log::trace!("kernel: slot {} exited", done);
        let next = st
            .ready
            .pop_front(&mut st.pool)
            .expect("kernel: ready queue empty at thread exit");
        st.current = next;
        st.pool[next].state = ThreadState::Running;
        // The dying continuation is saved into the reclaimed slot, where a
        // future spawn will overwrite it.
        let base = st.pool.as_mut_ptr();
        let next_ctx = unsafe { ptr::addr_of!((*base.add(next)).context) };
        let dead_ctx = unsafe { ptr::addr_of_mut!((*base.add(done)).context) };
        drop(guard);
        // SAFETY: as in dispatch; interrupts were masked above.
        unsafe { A::context_switch(dead_ctx, next_ctx) };
        panic!("kernel: resumed a reclaimed thread");
    }

    /// Queue lengths as `(free, ready, blocked)`. The running thread is
    /// counted in none of them, so the three plus one always total
    /// `max_threads + 1`.
    pub fn thread_stats(&self) -> (usize, usize, usize) {
        let _irq = IrqGuard::<A>::new();
        let guard = self.lock_state();
        (
            guard.free.len(&guard.pool),
            guard.ready.len(&guard.pool),
            guard.blocked,
        )
    }

    /// True while every worker stack's canary is intact.
    pub fn check_stack_integrity(&self) -> bool {
        let _irq = IrqGuard::<A>::new();
        let guard = self.state.lock();
        guard
            .pool
            .iter()
            .filter_map(|tcb| tcb.stack.as_ref())
            .all(|stack| stack.check_canary(STACK_CANARY))
    }

    /// Number of timer ticks observed so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub(crate) fn bump_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// The policy lock is taken under the interrupt gate, like every other
    /// lock here: the tick ISR reads it, so a foreground holder must not
    /// be interruptible while holding it.
    pub fn set_tick_policy(&self, policy: TickPolicy) {
        let _irq = IrqGuard::<A>::new();
        *self.tick_policy.lock() = policy;
    }

    pub(crate) fn current_tick_policy(&self) -> TickPolicy {
        let _irq = IrqGuard::<A>::new();
        *self.tick_policy.lock()
    }
}

impl Kernel<DefaultArch> {
    /// A kernel with default pool and stack sizing.
    pub const fn with_defaults() -> Self {
        Self::new(KernelConfig {
            max_threads: DEFAULT_MAX_THREADS,
            stack_size: DEFAULT_STACK_SIZE,
        })
    }

    /// Publish this kernel as the instance the interrupt service routines
    /// act on. Only a `'static`, default-architecture kernel can be
    /// published, which keeps retrieval in the ISR entry points
    /// type-correct.
    pub fn register_global(&'static self) {
        GLOBAL_KERNEL.store(self as *const Self as *mut (), Ordering::Release);
    }

    pub(crate) fn global() -> Option<&'static Kernel<DefaultArch>> {
        let ptr = GLOBAL_KERNEL.load(Ordering::Acquire);
        if ptr.is_null() {
            None
        } else {
            // SAFETY: only register_global stores here, and it only
            // accepts &'static Kernel<DefaultArch>.
            Some(unsafe { &*(ptr as *const Kernel<DefaultArch>) })
        }
    }
}

/// Trampoline every worker context starts in; `kernel` is the owning
/// instance, smuggled through the architecture's argument register.
extern "C" fn run_thread<A: Arch>(kernel: usize) -> ! {
    // SAFETY: prepare_context was given a pointer to the kernel that owns
    // this slot, and the kernel outlives its threads.
    let kernel = unsafe { &*(kernel as *const Kernel<A>) };
    kernel.run_current()
}
