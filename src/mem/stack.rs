//! Heap-backed thread stacks with overflow canaries.

use core::alloc::Layout;
use core::ptr::NonNull;

const STACK_ALIGN: usize = 16;

/// An owned stack region. Stacks grow downward: `top` is the high address
/// handed to a fresh context as its initial stack pointer, `base` the low
/// address where the canary lives.
pub struct Stack {
    memory: NonNull<u8>,
    size: usize,
}

impl Stack {
    /// Allocate a `size`-byte stack, or `None` if the allocator refuses.
    pub fn allocate(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, STACK_ALIGN).ok()?;
        // SAFETY: layout has non-zero size for any usable stack size.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        let memory = NonNull::new(ptr)?;
        Some(Self { memory, size })
    }

    /// Lowest address of the region.
    pub fn base(&self) -> usize {
        self.memory.as_ptr() as usize
    }

    /// Highest usable address, aligned down for the initial stack pointer.
    pub fn top(&self) -> usize {
        (self.memory.as_ptr() as usize + self.size) & !(STACK_ALIGN - 1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Write `canary` at the base of the region. A later mismatch in
    /// [`check_canary`](Self::check_canary) means the thread ran off the
    /// end of its stack.
    pub fn install_canary(&mut self, canary: u64) {
        // SAFETY: we own the region and a stack is always > 8 bytes.
        unsafe { (self.memory.as_ptr() as *mut u64).write_unaligned(canary) };
    }

    pub fn check_canary(&self, canary: u64) -> bool {
        // SAFETY: same region the canary was written to.
        unsafe { (self.memory.as_ptr() as *const u64).read_unaligned() == canary }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.size, STACK_ALIGN)
            .expect("layout was valid at allocation");
        // SAFETY: allocated with this exact layout in `allocate`.
        unsafe { alloc::alloc::dealloc(self.memory.as_ptr(), layout) };
    }
}

// The region is exclusively owned and only touched by the thread running
// on it (or the kernel while that thread is parked).
unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_bounds() {
        let stack = Stack::allocate(4096).expect("allocation");
        assert_eq!(stack.size(), 4096);
        assert!(stack.top() > stack.base());
        assert_eq!(stack.top() % STACK_ALIGN, 0);
        assert!(stack.top() <= stack.base() + 4096);
    }

    #[test]
    fn test_canary_roundtrip() {
        let mut stack = Stack::allocate(1024).expect("allocation");
        stack.install_canary(0xDEAD_BEEF_CAFE_F00D);
        assert!(stack.check_canary(0xDEAD_BEEF_CAFE_F00D));
        assert!(!stack.check_canary(0x1234_5678_9ABC_DEF0));
    }

    #[test]
    fn test_canary_detects_overwrite() {
        let mut stack = Stack::allocate(1024).expect("allocation");
        stack.install_canary(0xDEAD_BEEF_CAFE_F00D);
        // Simulate a thread scribbling past the end of its stack.
        unsafe { (stack.base() as *mut u64).write_unaligned(0) };
        assert!(!stack.check_canary(0xDEAD_BEEF_CAFE_F00D));
    }
}
