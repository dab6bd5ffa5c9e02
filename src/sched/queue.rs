//! Intrusive singly linked queue over thread-pool slots.
//!
//! The queue owns no storage of its own: links live inside the pool entries
//! themselves, addressed by slot index, so a TCB can sit in at most one
//! queue at a time and membership transfers are a couple of index writes.

/// Storage that carries an intrusive `next` link.
pub(crate) trait Linked {
    fn next_slot(&self) -> Option<usize>;
    fn set_next_slot(&mut self, next: Option<usize>);
}

/// An ordered list of pool-slot indices.
///
/// `push_front`/`pop_front` are O(1); `push_back` walks the links, which is
/// fine for pools of a handful of threads. An entry must not be pushed
/// while it is a member of any queue.
#[derive(Debug, Default)]
pub struct Queue {
    head: Option<usize>,
}

impl Queue {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert `slot` at the head.
    pub(crate) fn push_front<T: Linked>(&mut self, pool: &mut [T], slot: usize) {
        debug_assert!(pool[slot].next_slot().is_none());
        pool[slot].set_next_slot(self.head);
        self.head = Some(slot);
    }

    /// Insert `slot` at the tail, walking the links to find it.
    pub(crate) fn push_back<T: Linked>(&mut self, pool: &mut [T], slot: usize) {
        debug_assert!(pool[slot].next_slot().is_none());
        match self.head {
            None => self.head = Some(slot),
            Some(first) => {
                let mut tail = first;
                while let Some(next) = pool[tail].next_slot() {
                    tail = next;
                }
                pool[tail].set_next_slot(Some(slot));
            }
        }
    }

    /// Remove and return the head slot, clearing its link.
    pub(crate) fn pop_front<T: Linked>(&mut self, pool: &mut [T]) -> Option<usize> {
        let slot = self.head?;
        self.head = pool[slot].next_slot();
        pool[slot].set_next_slot(None);
        Some(slot)
    }

    /// Number of entries, by link walk.
    pub(crate) fn len<T: Linked>(&self, pool: &[T]) -> usize {
        let mut count = 0;
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            count += 1;
            cursor = pool[slot].next_slot();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[derive(Default)]
    struct Node {
        next: Option<usize>,
    }

    impl Linked for Node {
        fn next_slot(&self) -> Option<usize> {
            self.next
        }

        fn set_next_slot(&mut self, next: Option<usize>) {
            self.next = next;
        }
    }

    fn nodes(n: usize) -> alloc::vec::Vec<Node> {
        let mut v = vec![];
        v.resize_with(n, Node::default);
        v
    }

    #[test]
    fn test_empty_queue() {
        let mut pool = nodes(4);
        let mut q = Queue::new();
        assert!(q.is_empty());
        assert_eq!(q.pop_front(&mut pool), None);
        assert_eq!(q.len(&pool), 0);
    }

    #[test]
    fn test_push_front_is_lifo() {
        let mut pool = nodes(4);
        let mut q = Queue::new();
        q.push_front(&mut pool, 1);
        q.push_front(&mut pool, 2);
        q.push_front(&mut pool, 3);
        assert_eq!(q.len(&pool), 3);
        assert_eq!(q.pop_front(&mut pool), Some(3));
        assert_eq!(q.pop_front(&mut pool), Some(2));
        assert_eq!(q.pop_front(&mut pool), Some(1));
        assert!(q.is_empty());
    }

    #[test]
    fn test_push_back_is_fifo() {
        let mut pool = nodes(4);
        let mut q = Queue::new();
        q.push_back(&mut pool, 1);
        q.push_back(&mut pool, 2);
        q.push_back(&mut pool, 3);
        assert_eq!(q.pop_front(&mut pool), Some(1));
        assert_eq!(q.pop_front(&mut pool), Some(2));
        assert_eq!(q.pop_front(&mut pool), Some(3));
    }

    #[test]
    fn test_mixed_discipline() {
        let mut pool = nodes(4);
        let mut q = Queue::new();
        q.push_front(&mut pool, 0);
        q.push_back(&mut pool, 1);
        q.push_front(&mut pool, 2);
        // Order: 2, 0, 1
        assert_eq!(q.pop_front(&mut pool), Some(2));
        assert_eq!(q.pop_front(&mut pool), Some(0));
        assert_eq!(q.pop_front(&mut pool), Some(1));
    }

    #[test]
    fn test_pop_clears_link() {
        let mut pool = nodes(2);
        let mut q = Queue::new();
        q.push_front(&mut pool, 0);
        q.push_front(&mut pool, 1);
        let popped = q.pop_front(&mut pool).unwrap();
        assert_eq!(pool[popped].next_slot(), None);
        // A popped slot can immediately join another queue.
        let mut other = Queue::new();
        other.push_front(&mut pool, popped);
        assert_eq!(other.pop_front(&mut pool), Some(popped));
    }
}
