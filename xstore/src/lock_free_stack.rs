//! A lock-free multi-producer, multi-consumer stack (Treiber's algorithm).
//!
//! # ABA
//!
//! `pop` compares the head against the node it observed and swings it to that node's `next`. This
//! is only sound because a node is never reused: every `push` allocates a fresh node, and a popped
//! node is handed to the epoch collector, which frees it once no thread can still hold a reference
//! to it. An address can therefore not reappear at the head while a thread is comparing against
//! its old incarnation.
//!
//! Recycling nodes (e.g. through a free list or the buffer pools) would break this. Doing so
//! requires tagging the head with a generation counter or protecting nodes with hazard pointers.

use std::{mem::ManuallyDrop, ptr, sync::atomic::Ordering};

use crossbeam::epoch::{self, Atomic, Owned};

/// A lock-free stack.
pub struct LockFreeStack<T> {
    head: Atomic<Node<T>>,
}

struct Node<T> {
    item: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

impl<T> LockFreeStack<T> {
    pub fn new() -> Self {
        Self {
            head: Atomic::null(),
        }
    }

    /// Push an item on top of the stack.
    pub fn push(&self, item: T) {
        let mut node = Owned::new(Node {
            item: ManuallyDrop::new(item),
            next: Atomic::null(),
        });

        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Relaxed, &guard);
            node.next.store(head, Ordering::Relaxed);

            match self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard)
            {
                Ok(_) => return,
                Err(err) => node = err.new,
            }
        }
    }

    /// Pop the item on top of the stack. Returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        let guard = epoch::pin();
        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            // SAFETY: the node is only freed after every thread that could have observed it,
            //         including this pinned one, has moved on.
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Ordering::Relaxed, &guard);

            if self
                .head
                .compare_exchange(head, next, Ordering::Relaxed, Ordering::Relaxed, &guard)
                .is_ok()
            {
                // SAFETY: the successful CAS unlinked the node, so no other popper can return
                //         its item. The node itself is freed later and never drops the item.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(ManuallyDrop::into_inner(ptr::read(&node.item)));
                }
            }
        }
    }

    /// Whether the stack was empty at the moment of the call.
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    #[test]
    fn lifo_order() {
        let stack = LockFreeStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None::<u32>);

        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert!(!stack.is_empty());
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        stack.push(4);
        assert_eq!(stack.pop(), Some(4));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn items_are_dropped_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let stack = LockFreeStack::new();
        for _ in 0..10 {
            stack.push(DropCounter(drops.clone()));
        }

        drop(stack.pop());
        drop(stack.pop());
        assert_eq!(drops.load(Ordering::SeqCst), 2);

        drop(stack);
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn concurrent_push_then_pop() {
        const THREADS: usize = 8;
        const ITEMS: usize = 10_000;

        let stack = LockFreeStack::new();
        let popped = std::thread::scope(|s| {
            let handles = (0..THREADS)
                .map(|t| {
                    let stack = &stack;
                    s.spawn(move || {
                        for i in 0..ITEMS {
                            stack.push(t * ITEMS + i);
                        }
                        let mut popped = Vec::with_capacity(ITEMS);
                        for _ in 0..ITEMS {
                            // every thread pops only after its own pushes, so the stack holds at
                            // least as many items as this thread still has to pop.
                            popped.push(stack.pop().expect("stack ran dry"));
                        }
                        popped
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });

        assert!(stack.is_empty());
        assert_eq!(popped.len(), THREADS * ITEMS);
        let mut counts = HashMap::new();
        for item in popped {
            *counts.entry(item).or_insert(0) += 1;
        }
        assert_eq!(counts.len(), THREADS * ITEMS);
        assert!(counts.values().all(|c| *c == 1));
    }
}
