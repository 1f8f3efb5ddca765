//! LRU replacer - picks eviction victims among unpinned frames.
//!
//! Despite the name, this is not an access-recency LRU over the hot
//! set: the pool only inserts a frame when its pin count drops to zero
//! and erases it when the frame is re-pinned or evicted. The victim is
//! always the frame that has waited longest since its insertion, so
//! the hot path (fetch hits on pinned frames) never touches the
//! replacer at all.
//!
//! The structure is a doubly-linked list of unique values (oldest at
//! the head, newest at the tail) plus a hash index for O(1) erase,
//! guarded by one mutex.

use std::collections::HashMap;
use std::hash::Hash;
use std::ptr::NonNull;

use parking_lot::Mutex;

/// A node in the replacer's linked list.
struct Node<T> {
    value: T,
    prev: Option<NonNull<Node<T>>>,
    next: Option<NonNull<Node<T>>>,
}

struct ReplacerCore<T> {
    /// Map from value to its node for O(1) erase.
    map: HashMap<T, NonNull<Node<T>>>,
    /// Oldest insertion; the next victim.
    head: Option<NonNull<Node<T>>>,
    /// Newest insertion.
    tail: Option<NonNull<Node<T>>>,
}

impl<T: Copy + Eq + Hash> ReplacerCore<T> {
    fn insert(&mut self, value: T) {
        if let Some(&node) = self.map.get(&value) {
            // Already tracked: refresh by moving to the tail.
            self.unlink(node);
            self.push_back(node);
            return;
        }

        let node = Box::new(Node {
            value,
            prev: None,
            next: None,
        });
        let node = NonNull::from(Box::leak(node));
        self.push_back(node);
        self.map.insert(value, node);
    }

    fn victim(&mut self) -> Option<T> {
        let node = self.head?;
        self.unlink(node);
        // Safety: the node came from the list, so we own it exclusively
        // once unlinked.
        let node = unsafe { Box::from_raw(node.as_ptr()) };
        self.map.remove(&node.value);
        Some(node.value)
    }

    fn erase(&mut self, value: T) -> bool {
        match self.map.remove(&value) {
            Some(node) => {
                self.unlink(node);
                // Safety: removed from both the map and the list.
                drop(unsafe { Box::from_raw(node.as_ptr()) });
                true
            }
            None => false,
        }
    }

    fn push_back(&mut self, mut node: NonNull<Node<T>>) {
        unsafe {
            node.as_mut().prev = self.tail;
            node.as_mut().next = None;
            if let Some(mut tail) = self.tail {
                tail.as_mut().next = Some(node);
            }
            self.tail = Some(node);
            if self.head.is_none() {
                self.head = Some(node);
            }
        }
    }

    fn unlink(&mut self, node: NonNull<Node<T>>) {
        unsafe {
            let prev = node.as_ref().prev;
            let next = node.as_ref().next;

            match prev {
                Some(mut prev) => prev.as_mut().next = next,
                None => self.head = next,
            }
            match next {
                Some(mut next) => next.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }
}

impl<T> Drop for ReplacerCore<T> {
    fn drop(&mut self) {
        let mut current = self.head;
        while let Some(node) = current {
            unsafe {
                current = node.as_ref().next;
                drop(Box::from_raw(node.as_ptr()));
            }
        }
    }
}

/// A thread-safe LRU replacer.
///
/// `insert` registers a value as evictable (re-inserting moves it to
/// the back of the queue), `victim` removes and returns the oldest
/// value, `erase` withdraws a value that became ineligible.
pub struct LruReplacer<T> {
    inner: Mutex<ReplacerCore<T>>,
}

// Safety: the raw node pointers are only ever touched under the mutex,
// and nodes are owned by the list itself.
unsafe impl<T: Send> Send for LruReplacer<T> {}
unsafe impl<T: Send> Sync for LruReplacer<T> {}

impl<T: Copy + Eq + Hash> LruReplacer<T> {
    /// Creates an empty replacer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ReplacerCore {
                map: HashMap::new(),
                head: None,
                tail: None,
            }),
        }
    }

    /// Registers `value` as an eviction candidate. If it is already
    /// registered, it moves to the back of the queue.
    pub fn insert(&self, value: T) {
        self.inner.lock().insert(value);
    }

    /// Removes and returns the oldest candidate, or `None` when no
    /// frame is evictable.
    pub fn victim(&self) -> Option<T> {
        self.inner.lock().victim()
    }

    /// Withdraws `value` from the candidate set. Returns whether it
    /// was present.
    pub fn erase(&self, value: T) -> bool {
        self.inner.lock().erase(value)
    }

    /// Returns the number of eviction candidates.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Returns true if no frame is evictable.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Copy + Eq + Hash> Default for LruReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for LruReplacer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruReplacer")
            .field("len", &self.inner.lock().map.len())
            .finish()
    }
}
