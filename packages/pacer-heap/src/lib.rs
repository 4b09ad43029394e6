//! A small array-backed binary min-heap.
//!
//! Unlike [`std::collections::BinaryHeap`], the ordering is supplied by the
//! caller as a comparator rather than through `Ord`, so the same element type
//! can be queued under different disciplines (the scheduler keys tasks by
//! start time in one heap and by expiration time in another).
//!
//! The heap never breaks ties itself. If two elements compare `Equal`, their
//! relative order is unspecified; callers that need a stable order fold a
//! tie-breaker into the comparator.

use std::cmp::Ordering;
use std::fmt;

/// Comparator used when none is given explicitly.
pub type Comparator<T> = fn(&T, &T) -> Ordering;

pub struct MinHeap<T, C = Comparator<T>> {
    data: Vec<T>,
    compare: C,
}

impl<T: Ord> MinHeap<T> {
    /// Creates a heap ordered by `T`'s natural ordering.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            compare: T::cmp,
        }
    }
}

impl<T: Ord> Default for MinHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> MinHeap<T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    /// Creates a heap ordered by `compare`. `Ordering::Less` means the first
    /// argument sorts before the second.
    pub fn with_comparator(compare: C) -> Self {
        Self {
            data: Vec::new(),
            compare,
        }
    }

    /// Inserts `value`, sifting it up until its parent is not greater.
    pub fn push(&mut self, value: T) {
        self.data.push(value);
        self.sift_up(self.data.len() - 1);
    }

    /// Returns the minimum element without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.data.first()
    }

    /// Removes and returns the minimum element.
    pub fn pop(&mut self) -> Option<T> {
        match self.data.len() {
            0 => None,
            1 => self.data.pop(),
            _ => {
                // Moves the last element into the root slot and hands back the old root.
                let root = self.data.swap_remove(0);
                self.sift_down(0);
                Some(root)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The backing array in heap order. Index `i` has children `2i + 1` and `2i + 2`.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Keeps only the elements for which `keep` returns true, then restores
    /// the heap property bottom-up. O(n).
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.data.retain(keep);
        for index in (0..self.data.len() / 2).rev() {
            self.sift_down(index);
        }
    }

    /// Consumes the heap, returning elements in ascending order.
    pub fn into_sorted_vec(mut self) -> Vec<T> {
        let mut sorted = Vec::with_capacity(self.data.len());
        while let Some(value) = self.pop() {
            sorted.push(value);
        }
        sorted
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if (self.compare)(&self.data[parent], &self.data[index]) == Ordering::Greater {
                self.data.swap(parent, index);
                index = parent;
            } else {
                return;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.data.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            if left >= len {
                return;
            }

            // Pick the smaller of the children that exist.
            let mut child = left;
            if right < len
                && (self.compare)(&self.data[right], &self.data[left]) == Ordering::Less
            {
                child = right;
            }

            if (self.compare)(&self.data[child], &self.data[index]) == Ordering::Less {
                self.data.swap(child, index);
                index = child;
            } else {
                return;
            }
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for MinHeap<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinHeap").field("data", &self.data).finish()
    }
}

/// Renders the tree on its side: the root sits at the left margin, the right
/// subtree above it and the left subtree below, each level indented by six
/// columns.
impl<T: fmt::Display, C> fmt::Display for MinHeap<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render<T: fmt::Display>(
            data: &[T],
            index: usize,
            indent: usize,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            let Some(node) = data.get(index) else {
                return Ok(());
            };
            render(data, 2 * index + 2, indent + 6, f)?;
            writeln!(f, "{:indent$}{}", "", node, indent = indent)?;
            render(data, 2 * index + 1, indent + 6, f)
        }

        render(&self.data, 0, 0, f)
    }
}
