use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Item is already queued")]
    Duplicate,

    #[error("Item is not queued")]
    Absent,

    #[error("New priority {requested} is not lower than {current}")]
    NotLower { current: f64, requested: f64 },

    #[error("Queue is empty")]
    Empty,
}

/// Min-priority queue addressed by item, with decrease-key.
pub trait MinPriorityQueue<T> {
    fn insert(&mut self, item: T, priority: f64) -> Result<(), QueueError>;

    /// Lowers the priority of a queued item. The new priority must be
    /// strictly lower than the current one.
    fn decrease_key(&mut self, item: &T, priority: f64) -> Result<(), QueueError>;

    /// Removes and returns the item with the lowest priority.
    fn remove_min(&mut self) -> Result<(T, f64), QueueError>;

    fn contains(&self, item: &T) -> bool;

    fn priority(&self, item: &T) -> Option<f64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Binary min-heap with a position index, so every operation is O(log n)
/// and `contains` is O(1).
#[derive(Debug, Clone)]
pub struct IndexedBinaryHeap<T> {
    heap: Vec<(T, f64)>,
    positions: HashMap<T, usize>,
}

impl<T: Hash + Eq + Clone> Default for IndexedBinaryHeap<T> {
    fn default() -> Self {
        Self {
            heap: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T: Hash + Eq + Clone> IndexedBinaryHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    pub fn peek(&self) -> Option<(&T, f64)> {
        self.heap.first().map(|(item, priority)| (item, *priority))
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        if let Some(slot) = self.positions.get_mut(&self.heap[i].0) {
            *slot = i;
        }
        if let Some(slot) = self.positions.get_mut(&self.heap[j].0) {
            *slot = j;
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].1 < self.heap[parent].1 {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && self.heap[left].1 < self.heap[smallest].1 {
                smallest = left;
            }
            if right < len && self.heap[right].1 < self.heap[smallest].1 {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }
}

impl<T: Hash + Eq + Clone> MinPriorityQueue<T> for IndexedBinaryHeap<T> {
    fn insert(&mut self, item: T, priority: f64) -> Result<(), QueueError> {
        if self.positions.contains_key(&item) {
            return Err(QueueError::Duplicate);
        }
        let index = self.heap.len();
        self.positions.insert(item.clone(), index);
        self.heap.push((item, priority));
        self.sift_up(index);
        Ok(())
    }

    fn decrease_key(&mut self, item: &T, priority: f64) -> Result<(), QueueError> {
        let index = *self.positions.get(item).ok_or(QueueError::Absent)?;
        let current = self.heap[index].1;
        if !(priority < current) {
            return Err(QueueError::NotLower {
                current,
                requested: priority,
            });
        }
        self.heap[index].1 = priority;
        self.sift_up(index);
        Ok(())
    }

    fn remove_min(&mut self) -> Result<(T, f64), QueueError> {
        if self.heap.is_empty() {
            return Err(QueueError::Empty);
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let (item, priority) = self.heap.pop().ok_or(QueueError::Empty)?;
        self.positions.remove(&item);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Ok((item, priority))
    }

    fn contains(&self, item: &T) -> bool {
        self.positions.contains_key(item)
    }

    fn priority(&self, item: &T) -> Option<f64> {
        self.positions.get(item).map(|&index| self.heap[index].1)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}
