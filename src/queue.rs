//! A binary min-heap with a pluggable ordering.
//!
//! The scheduler keys its events by time using a plain function pointer as the
//! comparator, so the queue is generic over the comparator rather than relying
//! on `Ord`. `compare(a, b)` returns true when `a` should come out before `b`.

/// Min-heap ordered by a comparator.
pub struct PriorityQueue<T, F = fn(&T, &T) -> bool> {
    heap: Vec<T>,
    compare: F,
}

fn less_than<T: PartialOrd>(a: &T, b: &T) -> bool {
    a < b
}

impl<T: PartialOrd> PriorityQueue<T> {
    /// A queue ordered by `<`.
    pub fn new() -> Self {
        Self::with_compare(less_than::<T>)
    }
}

impl<T: PartialOrd> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    pub fn with_compare(compare: F) -> Self {
        Self {
            heap: Vec::new(),
            compare,
        }
    }

    /// Build a heap from arbitrary items in linear time.
    pub fn from_vec(items: Vec<T>, compare: F) -> Self {
        let mut queue = Self {
            heap: items,
            compare,
        };
        queue.heapify();
        queue
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The item that `pop` would return next.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    pub fn push(&mut self, item: T) {
        self.heap.push(item);
        let last = self.heap.len() - 1;
        self.sift_down(0, last);
    }

    pub fn pop(&mut self) -> Option<T> {
        let last = self.heap.pop()?;
        if self.heap.is_empty() {
            return Some(last);
        }
        let top = std::mem::replace(&mut self.heap[0], last);
        self.sift_up(0);
        Some(top)
    }

    /// Keep only the items matching `keep`, then rebuild the heap.
    ///
    /// Returns the number of items removed.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.heap.len();
        self.heap.retain(keep);
        let removed = before - self.heap.len();
        if removed > 0 {
            self.heapify();
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    fn heapify(&mut self) {
        for pos in (0..self.heap.len() / 2).rev() {
            self.sift_up(pos);
        }
    }

    /// Move the item at `pos` towards the root until its parent is not larger.
    /// `start` bounds how far up the item may travel.
    fn sift_down(&mut self, start: usize, mut pos: usize) {
        while pos > start {
            let parent = (pos - 1) >> 1;
            if (self.compare)(&self.heap[pos], &self.heap[parent]) {
                self.heap.swap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    /// Bubble the smaller child up until `pos` reaches a leaf, then sift the
    /// original item back down into place.
    fn sift_up(&mut self, mut pos: usize) {
        let end = self.heap.len();
        let start = pos;
        let mut child = 2 * pos + 1;
        while child < end {
            let right = child + 1;
            if right < end && !(self.compare)(&self.heap[child], &self.heap[right]) {
                child = right;
            }
            self.heap.swap(pos, child);
            pos = child;
            child = 2 * pos + 1;
        }
        self.sift_down(start, pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn pops_in_ascending_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = PriorityQueue::new();
        let mut values: Vec<f64> = (0..500).map(|_| rng.gen_range(-1000.0..1000.0)).collect();
        for v in &values {
            queue.push(*v);
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let mut popped = Vec::new();
        while let Some(v) = queue.pop() {
            popped.push(v);
        }
        assert_eq!(popped, values);
    }

    #[test]
    fn empty_queue_yields_none() {
        let mut queue: PriorityQueue<u32> = PriorityQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.peek().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn custom_comparator_and_heapify() {
        let items = vec![(3, 'c'), (1, 'a'), (5, 'e'), (2, 'b'), (4, 'd')];
        let mut queue = PriorityQueue::from_vec(items, |a: &(i32, char), b: &(i32, char)| a.0 > b.0);
        assert_eq!(queue.peek(), Some(&(5, 'e')));
        let order: Vec<char> = std::iter::from_fn(|| queue.pop().map(|i| i.1)).collect();
        assert_eq!(order, vec!['e', 'd', 'c', 'b', 'a']);
    }

    #[test]
    fn retain_rebuilds_heap() {
        let mut queue = PriorityQueue::new();
        for v in [9, 4, 7, 1, 8, 2, 6, 3, 5] {
            queue.push(v);
        }
        assert_eq!(queue.retain(|v| v % 2 == 1), 4);
        let order: Vec<i32> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(order, vec![1, 3, 5, 7, 9]);
    }
}
