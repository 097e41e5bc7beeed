//! Patterns that walk a list of items.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{into_items, Item, Pattern, Repeats};
use crate::error::{Error, Result};

/// Walk `list` from `position`, mapping each step to a list index with
/// `index_of`, until a value comes out or `in_range` says stop.
///
/// Literal values advance the position. A nested pattern keeps the position
/// until it is exhausted, at which point it is reset and skipped. Bails out
/// once a whole list's worth of items has come up empty in a row.
fn draw<T: Clone>(
    list: &mut [Item<T>],
    position: &mut usize,
    in_range: impl Fn(usize) -> bool,
    index_of: impl Fn(usize) -> usize,
) -> Option<T> {
    let len = list.len();
    if len == 0 {
        return None;
    }

    let mut misses = 0;
    while in_range(*position) && misses <= len {
        let item = &mut list[index_of(*position)];
        match item.value() {
            Some(value) => {
                if !item.is_pattern() {
                    *position += 1;
                }
                return Some(value);
            }
            None => {
                item.reset();
                *position += 1;
                misses += 1;
            }
        }
    }
    None
}

fn reset_all<T: Clone>(list: &mut [Item<T>]) {
    for item in list {
        item.reset();
    }
}

/// Loop through a list `repeats` times.
pub struct Sequence<T> {
    list: Vec<Item<T>>,
    repeats: Repeats,
    position: usize,
    offset: usize,
}

impl<T: Clone + Send> Sequence<T> {
    pub fn new(list: Vec<Item<T>>, repeats: usize) -> Self {
        Self {
            list,
            repeats: Repeats::Times(repeats),
            position: 0,
            offset: 0,
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = T>, repeats: usize) -> Self {
        Self::new(into_items(values), repeats)
    }

    /// A sequence that never runs out.
    pub fn looping(list: Vec<Item<T>>) -> Self {
        Self {
            repeats: Repeats::Infinite,
            ..Self::new(list, 1)
        }
    }

    /// Start from `offset` into the list rather than its first element.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Look at the next value. Literal values are not consumed; a nested
    /// pattern is advanced, since it cannot be inspected without drawing.
    pub fn peek(&mut self) -> Option<T> {
        let len = self.list.len();
        if len == 0 || !self.repeats.allows(self.position, len) {
            return None;
        }
        let index = (self.position + self.offset) % len;
        match self.list[index].value() {
            Some(value) => Some(value),
            None => self.next(),
        }
    }
}

impl<T: Clone + Send> Pattern<T> for Sequence<T> {
    fn next(&mut self) -> Option<T> {
        let len = self.list.len();
        let (repeats, offset) = (self.repeats, self.offset);
        draw(
            &mut self.list,
            &mut self.position,
            |position| repeats.allows(position, len),
            |position| (position + offset) % len,
        )
    }

    fn reset(&mut self) {
        self.position = 0;
        reset_all(&mut self.list);
    }
}

/// Step through a list, producing `length` values in total and wrapping
/// around the list as often as needed.
pub struct Series<T> {
    list: Vec<Item<T>>,
    length: Repeats,
    position: usize,
    offset: usize,
}

impl<T: Clone> Series<T> {
    pub fn new(list: Vec<Item<T>>, length: usize) -> Self {
        Self {
            list,
            length: Repeats::Times(length),
            position: 0,
            offset: 0,
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = T>, length: usize) -> Self {
        Self::new(into_items(values), length)
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl<T: Clone + Send> Pattern<T> for Series<T> {
    fn next(&mut self) -> Option<T> {
        let len = self.list.len();
        let (length, offset) = (self.length, self.offset);
        draw(
            &mut self.list,
            &mut self.position,
            |position| length.allows(position, 1),
            |position| (position + offset) % len,
        )
    }

    fn reset(&mut self) {
        self.position = 0;
        reset_all(&mut self.list);
    }
}

/// Loop through a list in a random order, `repeats` times.
///
/// The order is drawn once and kept for every repeat; `reset` draws a new one.
pub struct Shuffle<T> {
    list: Vec<Item<T>>,
    order: Vec<usize>,
    repeats: Repeats,
    position: usize,
    rng: StdRng,
}

impl<T: Clone> Shuffle<T> {
    pub fn new(list: Vec<Item<T>>, repeats: usize) -> Self {
        let mut shuffle = Self {
            order: (0..list.len()).collect(),
            list,
            repeats: Repeats::Times(repeats),
            position: 0,
            rng: StdRng::from_entropy(),
        };
        shuffle.order.shuffle(&mut shuffle.rng);
        shuffle
    }

    pub fn from_values(values: impl IntoIterator<Item = T>, repeats: usize) -> Self {
        Self::new(into_items(values), repeats)
    }

    /// Use a fixed seed, for reproducible orderings.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.order.sort_unstable();
        self.order.shuffle(&mut self.rng);
        self
    }
}

impl<T: Clone + Send> Pattern<T> for Shuffle<T> {
    fn next(&mut self) -> Option<T> {
        let len = self.list.len();
        let repeats = self.repeats;
        let order = &self.order;
        draw(
            &mut self.list,
            &mut self.position,
            |position| repeats.allows(position, len),
            |position| order[position % len],
        )
    }

    fn reset(&mut self) {
        self.position = 0;
        reset_all(&mut self.list);
        self.order.shuffle(&mut self.rng);
    }
}

/// Pick `repeats` random items from a list, uniformly or by weight.
///
/// A nested pattern that gets picked is drawn from until it runs out before
/// the next pick is made.
pub struct Choose<T> {
    list: Vec<Item<T>>,
    weights: Option<WeightedIndex<f64>>,
    repeats: usize,
    position: usize,
    current: Option<usize>,
    rng: StdRng,
}

impl<T: Clone> Choose<T> {
    pub fn new(list: Vec<Item<T>>, repeats: usize) -> Self {
        Self {
            list,
            weights: None,
            repeats,
            position: 0,
            current: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = T>, repeats: usize) -> Self {
        Self::new(into_items(values), repeats)
    }

    /// Pick items with probability proportional to `weights`.
    pub fn weighted(list: Vec<Item<T>>, weights: &[f64], repeats: usize) -> Result<Self> {
        if weights.len() != list.len() {
            return Err(Error::InvalidConfig(format!(
                "{} weights given for {} choices",
                weights.len(),
                list.len()
            )));
        }
        let index = WeightedIndex::new(weights)
            .map_err(|e| Error::InvalidConfig(format!("choice weights: {e}")))?;
        Ok(Self {
            weights: Some(index),
            ..Self::new(list, repeats)
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn pick(&mut self) -> usize {
        match &self.weights {
            Some(weights) => weights.sample(&mut self.rng),
            None => self.rng.gen_range(0..self.list.len()),
        }
    }
}

impl<T: Clone + Send> Pattern<T> for Choose<T> {
    fn next(&mut self) -> Option<T> {
        let len = self.list.len();
        if len == 0 {
            return None;
        }

        let mut misses = 0;
        while self.position < self.repeats && misses <= len {
            let index = match self.current.take() {
                Some(index) => index,
                None => self.pick(),
            };
            let item = &mut self.list[index];
            match item.value() {
                Some(value) => {
                    if item.is_pattern() {
                        self.current = Some(index);
                    } else {
                        self.position += 1;
                    }
                    return Some(value);
                }
                None => {
                    item.reset();
                    self.position += 1;
                    misses += 1;
                }
            }
        }
        None
    }

    fn reset(&mut self) {
        self.position = 0;
        self.current = None;
        reset_all(&mut self.list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T>(pattern: &mut impl Pattern<T>) -> Vec<T> {
        std::iter::from_fn(|| pattern.next()).take(1000).collect()
    }

    #[test]
    fn sequence_repeats_then_exhausts() {
        let mut seq = Sequence::from_values([1, 2, 3], 2);
        assert_eq!(drain(&mut seq), vec![1, 2, 3, 1, 2, 3]);
        assert_eq!(seq.next(), None);

        seq.reset();
        assert_eq!(seq.next(), Some(1));
    }

    #[test]
    fn sequence_offset_and_peek() {
        let mut seq = Sequence::from_values(['a', 'b', 'c'], 1).with_offset(1);
        assert_eq!(seq.peek(), Some('b'));
        assert_eq!(seq.peek(), Some('b'));
        assert_eq!(drain(&mut seq), vec!['b', 'c', 'a']);
        assert_eq!(seq.peek(), None);
    }

    #[test]
    fn peek_draws_from_a_nested_pattern() {
        let inner = Sequence::from_values([10, 20], 1);
        let mut outer = Sequence::new(vec![Item::pattern(inner), Item::Value(1)], 1);
        assert_eq!(outer.peek(), Some(10));
        assert_eq!(drain(&mut outer), vec![20, 1]);
    }

    #[test]
    fn nested_sequence_runs_to_completion() {
        let inner = Sequence::from_values([10, 20], 1);
        let mut outer = Sequence::new(vec![Item::Value(1), Item::pattern(inner)], 2);
        assert_eq!(drain(&mut outer), vec![1, 10, 20, 1, 10, 20]);
    }

    #[test]
    fn looping_sequence_never_ends() {
        let mut seq = Sequence::looping(into_items([0, 1]));
        assert_eq!(drain(&mut seq).len(), 1000);
    }

    #[test]
    fn looping_over_empty_patterns_gives_up() {
        let empty: Sequence<i32> = Sequence::new(Vec::new(), 1);
        let mut seq = Sequence::looping(vec![Item::pattern(empty)]);
        assert_eq!(seq.next(), None);
    }

    #[test]
    fn series_counts_values_not_loops() {
        let mut series = Series::from_values([1, 2, 3], 5).with_offset(2);
        assert_eq!(drain(&mut series), vec![3, 1, 2, 3, 1]);
    }

    #[test]
    fn shuffle_is_a_permutation_per_repeat() {
        let mut shuffle = Shuffle::from_values(0..6, 2).with_seed(42);
        let values = drain(&mut shuffle);
        assert_eq!(values.len(), 12);
        assert_eq!(values[..6], values[6..]);

        let mut sorted = values[..6].to_vec();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn choose_draws_from_the_list() {
        let mut choose = Choose::from_values([3, 5, 7], 50).with_seed(1);
        let values = drain(&mut choose);
        assert_eq!(values.len(), 50);
        assert!(values.iter().all(|v| [3, 5, 7].contains(v)));
    }

    #[test]
    fn weighted_choice_respects_zero_weights() {
        let mut choose = Choose::weighted(into_items(['x', 'y']), &[0.0, 1.0], 20)
            .unwrap()
            .with_seed(9);
        assert!(drain(&mut choose).iter().all(|v| *v == 'y'));
        assert!(Choose::weighted(into_items(['x']), &[1.0, 2.0], 1).is_err());
        assert!(Choose::weighted(into_items(['x']), &[0.0], 1).is_err());
    }
}
