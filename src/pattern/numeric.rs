//! Numeric generators: random values and ramps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Item, Pattern, Repeats};

/// Uniformly distributed values between `low` and `high`.
///
/// The bounds are items, so they can themselves be patterns; the generator is
/// exhausted as soon as either bound is.
pub struct Random {
    low: Item<f64>,
    high: Item<f64>,
    repeats: Repeats,
    position: usize,
    rng: StdRng,
}

impl Random {
    pub fn new(low: impl Into<Item<f64>>, high: impl Into<Item<f64>>, repeats: usize) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
            repeats: Repeats::Times(repeats),
            position: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn forever(low: impl Into<Item<f64>>, high: impl Into<Item<f64>>) -> Self {
        Self {
            repeats: Repeats::Infinite,
            ..Self::new(low, high, 1)
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Pattern<f64> for Random {
    fn next(&mut self) -> Option<f64> {
        if !self.repeats.allows(self.position, 1) {
            return None;
        }
        let low = self.low.value()?;
        let high = self.high.value()?;
        self.position += 1;
        Some(low + (high - low) * self.rng.gen::<f64>())
    }

    fn reset(&mut self) {
        self.position = 0;
        self.low.reset();
        self.high.reset();
    }
}

/// A ramp that adds `step` to the previous value: `start`, `start + step`, ...
pub struct Arithmetic {
    start: Item<f64>,
    step: Item<f64>,
    repeats: Repeats,
    position: usize,
    value: f64,
}

impl Arithmetic {
    pub fn new(start: impl Into<Item<f64>>, step: impl Into<Item<f64>>, repeats: usize) -> Self {
        Self {
            start: start.into(),
            step: step.into(),
            repeats: Repeats::Times(repeats),
            position: 0,
            value: 0.0,
        }
    }

    pub fn forever(start: impl Into<Item<f64>>, step: impl Into<Item<f64>>) -> Self {
        Self {
            repeats: Repeats::Infinite,
            ..Self::new(start, step, 1)
        }
    }
}

impl Pattern<f64> for Arithmetic {
    fn next(&mut self) -> Option<f64> {
        if !self.repeats.allows(self.position, 1) {
            return None;
        }
        self.value = if self.position == 0 {
            self.start.value()?
        } else {
            self.value + self.step.value()?
        };
        self.position += 1;
        Some(self.value)
    }

    fn reset(&mut self) {
        self.position = 0;
        self.start.reset();
        self.step.reset();
    }
}

/// A ramp that multiplies the previous value by `factor`: `start`, `start * factor`, ...
pub struct Geometric {
    start: Item<f64>,
    factor: Item<f64>,
    repeats: Repeats,
    position: usize,
    value: f64,
}

impl Geometric {
    pub fn new(start: impl Into<Item<f64>>, factor: impl Into<Item<f64>>, repeats: usize) -> Self {
        Self {
            start: start.into(),
            factor: factor.into(),
            repeats: Repeats::Times(repeats),
            position: 0,
            value: 0.0,
        }
    }

    pub fn forever(start: impl Into<Item<f64>>, factor: impl Into<Item<f64>>) -> Self {
        Self {
            repeats: Repeats::Infinite,
            ..Self::new(start, factor, 1)
        }
    }
}

impl Pattern<f64> for Geometric {
    fn next(&mut self) -> Option<f64> {
        if !self.repeats.allows(self.position, 1) {
            return None;
        }
        self.value = if self.position == 0 {
            self.start.value()?
        } else {
            self.value * self.factor.value()?
        };
        self.position += 1;
        Some(self.value)
    }

    fn reset(&mut self) {
        self.position = 0;
        self.start.reset();
        self.factor.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Sequence;

    #[test]
    fn random_stays_in_bounds() {
        let mut random = Random::new(-2.0, 3.0, 200).with_seed(5);
        let values: Vec<f64> = std::iter::from_fn(|| random.next()).collect();
        assert_eq!(values.len(), 200);
        assert!(values.iter().all(|v| (-2.0..3.0).contains(v)));
    }

    #[test]
    fn random_ends_with_its_bounds() {
        let high = Sequence::from_values([1.0, 2.0], 1);
        let mut random = Random::forever(0.0, Item::pattern(high)).with_seed(3);
        assert!(random.next().is_some());
        assert!(random.next().is_some());
        assert!(random.next().is_none());
    }

    #[test]
    fn ramps() {
        let mut up = Arithmetic::new(1.0, 0.5, 4);
        let values: Vec<f64> = std::iter::from_fn(|| up.next()).collect();
        assert_eq!(values, vec![1.0, 1.5, 2.0, 2.5]);

        let mut octaves = Geometric::new(110.0, 2.0, 3);
        let values: Vec<f64> = std::iter::from_fn(|| octaves.next()).collect();
        assert_eq!(values, vec![110.0, 220.0, 440.0]);

        octaves.reset();
        assert_eq!(octaves.next(), Some(110.0));
    }
}
