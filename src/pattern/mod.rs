//! Lazy, resettable value sequences for driving scheduled events.
//!
//! A [`Pattern`] hands out one value per call to [`next`](Pattern::next) and
//! returns `None` once it is exhausted. Patterns nest: the elements of a list
//! pattern are [`Item`]s, which are either plain values or further patterns.
//! A nested pattern is drawn from until it runs out, then it is reset and the
//! parent moves on.
//!
//! ```
//! use schall::pattern::{Item, Pattern, Sequence};
//!
//! let inner = Sequence::from_values([10.0, 20.0], 1);
//! let mut outer = Sequence::new(vec![Item::Value(1.0), Item::pattern(inner)], 1);
//!
//! let drawn: Vec<f64> = std::iter::from_fn(|| outer.next()).collect();
//! assert_eq!(drawn, vec![1.0, 10.0, 20.0]);
//! ```

mod list;
mod numeric;
mod proxy;

pub use list::{Choose, Sequence, Series, Shuffle};
pub use numeric::{Arithmetic, Geometric, Random};
pub use proxy::{Proxy, ProxyHandle};

/// A stateful cursor over a sequence of values.
pub trait Pattern<T>: Send {
    /// The next value, or `None` once the pattern is exhausted.
    fn next(&mut self) -> Option<T>;

    /// Rewind to the start, resetting nested patterns too.
    fn reset(&mut self);
}

impl<T> Pattern<T> for Box<dyn Pattern<T>> {
    fn next(&mut self) -> Option<T> {
        (**self).next()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// One element of a list pattern: a literal value or a nested pattern.
pub enum Item<T> {
    Value(T),
    Pattern(Box<dyn Pattern<T>>),
}

impl<T: Clone> Item<T> {
    /// Wrap a pattern as a nested item.
    pub fn pattern(pattern: impl Pattern<T> + 'static) -> Self {
        Item::Pattern(Box::new(pattern))
    }

    /// Resolve one level of nesting: literal values are returned as-is,
    /// nested patterns are advanced.
    pub fn value(&mut self) -> Option<T> {
        match self {
            Item::Value(value) => Some(value.clone()),
            Item::Pattern(pattern) => pattern.next(),
        }
    }

    pub fn reset(&mut self) {
        if let Item::Pattern(pattern) = self {
            pattern.reset();
        }
    }

    #[inline]
    pub fn is_pattern(&self) -> bool {
        matches!(self, Item::Pattern(_))
    }
}

impl<T> From<T> for Item<T> {
    fn from(value: T) -> Self {
        Item::Value(value)
    }
}

/// How many times a pattern runs through its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeats {
    Times(usize),
    Infinite,
}

impl Repeats {
    /// Whether `position` is still inside `repeats * len` steps.
    #[inline]
    fn allows(self, position: usize, len: usize) -> bool {
        match self {
            Repeats::Times(times) => position < times.saturating_mul(len),
            Repeats::Infinite => true,
        }
    }
}

impl Default for Repeats {
    fn default() -> Self {
        Repeats::Times(1)
    }
}

impl From<usize> for Repeats {
    fn from(times: usize) -> Self {
        Repeats::Times(times)
    }
}

pub(crate) fn into_items<T>(values: impl IntoIterator<Item = T>) -> Vec<Item<T>> {
    values.into_iter().map(Item::Value).collect()
}
