//! A pattern slot whose contents can be swapped while it is playing.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Pattern;

type Slot<T> = Arc<Mutex<Option<Box<dyn Pattern<T>>>>>;

/// Plays whatever pattern currently sits in its slot.
///
/// Hand the `Proxy` to the scheduler and keep the [`ProxyHandle`] to replace
/// the pattern later; the next draw picks up the new one. An empty slot is
/// exhausted.
///
/// ```
/// use schall::pattern::{Pattern, Proxy, Sequence};
///
/// let (mut proxy, handle) = Proxy::new(Sequence::from_values([1.0], 1));
/// assert_eq!(proxy.next(), Some(1.0));
///
/// handle.set(Sequence::from_values([2.0], 1));
/// assert_eq!(proxy.next(), Some(2.0));
/// ```
pub struct Proxy<T> {
    slot: Slot<T>,
}

/// Write side of a [`Proxy`].
pub struct ProxyHandle<T> {
    slot: Slot<T>,
}

impl<T> Clone for ProxyHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: 'static> Proxy<T> {
    pub fn new(pattern: impl Pattern<T> + 'static) -> (Self, ProxyHandle<T>) {
        let proxy = Self::empty();
        proxy.handle().set(pattern);
        let handle = proxy.handle();
        (proxy, handle)
    }

    pub fn empty() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> ProxyHandle<T> {
        ProxyHandle {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: 'static> ProxyHandle<T> {
    /// Replace the proxied pattern.
    pub fn set(&self, pattern: impl Pattern<T> + 'static) {
        *self.slot.lock() = Some(Box::new(pattern));
    }

    /// Empty the slot, which exhausts the proxy.
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

impl<T> Pattern<T> for Proxy<T> {
    fn next(&mut self) -> Option<T> {
        self.slot.lock().as_mut().and_then(|pattern| pattern.next())
    }

    fn reset(&mut self) {
        if let Some(pattern) = self.slot.lock().as_mut() {
            pattern.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Item, Sequence};

    #[test]
    fn cleared_proxy_is_exhausted() {
        let (mut proxy, handle) = Proxy::new(Sequence::looping(vec![Item::Value(4)]));
        assert_eq!(proxy.next(), Some(4));
        handle.clear();
        assert_eq!(proxy.next(), None);
    }

    #[test]
    fn proxy_nests_inside_a_sequence() {
        let (proxy, handle) = Proxy::new(Sequence::from_values([1], 1));
        let mut outer = Sequence::new(vec![Item::pattern(proxy)], 1);
        assert_eq!(outer.next(), Some(1));

        handle.set(Sequence::from_values([7, 8], 1));
        let rest: Vec<i32> = std::iter::from_fn(|| outer.next()).collect();
        assert_eq!(rest, vec![7, 8]);
    }
}
