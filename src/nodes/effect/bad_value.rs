//! Watchdog for NaN and infinite samples.

use tracing::warn;

use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output};

type Callback = Box<dyn FnMut(usize, f32) + Send>;

/// Passes its input through unchanged and reports every channel that holds a
/// non-finite sample.
///
/// The default report is a `tracing` warning. The engine itself never checks
/// sample values; put one of these wherever bad values need catching.
pub struct BadValueDetector {
    callback: Callback,
}

impl BadValueDetector {
    pub fn new() -> Self {
        Self {
            callback: Box::new(|channel, value| {
                warn!(channel, value = %value, "non-finite sample");
            }),
        }
    }

    /// Call `callback(channel, value)` instead of logging.
    pub fn with_callback(callback: impl FnMut(usize, f32) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl Default for BadValueDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalProcessor for BadValueDetector {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let input = inputs[0].samples();
        if input.is_empty() {
            outputs[0].samples_mut().fill(0.0);
            return;
        }
        for (channel, value) in input.iter().enumerate() {
            if !value.is_finite() {
                (self.callback)(channel, *value);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        1
    }

    #[inline]
    fn passes_through(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::nodes::Constant;
    use crate::Graph;

    #[test]
    fn reports_non_finite_channels() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let mut graph = Graph::new(44_100, 64);
        let source = graph.add(Constant::new(f32::NAN));
        let detector = graph.add(BadValueDetector::with_callback(move |channel, value| {
            sink.lock().push((channel, value.is_nan()));
        }));
        graph.set_output_channels(source, 0, 2).unwrap();
        graph.connect(&source, &detector).unwrap();
        graph.tick(source);
        graph.tick(detector);

        assert_eq!(*reports.lock(), vec![(0, true), (1, true)]);
        assert!(graph.output(detector, 0).unwrap().samples()[1].is_nan());

        graph.processor_mut::<Constant>(source).unwrap().set_value(0.5);
        graph.tick(source);
        graph.tick(detector);
        assert_eq!(reports.lock().len(), 2);
    }
}
