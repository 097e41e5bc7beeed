use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output};

/// Copies each input to the output with the same index.
///
/// Unconnected inputs produce one silent channel.
pub struct PassThrough {
    pins: usize,
}

impl PassThrough {
    /// A pass-through with `pins` inputs and as many outputs.
    pub fn new(pins: usize) -> Self {
        Self { pins }
    }
}

impl SignalProcessor for PassThrough {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        // Connected pairs were copied before generate ran.
        for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
            if input.samples().is_empty() {
                output.samples_mut().fill(0.0);
            }
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        self.pins
    }

    #[inline]
    fn num_outputs(&self) -> usize {
        self.pins
    }

    #[inline]
    fn passes_through(&self) -> bool {
        true
    }
}
