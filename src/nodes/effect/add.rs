use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, Parameter};

/// Adds a value to every channel of input 0.
///
/// Input 1 drives the value when connected, which makes `Add` a two-signal
/// mixer. The output follows input 0's channel count.
pub struct Add {
    value: Parameter,
}

impl Add {
    pub fn new(value: f32) -> Self {
        Self {
            value: Parameter::linked(1, value),
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value.static_value()
    }

    #[inline]
    pub fn set_value(&mut self, value: f32) {
        self.value.set_value(value);
    }
}

impl SignalProcessor for Add {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let value = self.value.value(inputs);
        let input = &inputs[0];
        for (channel, sample) in outputs[0].samples_mut().iter_mut().enumerate() {
            *sample = input.channel(channel) + value;
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        2
    }

    #[inline]
    fn linked_input(&self, _output: usize) -> Option<usize> {
        Some(0)
    }
}
