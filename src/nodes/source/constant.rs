//! A node that outputs a parameter's value.

use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, Parameter};

/// Outputs its value on every channel.
///
/// Input 0 drives the value when connected, which lets a group expose a
/// parameter as one of its inputs.
pub struct Constant {
    value: Parameter,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self {
            value: Parameter::linked(0, value),
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

impl SignalProcessor for Constant {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let value = self.value.value(inputs);
        outputs[0].samples_mut().fill(value);
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        1
    }
}
