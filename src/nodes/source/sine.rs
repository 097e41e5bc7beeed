//! Sine wave oscillator

use core::f32::consts::TAU;

use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, Parameter};

/// A sine wave oscillator (mono source)
///
/// Input 0 drives the frequency in Hz when connected.
pub struct Sine {
    frequency: Parameter,
    amplitude: f32,
    phase: f32,
}

impl Sine {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency: Parameter::linked(0, frequency),
            amplitude: 0.25, // -12dB, safe default
            phase: 0.0,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency.static_value()
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency.set_value(frequency.max(0.0));
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }
}

impl SignalProcessor for Sine {
    fn generate(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let value = (self.phase * TAU).sin() * self.amplitude;
        outputs[0].samples_mut().fill(value);

        let increment = self.frequency.value(inputs) / ctx.sample_rate as f32;
        self.phase = (self.phase + increment).rem_euclid(1.0);
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        1
    }
}
