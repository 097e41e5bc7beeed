//! Delay line effect

use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, Parameter};

/// Delays every channel of input 0 by a number of seconds.
///
/// Input 1 drives the delay time when connected. The time is clamped to the
/// maximum given at construction. Each channel gets its own ring buffer, sized
/// for the maximum delay the first time the channel shows up.
///
/// Feeding the output back into input 0 (through a [`Gain`](super::Gain) for
/// decay) gives a feedback echo; the cycle adds one frame to the loop time.
pub struct Delay {
    max_delay: f32,
    delay_time: Parameter,
    lines: Vec<Vec<f32>>,
    length: usize,
    write: usize,
}

impl Delay {
    /// A delay of `delay_time` seconds that can be modulated up to `max_delay`.
    pub fn new(max_delay: f32, delay_time: f32) -> Self {
        Self {
            max_delay: max_delay.max(0.0),
            delay_time: Parameter::linked(1, delay_time),
            lines: Vec::new(),
            length: 0,
            write: 0,
        }
    }

    #[inline]
    pub fn delay_time(&self) -> f32 {
        self.delay_time.static_value()
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay_time.set_value(seconds);
    }
}

impl SignalProcessor for Delay {
    fn generate(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let sample_rate = ctx.sample_rate as f32;
        let length = (self.max_delay * sample_rate).ceil() as usize + 1;
        if length != self.length {
            self.length = length;
            self.lines.clear();
            self.write = 0;
        }

        let output = outputs[0].samples_mut();
        while self.lines.len() < output.len() {
            self.lines.push(vec![0.0; length]);
        }

        let delay = (self.delay_time.value(inputs) * sample_rate)
            .round()
            .clamp(0.0, (length - 1) as f32) as usize;
        let read = (self.write + length - delay) % length;

        let input = &inputs[0];
        for (channel, (sample, line)) in output.iter_mut().zip(self.lines.iter_mut()).enumerate() {
            line[self.write] = input.channel(channel);
            *sample = line[read];
        }
        self.write = (self.write + 1) % length;
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
