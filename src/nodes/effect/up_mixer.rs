use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output};

/// Widens input 0 to a fixed channel count by repeating its channels in turn.
///
/// A mono input feeds every output channel; a stereo input going to four
/// channels comes out as L, R, L, R. Extra input channels are dropped.
pub struct UpMixer {
    channels: usize,
}

impl UpMixer {
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl SignalProcessor for UpMixer {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let input = inputs[0].samples();
        let output = outputs[0].samples_mut();
        if input.is_empty() {
            output.fill(0.0);
            return;
        }
        for (channel, sample) in output.iter_mut().enumerate() {
            *sample = input[channel % input.len()];
        }
    }

    #[inline]
    fn num_inputs(&self) -> usize {
        1
    }

    #[inline]
    fn output_channels(&self, _output: usize) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Constant;
    use crate::Graph;

    #[test]
    fn repeats_channels_cyclically() {
        let mut graph = Graph::new(44_100, 64);
        let left = graph.add(Constant::new(1.0));
        let right = graph.add(Constant::new(-1.0));
        let stereo = graph.add(crate::nodes::PassThrough::new(1));
        let mixer = graph.add(UpMixer::new(4));
        // Only the right constant is two channels wide; the sum is [0.0, -1.0].
        graph.set_output_channels(right, 0, 2).unwrap();
        graph.connect(&left, &stereo).unwrap();
        graph.connect(&right, &stereo).unwrap();
        graph.connect(&stereo, &mixer).unwrap();

        for id in [left, right, stereo, mixer] {
            graph.tick(id);
        }
        assert_eq!(graph.output(mixer, 0).unwrap().samples(), &[0.0, -1.0, 0.0, -1.0]);
    }
}
