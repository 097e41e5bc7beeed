//! Gain/volume control effect

use crate::node::{ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, Parameter};

/// Multiplies every channel of input 0 by a gain.
///
/// Input 1 drives the gain when connected, so a `Gain` doubles as a
/// signal-rate multiplier. The output follows input 0's channel count.
pub struct Gain {
    gain: Parameter,
}

/// Signal-rate multiplication is the same operation as gain.
pub type Multiply = Gain;

impl Gain {
    /// Create a new gain node with the specified gain value
    pub fn new(gain: f32) -> Self {
        Self {
            gain: Parameter::linked(1, gain),
        }
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain.static_value()
    }

    #[inline]
    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_value(gain);
    }

    /// The gain parameter, for registering change listeners.
    pub fn gain_parameter_mut(&mut self) -> &mut Parameter {
        &mut self.gain
    }
}

impl SignalProcessor for Gain {
    fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
        let gain = self.gain.value(inputs);
        let input = &inputs[0];
        for (channel, sample) in outputs[0].samples_mut().iter_mut().enumerate() {
            *sample = input.channel(channel) * gain;
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::nodes::Constant;
    use crate::{Graph, Scheduler};

    #[test]
    fn gain_follows_modulating_input() {
        let mut graph = Graph::new(44_100, 64);
        let signal = graph.add(Constant::new(0.5));
        let amount = graph.add(Constant::new(4.0));
        let gain = graph.add(Gain::new(1.0));
        graph.connect(&signal, &gain).unwrap();
        graph.connect_pins(&amount, 0, &gain, 1).unwrap();

        for id in [signal, amount, gain] {
            graph.tick(id);
        }
        assert_eq!(graph.output(gain, 0).unwrap().samples(), &[2.0]);
    }

    #[test]
    fn scheduled_gain_changes_reach_listeners() {
        let mut graph = Graph::new(100, 64);
        let mut scheduler = Scheduler::new(100, 60.0, 4);
        let gain = graph.add(Gain::new(1.0));
        let heard = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&heard);
        graph
            .processor_mut::<Gain>(gain)
            .unwrap()
            .gain_parameter_mut()
            .on_change(move |value| log.lock().push(value));

        scheduler.add_relative(0.5, move |graph, _| {
            if let Some(node) = graph.processor_mut::<Gain>(gain) {
                node.set_gain(0.25);
            }
        });
        for _ in 0..100 {
            scheduler.tick(&mut graph);
        }
        assert_eq!(*heard.lock(), vec![0.25]);
    }

    #[test]
    fn unconnected_gain_is_silent() {
        let mut graph = Graph::new(44_100, 64);
        let gain = graph.add(Gain::new(3.0));
        graph.tick(gain);
        assert_eq!(graph.output(gain, 0).unwrap().samples(), &[0.0]);
    }
}
