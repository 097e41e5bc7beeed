//! Core processor trait and context types.

use core::any::Any;

use crate::pin::{Input, Output};

/// Information available during signal processing.
///
/// Passed to every [`SignalProcessor::generate`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Index of the frame being generated
    pub frame: u64,
}

/// Unique identifier for a node within a graph.
///
/// Ids are handed out by [`Graph::add`](crate::Graph::add) and never reused,
/// even after the node is deleted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Upcast to [`Any`], so processors can be looked up by concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The per-frame behaviour of a node.
///
/// The graph owns the pins; a processor only declares how many it has and
/// fills its outputs from its inputs once per frame. By the time `generate`
/// runs, every input holds the sum of its connected outputs and every output
/// has been sized to its channel count.
///
/// ```
/// use schall::{Input, Output, ProcessContext, SignalProcessor};
///
/// /// Flips the sign of every channel.
/// struct Invert;
///
/// impl SignalProcessor for Invert {
///     fn generate(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]) {
///         for (out, sample) in outputs[0].samples_mut().iter_mut().zip(inputs[0].samples()) {
///             *out = -sample;
///         }
///     }
///
///     fn num_inputs(&self) -> usize { 1 }
///
///     // Follow the input's channel count.
///     fn linked_input(&self, _output: usize) -> Option<usize> { Some(0) }
/// }
/// ```
pub trait SignalProcessor: AsAny + Send {
    /// Produce one frame.
    fn generate(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Output]);

    /// Number of inputs (0 for sources).
    fn num_inputs(&self) -> usize {
        0
    }

    /// Number of outputs (0 for sinks).
    fn num_outputs(&self) -> usize {
        1
    }

    /// Initial channel count of `output`, used while it is not linked to a
    /// connected input.
    fn output_channels(&self, _output: usize) -> usize {
        1
    }

    /// Input whose channel count `output` should mirror.
    fn linked_input(&self, _output: usize) -> Option<usize> {
        None
    }

    /// Whether outputs copy the matching input whenever that input carries
    /// samples. Such nodes can leave `generate` empty.
    fn passes_through(&self) -> bool {
        false
    }

    /// Name used in log output.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// A processor together with its pins, as stored in the graph.
pub(crate) struct Node {
    pub(crate) processor: Box<dyn SignalProcessor>,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    /// Frame this node last ticked in
    pub(crate) last_tick: Option<u64>,
}

impl Node {
    pub(crate) fn new(processor: Box<dyn SignalProcessor>) -> Self {
        let inputs = (0..processor.num_inputs()).map(|_| Input::new()).collect();
        let outputs = (0..processor.num_outputs())
            .map(|o| Output::new(processor.output_channels(o), processor.linked_input(o)))
            .collect();
        Self {
            processor,
            inputs,
            outputs,
            last_tick: None,
        }
    }

    pub(crate) fn processor_as<T: 'static>(&self) -> Option<&T> {
        let processor: &dyn SignalProcessor = self.processor.as_ref();
        processor.as_any().downcast_ref::<T>()
    }

    pub(crate) fn processor_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let processor: &mut dyn SignalProcessor = self.processor.as_mut();
        processor.as_any_mut().downcast_mut::<T>()
    }
}
