//! Connection points on nodes.
//!
//! Every node owns a list of [`Input`]s and [`Output`]s. Pins refer to each
//! other by [`PinRef`] (node id plus pin index), so a connection never owns the
//! node on the other end.
//!
//! Each pin carries one frame of samples, one value per channel. An input's
//! channel count is whatever its connected outputs supply; an output's is
//! either fixed or mirrors a linked input.

use core::fmt;

use crate::buffer::Buffer;
use crate::node::NodeId;

/// Address of a pin: a node and the index of one of its inputs or outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PinRef {
    pub node: NodeId,
    pub index: usize,
}

impl PinRef {
    #[inline]
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Fan-in point of a node. Sums every connected output channel-wise.
#[derive(Debug, Default)]
pub struct Input {
    pub(crate) samples: Vec<f32>,
    pub(crate) connected_from: Vec<PinRef>,
}

impl Input {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// This frame's summed samples, one per channel.
    ///
    /// Empty when nothing is connected.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample on `channel`, or silence if the input carries fewer channels.
    #[inline]
    pub fn channel(&self, channel: usize) -> f32 {
        self.samples.get(channel).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        !self.connected_from.is_empty()
    }

    pub fn connected_from(&self) -> &[PinRef] {
        &self.connected_from
    }
}

/// Fan-out point of a node.
#[derive(Debug)]
pub struct Output {
    pub(crate) samples: Vec<f32>,
    pub(crate) connected_to: Vec<PinRef>,
    pub(crate) channels: usize,
    pub(crate) linked_input: Option<usize>,
    pub(crate) feedback: Option<FeedbackLine>,
}

impl Output {
    pub(crate) fn new(channels: usize, linked_input: Option<usize>) -> Self {
        Self {
            samples: Vec::with_capacity(channels),
            connected_to: Vec::new(),
            channels,
            linked_input,
            feedback: None,
        }
    }

    /// This frame's samples, one per channel.
    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Writable samples. The channel count is fixed by the time a processor
    /// sees the output.
    #[inline]
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    pub fn connected_to(&self) -> &[PinRef] {
        &self.connected_to
    }

    /// Input whose channel count this output follows, if any.
    #[inline]
    pub fn linked_input(&self) -> Option<usize> {
        self.linked_input
    }

    /// Whether this output closes a cycle and is read one tick late.
    #[inline]
    pub fn is_feedback(&self) -> bool {
        self.feedback.is_some()
    }

    /// Frames currently held in the feedback window, if this is a feedback
    /// output.
    pub fn feedback_len(&self) -> Option<usize> {
        self.feedback.as_ref().map(|line| line.window.len())
    }

    /// What connected inputs see: the fresh samples, or the delayed snapshot
    /// when this output feeds a cycle.
    #[inline]
    pub(crate) fn read(&self) -> &[f32] {
        match &self.feedback {
            Some(line) => &line.delayed,
            None => &self.samples,
        }
    }

    pub(crate) fn mark_feedback(&mut self, max_block_size: usize) {
        if self.feedback.is_none() {
            self.feedback = Some(FeedbackLine::new(&self.samples, max_block_size));
        }
    }

    /// Route the freshly generated frame through the feedback window.
    #[inline]
    pub(crate) fn commit(&mut self) {
        if let Some(line) = &mut self.feedback {
            line.commit(&self.samples);
        }
    }
}

/// Delay line for an output that closes a cycle.
///
/// Each committed frame is pushed onto the tail of `window` and an equal slice
/// is shifted off the front into `delayed`, which is what readers see until the
/// next commit. The window's storage is allocated once at `max_block_size`
/// frames and never outgrows it.
#[derive(Debug)]
pub(crate) struct FeedbackLine {
    window: Buffer,
    frame: Buffer,
    delayed: Vec<f32>,
    max_block_size: usize,
}

impl FeedbackLine {
    fn new(current: &[f32], max_block_size: usize) -> Self {
        Self {
            window: Buffer::with_capacity(current.len(), max_block_size),
            frame: Buffer::new(current.len(), 1),
            delayed: current.to_vec(),
            max_block_size,
        }
    }

    fn commit(&mut self, samples: &[f32]) {
        if samples.len() != self.frame.num_channels() {
            self.frame.resize(samples.len(), 1, false, 0);
            self.window = Buffer::with_capacity(samples.len(), self.max_block_size);
        }

        for (channel, sample) in samples.iter().enumerate() {
            self.frame.channel_mut(channel)[0] = *sample;
        }
        self.window.push(&self.frame);
        debug_assert!(
            self.window.len() <= self.max_block_size,
            "feedback window exceeded the maximum block size"
        );
        self.window.shift(&mut self.frame);

        self.delayed.clear();
        self.delayed.extend(self.frame.channels().map(|c| c[0]));
    }
}

/// Handle to a listener registered with [`Parameter::on_change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

type ChangeListener = Box<dyn FnMut(f32) + Send>;

/// A value that is either set directly or driven by one of the node's inputs.
///
/// When the linked input carries samples, its first channel overrides the
/// static value. Listeners registered with [`on_change`](Self::on_change) are
/// told about every new static value.
pub struct Parameter {
    value: f32,
    input: Option<usize>,
    listeners: Vec<(ListenerId, ChangeListener)>,
    next_listener: u32,
}

impl Parameter {
    /// A parameter with no input to drive it.
    pub fn new(value: f32) -> Self {
        Self {
            value,
            input: None,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// A parameter that follows input `input` whenever it is connected.
    pub fn linked(input: usize, value: f32) -> Self {
        Self {
            input: Some(input),
            ..Self::new(value)
        }
    }

    pub fn is_dynamic(&self, inputs: &[Input]) -> bool {
        self.input
            .and_then(|index| inputs.get(index))
            .is_some_and(|input| !input.samples.is_empty())
    }

    #[inline]
    pub fn is_static(&self, inputs: &[Input]) -> bool {
        !self.is_dynamic(inputs)
    }

    /// Current value: the linked input's first channel if it has data,
    /// otherwise the static value.
    pub fn value(&self, inputs: &[Input]) -> f32 {
        self.input
            .and_then(|index| inputs.get(index))
            .and_then(|input| input.samples.first().copied())
            .unwrap_or(self.value)
    }

    /// The fallback used while the parameter is static.
    #[inline]
    pub fn static_value(&self) -> f32 {
        self.value
    }

    /// Overwrite the static value and notify the change listeners. Has no
    /// effect on the output while the linked input is driving the parameter.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        for (_, listener) in &mut self.listeners {
            listener(value);
        }
    }

    #[inline]
    pub fn input(&self) -> Option<usize> {
        self.input
    }

    /// Call `listener` with the new value on every [`set_value`](Self::set_value).
    pub fn on_change(&mut self, listener: impl FnMut(f32) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregister a change listener. Returns whether it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("value", &self.value)
            .field("input", &self.input)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
