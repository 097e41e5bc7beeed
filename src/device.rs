//! The graph's root node and the pull boundary to audio backends.
//!
//! A backend asks for audio by calling [`AudioSource::fill`] with an
//! interleaved buffer. [`Device`] answers by ticking the graph once per frame
//! and copying what arrives at its input into the buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph::Graph;
use crate::node::{NodeId, ProcessContext, SignalProcessor};
use crate::pin::{Input, Output};

/// Anything that can fill an interleaved output buffer on demand.
///
/// Backends hold one of these and call `fill` from their audio callback.
pub trait AudioSource {
    /// Fill `buffer` with `buffer.len() / channels` interleaved frames.
    fn fill(&mut self, buffer: &mut [f32], channels: usize);
}

/// The device's node only collects its input.
struct DeviceInput;

impl SignalProcessor for DeviceInput {
    fn generate(&mut self, _ctx: &ProcessContext, _inputs: &[Input], _outputs: &mut [Output]) {}

    #[inline]
    fn num_inputs(&self) -> usize {
        1
    }

    #[inline]
    fn num_outputs(&self) -> usize {
        0
    }
}

/// Root of the graph: drives the per-frame tick loop.
pub struct Device {
    node: NodeId,
    sample_rate: u32,
    channels: usize,
    order: Vec<NodeId>,
    write_position: u64,
    paused: bool,
    played: Arc<AtomicU64>,
}

impl Device {
    /// Add the device's node to `graph`. Whatever is connected to that node's
    /// input is what gets played.
    pub fn new(graph: &mut Graph, channels: usize) -> Self {
        Self {
            node: graph.add(DeviceInput),
            sample_rate: graph.sample_rate(),
            channels,
            order: Vec::new(),
            write_position: 0,
            paused: false,
            played: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Cached traversal, device first.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Frames generated so far.
    #[inline]
    pub fn write_time(&self) -> u64 {
        self.write_position
    }

    /// Frames the backend reports as played. Lags [`write_time`](Self::write_time)
    /// by however much the backend buffers.
    #[inline]
    pub fn playback_time(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    /// Counter for the backend to advance as frames reach the speakers.
    pub fn playback_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.played)
    }

    /// Stop generating frames. The graph keeps its state.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn play(&mut self) {
        self.paused = false;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Generate `buffer.len() / channels` frames into `buffer`.
    ///
    /// See [`fill_with`](Self::fill_with).
    pub fn fill(&mut self, graph: &mut Graph, buffer: &mut [f32], channels: usize) {
        self.fill_with(graph, buffer, channels, |_, _| {});
    }

    /// Generate frames into `buffer`, calling `after_tick` right after each
    /// node ticks.
    ///
    /// For every frame: recompute the traversal if the graph changed, tick
    /// every node upstream of the device (producers first), then copy the
    /// device input into the frame. Channels the input does not supply are
    /// written as silence; input channels beyond `channels` are dropped.
    ///
    /// While paused nothing is generated and `buffer` is left untouched.
    pub fn fill_with(
        &mut self,
        graph: &mut Graph,
        buffer: &mut [f32],
        channels: usize,
        mut after_tick: impl FnMut(&mut Graph, NodeId),
    ) {
        if self.paused || channels == 0 {
            return;
        }

        for frame in buffer.chunks_exact_mut(channels) {
            graph.advance_frame();
            if graph.take_dirty() {
                self.order = graph.traverse(self.node);
            }

            for id in self.order.iter().skip(1).rev() {
                graph.tick(*id);
                after_tick(graph, *id);
            }
            graph.tick(self.node);

            match graph.input(self.node, 0) {
                Ok(input) => {
                    for (channel, sample) in frame.iter_mut().enumerate() {
                        *sample = input.channel(channel);
                    }
                }
                Err(_) => frame.fill(0.0),
            }
            self.write_position += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Constant;

    #[test]
    fn fills_and_pads_channels() {
        let mut graph = Graph::new(44_100, 64);
        let mut device = Device::new(&mut graph, 2);
        let source = graph.add(Constant::new(0.5));
        graph.connect(&source, &device.node()).unwrap();

        let mut buffer = vec![9.0; 6];
        device.fill(&mut graph, &mut buffer, 2);
        assert_eq!(buffer, vec![0.5, 0.0, 0.5, 0.0, 0.5, 0.0]);
        assert_eq!(device.write_time(), 3);
        assert_eq!(device.order(), &[device.node(), source]);
    }

    #[test]
    fn paused_device_leaves_buffer_alone() {
        let mut graph = Graph::new(44_100, 64);
        let mut device = Device::new(&mut graph, 1);
        let source = graph.add(Constant::new(0.5));
        graph.connect(&source, &device.node()).unwrap();

        device.pause();
        let mut buffer = vec![7.0; 4];
        device.fill(&mut graph, &mut buffer, 1);
        assert_eq!(buffer, vec![7.0; 4]);
        assert_eq!(device.write_time(), 0);

        device.play();
        device.fill(&mut graph, &mut buffer, 1);
        assert_eq!(buffer, vec![0.5; 4]);
    }

    #[test]
    fn topology_changes_take_effect_next_frame() {
        let mut graph = Graph::new(44_100, 64);
        let mut device = Device::new(&mut graph, 1);
        let a = graph.add(Constant::new(0.25));
        let b = graph.add(Constant::new(0.5));
        graph.connect(&a, &device.node()).unwrap();

        let mut buffer = [0.0; 2];
        let mut ticks = 0;
        device.fill_with(&mut graph, &mut buffer, 1, |graph, id| {
            ticks += 1;
            if id == a && ticks == 1 {
                graph.connect(&b, &NodeId(0)).unwrap();
            }
        });
        assert_eq!(buffer, [0.25, 0.75]);
    }

    #[test]
    fn playback_counter_is_shared() {
        let mut graph = Graph::new(44_100, 64);
        let device = Device::new(&mut graph, 2);
        device.playback_counter().fetch_add(128, Ordering::Relaxed);
        assert_eq!(device.playback_time(), 128);
    }
}
