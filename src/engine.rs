//! Schall - top-level engine
//!
//! Owns the graph, the device at its root and the scheduler, and wires them
//! into the destination chain:
//!
//! ```text
//! destination input -> scheduler node -> up-mixer -> device
//! ```
//!
//! Anything connected to [`Engine::destination`] is heard. The scheduler
//! fires its events right after the scheduler node ticks. Nodes upstream of
//! the destination have produced that frame already, so changes an event
//! makes to them are heard from the following frame.
//!
//! Once the engine has moved to the audio thread, other threads reach it
//! through an [`EngineHandle`]. Commands go through a wait-free ring buffer
//! and run at the start of the next [`fill`](AudioSource::fill).

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::device::{AudioSource, Device};
use crate::error::{Error, PinKind, Result};
use crate::graph::{Endpoint, Graph};
use crate::group::Group;
use crate::node::{NodeId, SignalProcessor};
use crate::nodes::{PassThrough, UpMixer};
use crate::scheduler::Scheduler;

/// A change to run against the graph and scheduler on the audio thread.
pub type Command = Box<dyn FnOnce(&mut Graph, &mut Scheduler) + Send>;

/// Sends commands to an [`Engine`] from another thread.
pub struct EngineHandle {
    sender: Producer<Command>,
}

impl EngineHandle {
    /// Queue `command` for the engine's next fill.
    ///
    /// Never blocks. When the queue is full the command is handed back.
    pub fn send(
        &mut self,
        command: impl FnOnce(&mut Graph, &mut Scheduler) + Send + 'static,
    ) -> core::result::Result<(), Command> {
        self.sender
            .push(Box::new(command))
            .map_err(|rtrb::PushError::Full(c)| c)
    }

    /// Free slots in the queue.
    pub fn capacity_left(&self) -> usize {
        self.sender.slots()
    }
}

/// The main audio engine.
///
/// ```
/// use schall::{Engine, EngineConfig};
/// use schall::nodes::{Constant, Gain};
///
/// let mut engine = Engine::new(EngineConfig::default().with_channels(2)).unwrap();
/// let source = engine.add(Constant::new(1.0));
/// let gain = engine.add(Gain::new(0.5));
/// engine.connect(&source, &gain).unwrap();
/// engine.output(&gain).unwrap();
///
/// assert_eq!(engine.render(2), vec![0.5, 0.5, 0.5, 0.5]);
/// ```
pub struct Engine {
    config: EngineConfig,
    graph: Graph,
    device: Device,
    scheduler: Scheduler,
    scheduler_node: NodeId,
    destination: Group,
    commands: Consumer<Command>,
    handle: Option<EngineHandle>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut graph = Graph::new(config.sample_rate, config.max_block_size);
        let device = Device::new(&mut graph, config.channels);
        let scheduler = Scheduler::new(config.sample_rate, config.bpm, config.beats_per_bar);

        let mut destination = Group::new(&mut graph, 1, 0);
        let entry = destination.input(0).ok_or(Error::MissingPin {
            kind: PinKind::Input,
            index: 0,
        })?;
        let scheduler_node = destination.add(&mut graph, PassThrough::new(1));
        let up_mixer = destination.add(&mut graph, UpMixer::new(config.channels));

        graph.connect(&entry, &scheduler_node)?;
        graph.connect(&scheduler_node, &up_mixer)?;
        graph.connect(&up_mixer, &device.node())?;

        let (sender, commands) = RingBuffer::new(config.command_capacity);

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bpm = config.bpm,
            "engine ready"
        );

        Ok(Self {
            config,
            graph,
            device,
            scheduler,
            scheduler_node,
            destination,
            commands,
            handle: Some(EngineHandle { sender }),
        })
    }

    /// Take the engine's control handle. There is only one, so later calls
    /// return `None`.
    pub fn handle(&mut self) -> Option<EngineHandle> {
        self.handle.take()
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.config.channels
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The group everything audible connects to.
    pub fn destination(&self) -> &Group {
        &self.destination
    }

    /// Graph and scheduler together, for setting up events that capture
    /// node ids.
    pub fn parts_mut(&mut self) -> (&mut Graph, &mut Scheduler) {
        (&mut self.graph, &mut self.scheduler)
    }

    /// Add a node to the graph.
    pub fn add<P: SignalProcessor>(&mut self, processor: P) -> NodeId {
        self.graph.add(processor)
    }

    /// Connect output 0 of `from` to input 0 of `to`.
    pub fn connect(&mut self, from: &impl Endpoint, to: &impl Endpoint) -> Result<()> {
        self.graph.connect(from, to)
    }

    /// Route output 0 of `node` to the destination.
    pub fn output(&mut self, node: &impl Endpoint) -> Result<()> {
        self.graph.connect(node, &self.destination)
    }

    /// Generate `frames` interleaved frames without a backend.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        let channels = self.config.channels;
        let mut buffer = vec![0.0; frames * channels];
        self.fill(&mut buffer, channels);
        buffer
    }
}

impl AudioSource for Engine {
    fn fill(&mut self, buffer: &mut [f32], channels: usize) {
        let Self {
            graph,
            device,
            scheduler,
            scheduler_node,
            commands,
            ..
        } = self;

        let mut applied = 0;
        for command in core::iter::from_fn(|| commands.pop().ok()) {
            command(graph, scheduler);
            applied += 1;
        }
        if applied > 0 {
            debug!(applied, "applied queued commands");
        }

        let scheduler_node = *scheduler_node;
        device.fill_with(graph, buffer, channels, |graph, id| {
            if id == scheduler_node {
                scheduler.tick(graph);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Constant, Gain};

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_sample_rate(100)
            .with_channels(2)
            .with_block_size(64)
            .with_max_block_size(64)
            .with_bpm(60.0)
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            Engine::new(config().with_channels(0)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn mono_sources_are_upmixed() {
        let mut engine = Engine::new(config()).unwrap();
        let source = engine.add(Constant::new(0.25));
        engine.output(&source).unwrap();
        assert_eq!(engine.render(3), vec![0.25; 6]);
    }

    #[test]
    fn events_land_on_their_frame() {
        let mut engine = Engine::new(config()).unwrap();
        let source = engine.add(Constant::new(1.0));
        let gain = engine.add(Gain::new(0.0));
        engine.connect(&source, &gain).unwrap();
        engine.output(&gain).unwrap();

        // One beat is 100 frames at 60 bpm and 100 Hz. The event fires on
        // frame 49, after the gain has already produced that frame.
        engine.scheduler_mut().add_relative(0.5, move |graph, _| {
            if let Some(gain) = graph.processor_mut::<Gain>(gain) {
                gain.set_gain(1.0);
            }
        });

        let rendered = engine.render(60);
        let left: Vec<f32> = rendered.iter().step_by(2).copied().collect();
        assert_eq!(left[49], 0.0);
        assert_eq!(left[50], 1.0);
        assert_eq!(left[59], 1.0);
    }

    #[test]
    fn commands_apply_on_the_next_fill() {
        let mut engine = Engine::new(config()).unwrap();
        let mut handle = engine.handle().unwrap();
        assert!(engine.handle().is_none());

        let source = engine.add(Constant::new(0.5));
        let destination = engine.destination().clone();
        assert_eq!(engine.render(1), vec![0.0, 0.0]);

        let worker = std::thread::spawn(move || {
            handle
                .send(move |graph, _| graph.connect(&source, &destination).unwrap())
                .is_ok()
        });
        assert!(worker.join().unwrap());

        assert_eq!(engine.render(2), vec![0.5; 4]);
        assert_eq!(engine.device().write_time(), 3);
    }

    #[test]
    fn full_queue_hands_the_command_back() {
        let mut engine = Engine::new(config().with_command_capacity(1)).unwrap();
        let mut handle = engine.handle().unwrap();
        assert!(handle.send(|_, scheduler| scheduler.set_tempo(120.0).unwrap()).is_ok());
        assert_eq!(handle.capacity_left(), 0);

        let rejected = handle.send(|_, scheduler| scheduler.set_tempo(30.0).unwrap());
        let Err(command) = rejected else {
            panic!("queue should be full");
        };

        engine.render(1);
        assert_eq!(engine.scheduler().bpm(), 120.0);
        assert_eq!(handle.capacity_left(), 1);

        let (graph, scheduler) = engine.parts_mut();
        command(graph, scheduler);
        assert_eq!(engine.scheduler().bpm(), 30.0);
    }
}
