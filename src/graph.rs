//! Node arena: owns every node, its pins and the connections between them.
//!
//! Nodes are addressed by [`NodeId`]. Connections are stored on both ends as
//! [`PinRef`]s, so each input knows what feeds it and each output knows what
//! it feeds. Any change to the connections marks the graph dirty, which tells
//! the [`Device`](crate::Device) to recompute its traversal before the next
//! frame.

use hashbrown::HashSet;
use tracing::{debug, trace};

use crate::error::{Error, PinKind, Result};
use crate::node::{Node, NodeId, ProcessContext, SignalProcessor};
use crate::pin::{Input, Output, PinRef};

/// Something that can be connected: a single node or a [`Group`](crate::Group).
pub trait Endpoint {
    /// The pin that external inputs connect to for output `output`.
    fn source(&self, output: usize) -> Option<PinRef>;
    /// The pin that external outputs connect to for input `input`.
    fn sink(&self, input: usize) -> Option<PinRef>;
}

impl Endpoint for NodeId {
    #[inline]
    fn source(&self, output: usize) -> Option<PinRef> {
        Some(PinRef::new(*self, output))
    }

    #[inline]
    fn sink(&self, input: usize) -> Option<PinRef> {
        Some(PinRef::new(*self, input))
    }
}

/// The signal graph.
///
/// ```
/// use schall::Graph;
/// use schall::nodes::{Constant, Gain};
///
/// let mut graph = Graph::new(44_100, 1024);
/// let source = graph.add(Constant::new(1.0));
/// let gain = graph.add(Gain::new(0.5));
/// graph.connect(&source, &gain).unwrap();
///
/// graph.tick(source);
/// graph.tick(gain);
/// assert_eq!(graph.output(gain, 0).unwrap().samples(), &[0.5]);
/// ```
pub struct Graph {
    slots: Vec<Option<Node>>,
    ctx: ProcessContext,
    max_block_size: usize,
    dirty: bool,
}

impl Graph {
    /// Create an empty graph.
    ///
    /// `max_block_size` bounds the frames held by any feedback line.
    pub fn new(sample_rate: u32, max_block_size: usize) -> Self {
        Self {
            slots: Vec::with_capacity(64),
            ctx: ProcessContext {
                sample_rate,
                frame: 0,
            },
            max_block_size,
            dirty: true,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate
    }

    /// Frame counter, advanced once per device frame.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.ctx.frame
    }

    #[inline]
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    /// Add a node, returning its id.
    pub fn add<P: SignalProcessor>(&mut self, processor: P) -> NodeId {
        self.add_boxed(Box::new(processor))
    }

    pub fn add_boxed(&mut self, processor: Box<dyn SignalProcessor>) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        debug!(node = ?id, name = processor.name(), "added node");
        self.slots.push(Some(Node::new(processor)));
        id
    }

    /// Connect output 0 of `from` to input 0 of `to`.
    pub fn connect(&mut self, from: &impl Endpoint, to: &impl Endpoint) -> Result<()> {
        self.connect_pins(from, 0, to, 0)
    }

    /// Connect output `output` of `from` to input `input` of `to`.
    ///
    /// Several outputs may feed the same input; their samples are summed.
    pub fn connect_pins(
        &mut self,
        from: &impl Endpoint,
        output: usize,
        to: &impl Endpoint,
        input: usize,
    ) -> Result<()> {
        let (src, dst) = resolve(from, output, to, input)?;
        self.check(src, PinKind::Output)?;
        self.check(dst, PinKind::Input)?;

        if let Some(out) = self.output_pin_mut(src) {
            out.connected_to.push(dst);
        }
        if let Some(inp) = self.input_pin_mut(dst) {
            inp.connected_from.push(src);
        }
        self.dirty = true;
        debug!(from = ?src, to = ?dst, "connected");
        Ok(())
    }

    /// Undo [`connect`](Self::connect).
    pub fn disconnect(&mut self, from: &impl Endpoint, to: &impl Endpoint) -> Result<()> {
        self.disconnect_pins(from, 0, to, 0)
    }

    /// Remove one connection between the given pins. An input left with no
    /// connections has its samples cleared.
    pub fn disconnect_pins(
        &mut self,
        from: &impl Endpoint,
        output: usize,
        to: &impl Endpoint,
        input: usize,
    ) -> Result<()> {
        let (src, dst) = resolve(from, output, to, input)?;
        self.check(src, PinKind::Output)?;
        self.check(dst, PinKind::Input)?;
        self.unlink(src, dst);
        Ok(())
    }

    /// Sever every connection to and from `id`. The node stays in the graph
    /// and can be connected again.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let node = self.node(id)?;
        let mut edges = Vec::new();
        for (index, input) in node.inputs.iter().enumerate() {
            edges.extend(input.connected_from.iter().map(|src| (*src, PinRef::new(id, index))));
        }
        for (index, output) in node.outputs.iter().enumerate() {
            edges.extend(output.connected_to.iter().map(|dst| (PinRef::new(id, index), *dst)));
        }

        for (src, dst) in edges {
            self.unlink(src, dst);
        }
        debug!(node = ?id, "removed node");
        Ok(())
    }

    /// Sever every connection of `id` and drop it from the graph, handing the
    /// processor back.
    pub fn delete(&mut self, id: NodeId) -> Option<Box<dyn SignalProcessor>> {
        self.remove(id).ok()?;
        let node = self.slots.get_mut(id.index())?.take()?;
        debug!(node = ?id, "deleted node");
        Some(node.processor)
    }

    pub fn input(&self, id: NodeId, index: usize) -> Result<&Input> {
        self.node(id)?.inputs.get(index).ok_or(Error::PinOutOfRange {
            node: id,
            kind: PinKind::Input,
            index,
        })
    }

    pub fn output(&self, id: NodeId, index: usize) -> Result<&Output> {
        self.node(id)?.outputs.get(index).ok_or(Error::PinOutOfRange {
            node: id,
            kind: PinKind::Output,
            index,
        })
    }

    pub fn num_inputs(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.inputs.len())
    }

    pub fn num_outputs(&self, id: NodeId) -> Result<usize> {
        Ok(self.node(id)?.outputs.len())
    }

    /// Borrow the processor of `id` as its concrete type.
    ///
    /// Returns `None` if the node does not exist or is of another type.
    pub fn processor<T: SignalProcessor>(&self, id: NodeId) -> Option<&T> {
        self.node(id).ok()?.processor_as::<T>()
    }

    pub fn processor_mut<T: SignalProcessor>(&mut self, id: NodeId) -> Option<&mut T> {
        self.node_mut(id).ok()?.processor_as_mut::<T>()
    }

    /// Fix the channel count of an output that is not following an input.
    pub fn set_output_channels(&mut self, id: NodeId, output: usize, channels: usize) -> Result<()> {
        self.output_mut(id, output)?.channels = channels;
        Ok(())
    }

    /// Make `output` mirror the channel count of `input` whenever that input
    /// is connected.
    pub fn link_output_channels(&mut self, id: NodeId, output: usize, input: usize) -> Result<()> {
        self.check(PinRef::new(id, input), PinKind::Input)?;
        self.output_mut(id, output)?.linked_input = Some(input);
        Ok(())
    }

    pub fn unlink_output_channels(&mut self, id: NodeId, output: usize) -> Result<()> {
        self.output_mut(id, output)?.linked_input = None;
        Ok(())
    }

    /// Run one tick of node `id`: sum its inputs, size its outputs and call
    /// its processor.
    ///
    /// Reading an output whose node has not ticked yet in the current frame
    /// marks that output as feedback; from then on it is read one tick late.
    pub fn tick(&mut self, id: NodeId) {
        let Some(mut node) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            return;
        };

        self.create_input_samples(id, &mut node);
        create_output_samples(&mut node);

        let Node {
            processor,
            inputs,
            outputs,
            ..
        } = &mut node;
        processor.generate(&self.ctx, inputs, outputs);
        node.last_tick = Some(self.ctx.frame);

        for output in &mut node.outputs {
            output.commit();
        }

        self.slots[id.index()] = Some(node);
    }

    /// Depth-first walk upstream from `root`.
    ///
    /// The result starts with `root`; every other node comes before all of
    /// its strictly upstream nodes, so ticking the list back to front runs
    /// producers before consumers. Edges back into a node that is still
    /// being walked close a cycle and do not constrain the order.
    ///
    /// All feedback marks are cleared, since the new order decides afresh
    /// which outputs are read before they are written.
    pub fn traverse(&mut self, root: NodeId) -> Vec<NodeId> {
        for node in self.slots.iter_mut().flatten() {
            for output in &mut node.outputs {
                output.feedback = None;
            }
        }

        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }

        let mut visited = HashSet::new();
        let mut stack = vec![(root, self.upstream(root), 0usize)];
        visited.insert(root);

        while let Some((id, upstream, cursor)) = stack.last_mut() {
            if *cursor < upstream.len() {
                let next = upstream[*cursor];
                *cursor += 1;
                if visited.insert(next) {
                    let next_upstream = self.upstream(next);
                    stack.push((next, next_upstream, 0));
                }
            } else {
                order.push(*id);
                stack.pop();
            }
        }

        order.reverse();
        trace!(root = ?root, nodes = order.len(), "recomputed traversal");
        order
    }

    pub(crate) fn advance_frame(&mut self) {
        self.ctx.frame += 1;
    }

    /// Return and clear the dirty flag.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::NodeNotFound(id))
    }

    fn output_mut(&mut self, id: NodeId, index: usize) -> Result<&mut Output> {
        self.node_mut(id)?
            .outputs
            .get_mut(index)
            .ok_or(Error::PinOutOfRange {
                node: id,
                kind: PinKind::Output,
                index,
            })
    }

    fn check(&self, pin: PinRef, kind: PinKind) -> Result<()> {
        let node = self.node(pin.node)?;
        let count = match kind {
            PinKind::Input => node.inputs.len(),
            PinKind::Output => node.outputs.len(),
        };
        if pin.index < count {
            Ok(())
        } else {
            Err(Error::PinOutOfRange {
                node: pin.node,
                kind,
                index: pin.index,
            })
        }
    }

    fn output_pin_mut(&mut self, pin: PinRef) -> Option<&mut Output> {
        self.slots
            .get_mut(pin.node.index())?
            .as_mut()?
            .outputs
            .get_mut(pin.index)
    }

    fn input_pin_mut(&mut self, pin: PinRef) -> Option<&mut Input> {
        self.slots
            .get_mut(pin.node.index())?
            .as_mut()?
            .inputs
            .get_mut(pin.index)
    }

    /// Remove the first matching entry on each side of a connection.
    fn unlink(&mut self, src: PinRef, dst: PinRef) {
        if let Some(out) = self.output_pin_mut(src) {
            if let Some(pos) = out.connected_to.iter().position(|pin| *pin == dst) {
                out.connected_to.remove(pos);
            }
        }
        if let Some(inp) = self.input_pin_mut(dst) {
            if let Some(pos) = inp.connected_from.iter().position(|pin| *pin == src) {
                inp.connected_from.remove(pos);
            }
            if inp.connected_from.is_empty() {
                inp.samples.clear();
            }
        }
        self.dirty = true;
        debug!(from = ?src, to = ?dst, "disconnected");
    }

    fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| {
                node.inputs
                    .iter()
                    .flat_map(|input| input.connected_from.iter().map(|pin| pin.node))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sum every connected output into each input of `node`.
    ///
    /// The node has been taken out of its slot, so self connections are read
    /// from `node` itself.
    fn create_input_samples(&mut self, id: NodeId, node: &mut Node) {
        let frame = self.ctx.frame;
        let max_block_size = self.max_block_size;
        let Node {
            inputs,
            outputs,
            last_tick,
            ..
        } = node;

        for input in inputs.iter_mut() {
            let mut channels = 0;
            for k in 0..input.connected_from.len() {
                let src = input.connected_from[k];
                let (ticked, output) = if src.node == id {
                    (*last_tick == Some(frame), outputs.get_mut(src.index))
                } else {
                    match self.slots.get_mut(src.node.index()).and_then(Option::as_mut) {
                        Some(producer) => (
                            producer.last_tick == Some(frame),
                            producer.outputs.get_mut(src.index),
                        ),
                        None => continue,
                    }
                };
                let Some(output) = output else {
                    continue;
                };
                if !ticked {
                    output.mark_feedback(max_block_size);
                }

                for (channel, sample) in output.read().iter().enumerate() {
                    if channel < channels {
                        input.samples[channel] += *sample;
                    } else if channel < input.samples.len() {
                        input.samples[channel] = *sample;
                        channels += 1;
                    } else {
                        input.samples.push(*sample);
                        channels += 1;
                    }
                }
            }
            input.samples.truncate(channels);
        }
    }
}

/// Size every output for this frame.
///
/// Pass-through nodes copy the matching input when it carries samples. Other
/// outputs follow their linked input's channel count if it is connected, or
/// their own fixed count; new channels start at zero.
fn create_output_samples(node: &mut Node) {
    let Node {
        processor,
        inputs,
        outputs,
        ..
    } = node;
    let passes_through = processor.passes_through();

    for (index, output) in outputs.iter_mut().enumerate() {
        if passes_through {
            if let Some(input) = inputs.get(index).filter(|input| !input.samples.is_empty()) {
                output.samples.clone_from(&input.samples);
                continue;
            }
        }

        let channels = match output.linked_input.and_then(|i| inputs.get(i)) {
            Some(input) if input.is_connected() => input.samples.len(),
            _ => output.channels,
        };
        output.samples.resize(channels, 0.0);
    }
}

fn resolve(
    from: &impl Endpoint,
    output: usize,
    to: &impl Endpoint,
    input: usize,
) -> Result<(PinRef, PinRef)> {
    let src = from.source(output).ok_or(Error::MissingPin {
        kind: PinKind::Output,
        index: output,
    })?;
    let dst = to.sink(input).ok_or(Error::MissingPin {
        kind: PinKind::Input,
        index: input,
    })?;
    Ok((src, dst))
}
