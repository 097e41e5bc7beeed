//! Composite nodes.
//!
//! A [`Group`] bundles several nodes behind a set of proxy pins. Each of its
//! inputs and outputs is a one-pin [`PassThrough`] node; outside code connects
//! to the group exactly as it would to a single node, and the group's own
//! wiring stays between the proxies.

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Endpoint, Graph};
use crate::node::{NodeId, SignalProcessor};
use crate::nodes::PassThrough;
use crate::pin::PinRef;

/// A set of nodes that behaves like one node.
///
/// ```
/// use schall::{Graph, Group};
/// use schall::nodes::{Constant, Gain, PassThrough};
///
/// let mut graph = Graph::new(44_100, 1024);
///
/// // A "voice" that halves whatever it is given.
/// let mut voice = Group::new(&mut graph, 1, 1);
/// let gain = voice.add(&mut graph, Gain::new(0.5));
/// graph.connect(&voice.input(0).unwrap(), &gain).unwrap();
/// graph.connect(&gain, &voice.output(0).unwrap()).unwrap();
///
/// let source = graph.add(Constant::new(1.0));
/// let sink = graph.add(PassThrough::new(1));
/// graph.connect(&source, &voice).unwrap();
/// graph.connect(&voice, &sink).unwrap();
///
/// for id in graph.traverse(sink).into_iter().rev() {
///     graph.tick(id);
/// }
/// assert_eq!(graph.input(sink, 0).unwrap().samples(), &[0.5]);
/// ```
#[derive(Clone, Debug)]
pub struct Group {
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    members: Vec<NodeId>,
}

impl Group {
    /// Create a group with `num_inputs` input proxies and `num_outputs`
    /// output proxies.
    pub fn new(graph: &mut Graph, num_inputs: usize, num_outputs: usize) -> Self {
        let inputs = (0..num_inputs).map(|_| graph.add(PassThrough::new(1))).collect();
        let outputs = (0..num_outputs).map(|_| graph.add(PassThrough::new(1))).collect();
        debug!(num_inputs, num_outputs, "created group");
        Self {
            inputs,
            outputs,
            members: Vec::new(),
        }
    }

    /// Proxy node behind input `index`. Internal nodes read from its output 0.
    #[inline]
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied()
    }

    /// Proxy node behind output `index`. Internal nodes feed its input 0.
    #[inline]
    pub fn output(&self, index: usize) -> Option<NodeId> {
        self.outputs.get(index).copied()
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Add a node to the graph as a member of this group.
    pub fn add<P: SignalProcessor>(&mut self, graph: &mut Graph, processor: P) -> NodeId {
        self.adopt(graph.add(processor))
    }

    /// Make an existing node a member, so it is removed along with the group.
    pub fn adopt(&mut self, id: NodeId) -> NodeId {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        id
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Disconnect the proxies and every member from the graph.
    ///
    /// Members already deleted from the graph are skipped. Any other failure
    /// is reported after the remaining nodes have been severed.
    pub fn remove(&self, graph: &mut Graph) -> Result<()> {
        let mut first_error = None;
        for id in self.nodes() {
            match graph.remove(id) {
                Ok(()) => {}
                Err(Error::NodeNotFound(missing)) => {
                    debug!(node = ?missing, "group member already gone");
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Remove the group and drop all of its nodes from the graph.
    pub fn delete(self, graph: &mut Graph) {
        for id in self.nodes() {
            graph.delete(id);
        }
    }

    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .chain(&self.members)
            .copied()
    }
}

impl Endpoint for Group {
    fn source(&self, output: usize) -> Option<PinRef> {
        self.output(output).map(|id| PinRef::new(id, 0))
    }

    fn sink(&self, input: usize) -> Option<PinRef> {
        self.input(input).map(|id| PinRef::new(id, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Constant, Gain};

    fn voice(graph: &mut Graph) -> (Group, NodeId) {
        let mut voice = Group::new(graph, 2, 1);
        let gain = voice.add(graph, Gain::new(1.0));
        graph.connect(&voice.input(0).unwrap(), &gain).unwrap();
        graph.connect_pins(&voice.input(1).unwrap(), 0, &gain, 1).unwrap();
        graph.connect(&gain, &voice.output(0).unwrap()).unwrap();
        (voice, gain)
    }

    #[test]
    fn proxies_route_external_connections() {
        let mut graph = Graph::new(44_100, 64);
        let (voice, _) = voice(&mut graph);
        let signal = graph.add(Constant::new(0.5));
        let level = graph.add(Constant::new(0.25));
        let sink = graph.add(PassThrough::new(1));
        graph.connect(&signal, &voice).unwrap();
        graph.connect_pins(&level, 0, &voice, 1).unwrap();
        graph.connect(&voice, &sink).unwrap();

        for id in graph.traverse(sink).into_iter().rev() {
            graph.tick(id);
        }
        assert_eq!(graph.input(sink, 0).unwrap().samples(), &[0.125]);
    }

    #[test]
    fn missing_proxy_is_an_error() {
        let mut graph = Graph::new(44_100, 64);
        let (voice, _) = voice(&mut graph);
        let sink = graph.add(PassThrough::new(1));
        assert!(matches!(
            graph.connect_pins(&voice, 1, &sink, 0),
            Err(Error::MissingPin { index: 1, .. })
        ));
    }

    #[test]
    fn remove_cascades_to_members() {
        let mut graph = Graph::new(44_100, 64);
        let (voice, gain) = voice(&mut graph);
        let signal = graph.add(Constant::new(0.5));
        graph.connect(&signal, &voice).unwrap();

        voice.remove(&mut graph).unwrap();
        assert!(graph.output(signal, 0).unwrap().connected_to().is_empty());
        assert!(graph.input(gain, 0).unwrap().connected_from().is_empty());
        assert!(graph.contains(gain));

        let before = graph.len();
        voice.delete(&mut graph);
        assert_eq!(graph.len(), before - 4);
        assert!(!graph.contains(gain));
    }

    #[test]
    fn remove_skips_members_deleted_beforehand() {
        let mut graph = Graph::new(44_100, 64);
        let mut group = Group::new(&mut graph, 0, 0);
        let a = group.add(&mut graph, Gain::new(1.0));
        let b = group.add(&mut graph, Gain::new(1.0));
        let signal = graph.add(Constant::new(0.5));
        graph.connect(&signal, &b).unwrap();

        graph.delete(a);
        group.remove(&mut graph).unwrap();
        assert!(graph.input(b, 0).unwrap().connected_from().is_empty());
        assert!(graph.output(signal, 0).unwrap().connected_to().is_empty());
    }
}
