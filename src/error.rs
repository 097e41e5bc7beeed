//! Error types for graph editing, configuration and the I/O collaborators.
//!
//! The per-sample path never produces errors. Everything here is raised while
//! building or editing a graph, validating configuration, decoding files or
//! starting a backend.

use core::fmt;

use crate::node::NodeId;

/// Which side of a node a pin index refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinKind {
    Input,
    Output,
}

impl fmt::Display for PinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinKind::Input => f.write_str("input"),
            PinKind::Output => f.write_str("output"),
        }
    }
}

/// Common error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The node id does not exist in the graph (never added, or deleted)
    #[error("node {0:?} not found")]
    NodeNotFound(NodeId),

    /// A pin index past the end of a node's inputs or outputs
    #[error("{kind} #{index} out of range on node {node:?}")]
    PinOutOfRange {
        node: NodeId,
        kind: PinKind,
        index: usize,
    },

    /// A group asked for a proxy pin it does not have
    #[error("endpoint has no {kind} #{index}")]
    MissingPin { kind: PinKind, index: usize },

    /// Rejected engine configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The file decoder could not make sense of its input
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio backend failure (device discovery, stream creation)
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;
