//! Error taxonomy for graph construction and analysis

use crate::data::{NodeId, SkeletonId};
use thiserror::Error;

/// Errors raised by the converters and analyses.
///
/// These describe problems with the caller's data and are never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// The node table has no node without a parent
    #[error("skeleton {skeleton_id} has no root node")]
    NoRoot { skeleton_id: SkeletonId },

    /// The node table has more than one node without a parent
    #[error("skeleton {skeleton_id} has {} root nodes: {roots:?}", .roots.len())]
    MultipleRoots {
        skeleton_id: SkeletonId,
        roots: Vec<NodeId>,
    },

    /// A record in the node table belongs to another skeleton
    #[error("treenode {node_id} belongs to skeleton {found}, not {skeleton_id}")]
    ForeignNode {
        skeleton_id: SkeletonId,
        node_id: NodeId,
        found: SkeletonId,
    },

    /// The same treenode id appears twice in one node table
    #[error("skeleton {skeleton_id} lists treenode {node_id} more than once")]
    DuplicateNode {
        skeleton_id: SkeletonId,
        node_id: NodeId,
    },

    /// A parent id does not reference a node of the same table
    #[error("treenode {node_id} references parent {parent_id}, which is not in skeleton {skeleton_id}")]
    DanglingParent {
        skeleton_id: SkeletonId,
        node_id: NodeId,
        parent_id: NodeId,
    },

    /// Following parents from this node never reaches the root
    #[error("treenode {node_id} of skeleton {skeleton_id} is part of a parent cycle")]
    Cycle {
        skeleton_id: SkeletonId,
        node_id: NodeId,
    },

    /// A graph has no vertex with a null parent attribute
    #[error("no root vertex found in graph of skeleton {skeleton_id}")]
    NoRootFound { skeleton_id: SkeletonId },

    /// A node id was requested that the graph does not contain
    #[error("treenode {node_id} is not part of skeleton {skeleton_id}")]
    UnknownNode {
        skeleton_id: SkeletonId,
        node_id: NodeId,
    },

    /// The operation cannot work on this kind of input
    #[error("{operation} does not accept {input}")]
    UnsupportedInput {
        operation: &'static str,
        input: String,
    },

    /// Clustering needs at least two observations
    #[error("clustering needs at least 2 synapse-bearing nodes, found {found}")]
    EmptyClusterInput { found: usize },

    /// An optional collaborator (e.g. a plot sink) was requested but not supplied
    #[error("optional component not available: {0}")]
    MissingOptionalDependency(String),

    /// A mesh face references a vertex that does not exist
    #[error("invalid volume {name}: {reason}")]
    InvalidVolume { name: String, reason: String },

    /// A matrix has the wrong shape for the operation
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),
}
