//! Entity model — neurons, links, clusters.
//!
//! A neuron is a typed graph node with two lazily indexed edge sets
//! (`links_out`, `links_in`). A link is a directed edge tagged by a *meaning*
//! (itself a neuron id) with an optional ordered info list. A cluster is a
//! neuron whose payload is an ordered collection of child neuron ids.
//!
//! Each mutable aspect of a neuron (value, outgoing edges, incoming edges,
//! children) lives behind its own lock so that the lock manager can grant
//! `(entity, aspect)` granular access — a value read on one neuron proceeds
//! while a structural change on another aspect of the same neuron is locked.

mod cluster;
mod edges;
mod neuron;

pub use cluster::{ChildList, ClusterData};
pub use edges::{EdgeSet, Link};
pub use neuron::NeuronCell;

use crate::instruction::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Edge count past which an edge set builds its meaning-id index.
pub const EDGE_INDEX_THRESHOLD: usize = 16;

// ============================================================================
// NEURON IDENTITY
// ============================================================================

/// Process-unique 64-bit neuron identifier.
///
/// Ids are allocated monotonically by the [`Brain`](crate::Brain) and never
/// reused while anything references them. Id 0 is the empty sentinel.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize, Default,
)]
pub struct NeuronId(pub u64);

impl NeuronId {
    /// The empty-id sentinel: never refers to a real neuron.
    pub const EMPTY: NeuronId = NeuronId(0);

    /// True if this is the empty sentinel.
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// KIND AND VALUE
// ============================================================================

/// Discriminated neuron kind, fixed at creation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Generic neuron with no payload.
    Empty,
    /// Integer leaf.
    Int,
    /// Floating-point leaf.
    Double,
    /// Text leaf.
    Text,
    /// Ordered child collection (also the shape of an expression).
    Cluster,
    /// Instruction node carrying an opcode.
    Instruction,
    /// Sensory interface: an external output channel.
    Sin,
    /// Timer neuron.
    Timer,
    /// Variable: resolves through a processor's scope stack.
    Variable,
}

/// Typed value payload for leaf neurons.
///
/// Clusters keep their payload in [`ClusterData`]; instruction neurons carry
/// their opcode outside the value lock since opcodes are immutable.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub enum NeuronValue {
    #[default]
    Empty,
    Int(i64),
    Double(f64),
    Text(String),
}

impl NeuronValue {
    /// Kind implied by this payload.
    pub fn kind(&self) -> NeuronKind {
        match self {
            NeuronValue::Empty => NeuronKind::Empty,
            NeuronValue::Int(_) => NeuronKind::Int,
            NeuronValue::Double(_) => NeuronKind::Double,
            NeuronValue::Text(_) => NeuronKind::Text,
        }
    }

    /// Integer payload, if this is an Int.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            NeuronValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating payload: Double directly, Int widened.
    #[inline]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            NeuronValue::Double(v) => Some(*v),
            NeuronValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Text payload, if this is a Text.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NeuronValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Immutable per-kind creation data for [`NeuronCell`].
#[derive(Clone, Debug)]
pub enum NeuronSpec {
    /// Leaf neuron holding a value payload.
    Leaf(NeuronValue),
    /// Cluster with a meaning tag.
    Cluster { meaning: NeuronId },
    /// Instruction node.
    Instruction(Opcode),
    /// Sensory interface neuron.
    Sin,
    /// Timer neuron.
    Timer,
    /// Variable neuron.
    Variable,
}
