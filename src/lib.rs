//! # axon
//!
//! Graph-based symbolic execution engine: all data and code are typed graph
//! nodes ("neurons") connected by directed, meaning-tagged edges ("links").
//! An instruction set operates over this graph, executed by lightweight
//! cooperating workers ("processors") that synchronize through fine-grained
//! per-entity locks and stream cold entities to a pluggable storage backend.
//!
//! ## Quick Start
//! ```rust,ignore
//! use axon::{Brain, EngineSettings, MemoryStore, NeuronValue, Opcode};
//!
//! let brain = Brain::new(EngineSettings::default(), Box::new(MemoryStore::new()));
//!
//! // Build the graph
//! let x = brain.new_neuron(NeuronValue::Int(5));
//! let y = brain.new_neuron(NeuronValue::Int(3));
//! let expr = brain.new_expression(Opcode::MinusInt, &[x.id(), y.id()])?;
//!
//! // Evaluate: yields a temp neuron holding Int(2)
//! let results = brain.evaluate(expr);
//! ```
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            AXON                                  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │   Brain      → facade: ids, well-known neurons, events, clear   │
//! │   Processor  → call frames, variable scopes, suspend/awake      │
//! │   Scheduler  → bounded thread pool, reserved resume partition   │
//! │   Instructions → capability-dispatched opcodes over the graph   │
//! │   Entities   → neurons, links, clusters (indexed edge sets)     │
//! │   Locks      → (entity, aspect) granular, sorted bulk requests  │
//! │   Cache      → bounded resident set, dirty write-back eviction  │
//! │   Storage    → pluggable load/save/delete/exists backend        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

// === Core modules ===
pub mod brain;
pub mod cache;
pub mod config;
pub mod entity;
pub mod instruction;
pub mod lock;
pub mod processor;
pub mod storage;

// === Re-exports for convenience ===

// Entity model
pub use crate::entity::{
    ChildList, ClusterData, EdgeSet, Link, NeuronCell, NeuronId, NeuronKind, NeuronSpec,
    NeuronValue,
};

// Lock manager
pub use crate::lock::{Aspect, LockManager, LockRequest, LockSet};

// Cache / storage bridge
pub use crate::cache::{CacheBridge, StorageMode};
pub use crate::storage::{JsonStore, MemoryStore, NeuronRecord, Storage, StorageError};

// Instruction set
pub use crate::instruction::{ArgCount, Capabilities, Instruction, InstructionSet, Opcode};

// Processor / scheduler
pub use crate::processor::{Processor, ProcessorState, Scheduler, SuspensionRegistry, WaitHandle};

// Brain facade
pub use crate::brain::{Brain, BrainEvent, BrainListener, ChangeKind, ListenerId, SinChannel};

// Configuration
pub use crate::config::EngineSettings;

// === Error types ===

/// Crate-level error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown neuron: {0}")]
    UnknownNeuron(NeuronId),

    #[error("neuron {0} is still referenced by links")]
    StillLinked(NeuronId),

    #[error("link {from}-[{meaning}]->{to} not found")]
    LinkNotFound {
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
    },

    #[error("link {from}-[{meaning}]->{to} already exists")]
    LinkExists {
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
    },

    #[error("index {index} out of bounds (len={len})")]
    OutOfBounds { index: usize, len: usize },

    #[error("duplicate suspension on indicator {0}")]
    DuplicateSuspension(NeuronId),

    #[error("not a cluster: {0}")]
    NotACluster(NeuronId),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;

// === Constants ===

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
