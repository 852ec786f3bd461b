//! Lock manager — `(entity, aspect)` granular locking with a globally
//! consistent bulk acquisition order.
//!
//! Lock granularity is `(entity, aspect)`, not just entity: a value read on
//! one neuron proceeds while a structural change on a different aspect of the
//! same neuron is locked, and vice versa.
//!
//! Deadlock avoidance: any operation needing more than one lock routes
//! through [`LockManager::lock_many`], which sorts the requests by
//! `(NeuronId, Aspect)` before acquiring. Nesting individual requests in
//! arbitrary order is the primary deadlock hazard this component exists to
//! prevent; a thread-local ledger of held keys detects it and logs the
//! violation as a caller bug.
//!
//! The returned [`LockSet`] is the capability token: accessors to the locked
//! state exist only on it, so state that requires a held lock cannot be
//! reached without one. Release is RAII.

mod manager;

pub use manager::{LockManager, LockRequest, LockSet};

use serde::{Deserialize, Serialize};

/// Lockable aspect of a neuron. Order matters: it is the second component of
/// the global acquisition order.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub enum Aspect {
    /// The typed value payload.
    Value,
    /// Outgoing edge set.
    EdgesOut,
    /// Incoming edge set.
    EdgesIn,
    /// Cluster children (clusters only).
    Children,
}
