//! Storage layer — the abstract backend interface plus reference backends.
//!
//! The engine only ever talks to [`Storage`]; the bit-exact on-disk format is
//! owned by the backend. [`MemoryStore`] backs tests, [`JsonStore`] is a
//! file-per-neuron JSON reference backend.

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::entity::{
    ChildList, ClusterData, Link, NeuronCell, NeuronId, NeuronKind, NeuronSpec, NeuronValue,
};
use crate::instruction::Opcode;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(NeuronId),
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: NeuronId, reason: String },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Abstract storage backend consumed by the cache / storage bridge.
pub trait Storage: Send + Sync {
    fn load(&self, id: NeuronId) -> Result<NeuronRecord, StorageError>;
    fn save(&self, id: NeuronId, record: &NeuronRecord) -> Result<(), StorageError>;
    fn delete(&self, id: NeuronId) -> Result<(), StorageError>;
    fn exists(&self, id: NeuronId) -> bool;
}

// ============================================================================
// RECORD MODEL
// ============================================================================

/// Serializable snapshot of one neuron, the unit of load/save.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeuronRecord {
    pub id: NeuronId,
    pub kind: NeuronKind,
    #[serde(default)]
    pub value: NeuronValue,
    #[serde(default)]
    pub opcode: Option<Opcode>,
    /// Cluster meaning tag (EMPTY for non-clusters).
    #[serde(default)]
    pub meaning: NeuronId,
    #[serde(default)]
    pub children: Vec<NeuronId>,
    #[serde(default)]
    pub clustered_by: Vec<NeuronId>,
    #[serde(default)]
    pub links_out: Vec<Link>,
    #[serde(default)]
    pub links_in: Vec<Link>,
    #[serde(default)]
    pub temp: bool,
}

impl NeuronRecord {
    /// Snapshot a resident cell. Takes each aspect's read lock briefly.
    pub fn from_cell(cell: &NeuronCell) -> Self {
        let (meaning, children) = cell
            .cluster_snapshot()
            .unwrap_or((NeuronId::EMPTY, Vec::new()));
        Self {
            id: cell.id(),
            kind: cell.kind(),
            value: cell.value_snapshot(),
            opcode: cell.opcode(),
            meaning,
            children,
            clustered_by: cell.clustered_by_snapshot(),
            links_out: cell.links_out_snapshot(),
            links_in: cell.links_in_snapshot(),
            temp: cell.is_temp(),
        }
    }

    /// Rebuild a cell from this record.
    pub fn into_cell(self) -> NeuronCell {
        let spec = match self.kind {
            NeuronKind::Cluster => NeuronSpec::Cluster {
                meaning: self.meaning,
            },
            NeuronKind::Instruction => {
                // A missing opcode is tolerated as an empty slot; the
                // dispatcher logs if it is ever executed.
                match self.opcode {
                    Some(op) => NeuronSpec::Instruction(op),
                    None => NeuronSpec::Leaf(NeuronValue::Empty),
                }
            }
            NeuronKind::Sin => NeuronSpec::Sin,
            NeuronKind::Timer => NeuronSpec::Timer,
            NeuronKind::Variable => NeuronSpec::Variable,
            _ => NeuronSpec::Leaf(self.value.clone()),
        };
        let cell = NeuronCell::new(self.id, spec);
        cell.set_temp(self.temp);

        {
            let mut out = cell.links_out_lock().write();
            for link in self.links_out {
                out.push(link);
            }
        }
        {
            let mut inn = cell.links_in_lock().write();
            for link in self.links_in {
                inn.push(link);
            }
        }
        if let Some(cluster) = cell.cluster_lock() {
            let mut data = cluster.write();
            let mut list = ChildList::new();
            for child in self.children {
                list.add(child);
            }
            *data = ClusterData {
                meaning: self.meaning,
                children: list,
            };
        }
        for owner in self.clustered_by {
            cell.clustered_by_add(owner);
        }
        cell
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn record_round_trips_a_cluster() {
        let cell = NeuronCell::new(
            NeuronId(7),
            NeuronSpec::Cluster {
                meaning: NeuronId(3),
            },
        );
        cell.cluster_lock()
            .unwrap()
            .write()
            .children
            .add(NeuronId(9));
        cell.links_out_lock()
            .write()
            .push(Link::new(NeuronId(7), NeuronId(9), NeuronId(3)));

        let record = NeuronRecord::from_cell(&cell);
        let rebuilt = Arc::new(record.clone().into_cell());

        assert_eq!(rebuilt.id(), NeuronId(7));
        assert_eq!(
            rebuilt.cluster_snapshot(),
            Some((NeuronId(3), vec![NeuronId(9)]))
        );
        assert_eq!(NeuronRecord::from_cell(&rebuilt), record);
    }
}
