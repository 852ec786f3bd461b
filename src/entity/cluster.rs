//! Cluster payloads: ordered child collections.

use super::NeuronId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered list of child neuron ids.
///
/// All mutation happens through a `children_mut` view handed out by the lock
/// manager; index errors surface as [`Error::OutOfBounds`], never panics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildList {
    items: Vec<NeuronId>,
}

impl ChildList {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NeuronId> {
        self.items.iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<NeuronId> {
        self.items.get(index).copied()
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.items.contains(&id)
    }

    pub fn index_of(&self, id: NeuronId) -> Option<usize> {
        self.items.iter().position(|&c| c == id)
    }

    /// Append a child.
    pub fn add(&mut self, id: NeuronId) {
        self.items.push(id);
    }

    /// Insert a child at `index` (may equal `len`).
    pub fn insert(&mut self, index: usize, id: NeuronId) -> Result<()> {
        if index > self.items.len() {
            return Err(Error::OutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, id);
        Ok(())
    }

    /// Remove the first occurrence of `id`. Returns whether anything changed.
    pub fn remove(&mut self, id: NeuronId) -> bool {
        match self.index_of(id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove the child at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<NeuronId> {
        if index >= self.items.len() {
            return Err(Error::OutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// Move the child at `from` to position `to` (positions interpreted
    /// against the list after removal, matching list-model semantics).
    pub fn move_child(&mut self, from: usize, to: usize) -> Result<()> {
        if from >= self.items.len() {
            return Err(Error::OutOfBounds {
                index: from,
                len: self.items.len(),
            });
        }
        let id = self.items.remove(from);
        if to > self.items.len() {
            // Restore before reporting, so a failed move is a no-op.
            self.items.insert(from, id);
            return Err(Error::OutOfBounds {
                index: to,
                len: self.items.len(),
            });
        }
        self.items.insert(to, id);
        Ok(())
    }

    /// Snapshot of the child ids.
    pub fn to_vec(&self) -> Vec<NeuronId> {
        self.items.clone()
    }
}

/// Payload of a cluster neuron: a meaning tag plus ordered children.
///
/// For expression clusters the meaning names the instruction neuron and the
/// children are the argument list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterData {
    pub meaning: NeuronId,
    pub children: ChildList,
}

impl ClusterData {
    pub fn new(meaning: NeuronId) -> Self {
        Self {
            meaning,
            children: ChildList::new(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> NeuronId {
        NeuronId(v)
    }

    #[test]
    fn ordered_ops_match_reference_model() {
        let mut list = ChildList::new();
        let mut model: Vec<NeuronId> = Vec::new();

        for v in 1..=5 {
            list.add(id(v));
            model.push(id(v));
        }

        list.insert(2, id(99)).unwrap();
        model.insert(2, id(99));

        list.remove_at(0).unwrap();
        model.remove(0);

        list.move_child(3, 0).unwrap();
        let moved = model.remove(3);
        model.insert(0, moved);

        assert_eq!(list.to_vec(), model);
    }

    #[test]
    fn out_of_bounds_is_an_error_not_a_panic() {
        let mut list = ChildList::new();
        list.add(id(1));
        assert!(matches!(
            list.remove_at(5),
            Err(Error::OutOfBounds { index: 5, len: 1 })
        ));
        assert!(list.insert(3, id(2)).is_err());
        assert!(list.move_child(0, 9).is_err());
        // Failed move left the list untouched
        assert_eq!(list.to_vec(), vec![id(1)]);
    }
}
