//! Links and lazily indexed edge sets.

use super::{NeuronId, EDGE_INDEX_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// LINK
// ============================================================================

/// A directed, meaning-tagged edge.
///
/// Identity is the `(from, to, meaning)` triple. The `info` list is an
/// ordered set of auxiliary neuron ids attached to the edge itself; the
/// canonical copy lives in the source neuron's outgoing edge set, the mirror
/// entry in the target's incoming set carries an empty list.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Link {
    pub from: NeuronId,
    pub to: NeuronId,
    pub meaning: NeuronId,
    pub info: Vec<NeuronId>,
}

impl Link {
    /// New link with an empty info list.
    pub fn new(from: NeuronId, to: NeuronId, meaning: NeuronId) -> Self {
        Self {
            from,
            to,
            meaning,
            info: Vec::new(),
        }
    }

    /// True if `other` names the same edge (info ignored).
    #[inline]
    pub fn same_edge(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> bool {
        self.from == from && self.to == to && self.meaning == meaning
    }
}

// ============================================================================
// EDGE SET
// ============================================================================

/// An ordered edge collection with a lazily built meaning-id index.
///
/// Below [`EDGE_INDEX_THRESHOLD`] edges, lookups scan linearly — cheaper than
/// maintaining a map for the common low-degree case. Once the threshold is
/// crossed the index maps meaning id → positions (ascending), keeping
/// `first_with_meaning` and containment checks sublinear while preserving
/// insertion order.
#[derive(Clone, Debug, Default)]
pub struct EdgeSet {
    links: Vec<Link>,
    index: Option<HashMap<NeuronId, Vec<usize>>>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Whether the meaning index has been materialized.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Link> {
        self.links.iter()
    }

    /// Append a link, updating the index (building it when the set crosses
    /// the degree threshold).
    pub fn push(&mut self, link: Link) {
        let pos = self.links.len();
        if self.index.is_none() && pos + 1 > EDGE_INDEX_THRESHOLD {
            self.build_index();
        }
        if let Some(index) = self.index.as_mut() {
            index.entry(link.meaning).or_default().push(pos);
        }
        self.links.push(link);
    }

    /// Remove the link named by the triple, returning it if present.
    /// The index is rebuilt afterwards; removal is O(degree) regardless.
    pub fn remove(&mut self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Option<Link> {
        let pos = self.position(from, to, meaning)?;
        let link = self.links.remove(pos);
        if self.index.is_some() {
            self.build_index();
        }
        Some(link)
    }

    /// True if the triple is present. O(degree) or better via the index.
    pub fn contains(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> bool {
        self.position(from, to, meaning).is_some()
    }

    /// True if any link carries this meaning.
    pub fn contains_meaning(&self, meaning: NeuronId) -> bool {
        match &self.index {
            Some(index) => index.get(&meaning).is_some_and(|v| !v.is_empty()),
            None => self.links.iter().any(|l| l.meaning == meaning),
        }
    }

    /// First link with this meaning, in insertion order.
    pub fn first_with_meaning(&self, meaning: NeuronId) -> Option<&Link> {
        match &self.index {
            Some(index) => index
                .get(&meaning)
                .and_then(|v| v.first())
                .map(|&pos| &self.links[pos]),
            None => self.links.iter().find(|l| l.meaning == meaning),
        }
    }

    /// Mutable access to the link named by the triple (for info edits).
    pub fn link_mut(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        meaning: NeuronId,
    ) -> Option<&mut Link> {
        let pos = self.position(from, to, meaning)?;
        Some(&mut self.links[pos])
    }

    /// Snapshot of all links.
    pub fn to_vec(&self) -> Vec<Link> {
        self.links.clone()
    }

    fn position(&self, from: NeuronId, to: NeuronId, meaning: NeuronId) -> Option<usize> {
        match &self.index {
            Some(index) => index
                .get(&meaning)?
                .iter()
                .copied()
                .find(|&pos| self.links[pos].same_edge(from, to, meaning)),
            None => self.links.iter().position(|l| l.same_edge(from, to, meaning)),
        }
    }

    fn build_index(&mut self) {
        let mut index: HashMap<NeuronId, Vec<usize>> = HashMap::new();
        for (pos, link) in self.links.iter().enumerate() {
            index.entry(link.meaning).or_default().push(pos);
        }
        self.index = Some(index);
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
    fn push_and_first_preserve_order() {
        let mut set = EdgeSet::new();
        set.push(Link::new(id(1), id(10), id(100)));
        set.push(Link::new(id(1), id(11), id(100)));
        assert_eq!(set.first_with_meaning(id(100)).unwrap().to, id(10));
        assert!(set.contains_meaning(id(100)));
        assert!(!set.contains_meaning(id(101)));
    }

    #[test]
    fn index_builds_past_threshold_and_stays_coherent() {
        let mut set = EdgeSet::new();
        for i in 0..(EDGE_INDEX_THRESHOLD as u64 + 8) {
            set.push(Link::new(id(1), id(100 + i), id(500 + i % 3)));
        }
        assert!(set.is_indexed());

        // First-match order survives indexing
        assert_eq!(set.first_with_meaning(id(500)).unwrap().to, id(100));

        // Removal keeps the index coherent
        assert!(set.remove(id(1), id(100), id(500)).is_some());
        assert!(!set.contains(id(1), id(100), id(500)));
        assert_eq!(set.first_with_meaning(id(500)).unwrap().to, id(103));
    }

    #[test]
    fn remove_missing_is_none() {
        let mut set = EdgeSet::new();
        set.push(Link::new(id(1), id(2), id(3)));
        assert!(set.remove(id(1), id(2), id(4)).is_none());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn link_mut_edits_info_in_place() {
        let mut set = EdgeSet::new();
        set.push(Link::new(id(1), id(2), id(3)));
        set.link_mut(id(1), id(2), id(3)).unwrap().info.push(id(9));
        assert_eq!(set.first_with_meaning(id(3)).unwrap().info, vec![id(9)]);
    }
}
