//! Input bindings and the value store produced by evaluation.

use std::collections::BTreeMap;

use crate::graph::NodeIndex;
use crate::operand::RandomVariable;

/// Values supplied for input nodes (constants, parameters, path slices).
///
/// Bindings are read, never consumed, so the same bindings can drive any
/// number of evaluation runs.
#[derive(Debug, Clone, Default)]
pub struct InputBindings {
    values: BTreeMap<NodeIndex, RandomVariable>,
}

impl InputBindings {
    /// Creates empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `node`, replacing any earlier binding.
    pub fn bind(&mut self, node: NodeIndex, value: RandomVariable) {
        self.values.insert(node, value);
    }

    /// Binds a scalar broadcast over `paths` paths.
    pub fn bind_scalar(&mut self, node: NodeIndex, paths: usize, value: f64) {
        self.bind(node, RandomVariable::new(paths, value));
    }

    /// Value bound to `node`.
    #[inline]
    pub fn get(&self, node: NodeIndex) -> Option<&RandomVariable> {
        self.values.get(&node)
    }

    /// Returns `true` if `node` is bound.
    #[inline]
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.values.contains_key(&node)
    }

    /// Number of bound nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is bound.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sparse node-indexed store of evaluated values.
///
/// After a completed forward run it holds exactly the retained nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueStore {
    values: Vec<Option<RandomVariable>>,
}

impl ValueStore {
    /// Creates a store with room for `size` nodes and no values.
    pub fn with_size(size: usize) -> Self {
        Self {
            values: vec![None; size],
        }
    }

    pub(crate) fn from_slots(values: Vec<Option<RandomVariable>>) -> Self {
        Self { values }
    }

    /// Value of `node`, if present.
    #[inline]
    pub fn get(&self, node: NodeIndex) -> Option<&RandomVariable> {
        self.values.get(node).and_then(Option::as_ref)
    }

    /// Returns `true` if `node` has a value.
    #[inline]
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.get(node).is_some()
    }

    /// Removes and returns the value of `node`.
    pub fn take(&mut self, node: NodeIndex) -> Option<RandomVariable> {
        self.values.get_mut(node).and_then(Option::take)
    }

    /// Number of nodes with a value.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Returns `true` if no node has a value.
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Highest node index with a value, `None` if empty.
    pub fn max_index(&self) -> Option<NodeIndex> {
        self.values.iter().rposition(Option::is_some)
    }

    /// Iterates `(node, value)` in node order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &RandomVariable)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings() {
        let mut b = InputBindings::new();
        assert!(b.is_empty());
        b.bind_scalar(3, 4, 1.5);
        b.bind(5, RandomVariable::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(b.len(), 2);
        assert!(b.contains(3));
        assert_eq!(b.get(3).map(|v| v.at(2)), Some(1.5));
        assert!(b.get(4).is_none());
    }

    #[test]
    fn test_store_is_sparse() {
        let mut s = ValueStore::with_size(5);
        assert!(s.is_empty());
        s = ValueStore::from_slots(vec![None, Some(RandomVariable::new(2, 1.0)), None, Some(RandomVariable::new(2, 2.0))]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.max_index(), Some(3));
        assert_eq!(s.iter().map(|(i, _)| i).collect::<Vec<_>>(), vec![1, 3]);
        assert!(s.take(1).is_some());
        assert!(!s.contains(1));
        assert!(s.get(99).is_none());
    }
}
