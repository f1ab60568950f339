//! Retention bitmap: which node values must survive evaluation.

use crate::graph::{GraphError, NodeIndex};

/// One flag per node. A set flag keeps the node's value past its last use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionBitmap {
    flags: Vec<bool>,
}

impl RetentionBitmap {
    /// Bitmap for a graph of `size` nodes with nothing retained.
    pub fn new(size: usize) -> Self {
        Self {
            flags: vec![false; size],
        }
    }

    /// Bitmap retaining exactly `nodes`.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if a node lies outside the graph.
    pub fn from_nodes<I>(size: usize, nodes: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = NodeIndex>,
    {
        let mut bitmap = Self::new(size);
        for node in nodes {
            bitmap.retain(node)?;
        }
        Ok(bitmap)
    }

    /// Marks `node` as retained.
    pub fn retain(&mut self, node: NodeIndex) -> Result<(), GraphError> {
        let size = self.flags.len();
        match self.flags.get_mut(node) {
            Some(flag) => {
                *flag = true;
                Ok(())
            }
            None => Err(GraphError::UnknownNode { node, size }),
        }
    }

    /// Returns `true` if `node` is retained.
    #[inline]
    pub fn is_retained(&self, node: NodeIndex) -> bool {
        self.flags.get(node).copied().unwrap_or(false)
    }

    /// Number of flags (graph size).
    #[inline]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Returns `true` for a bitmap of an empty graph.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of retained nodes.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nodes() {
        let bitmap = RetentionBitmap::from_nodes(5, [1, 3, 3]).unwrap();
        assert_eq!(bitmap.len(), 5);
        assert_eq!(bitmap.count(), 2);
        assert!(bitmap.is_retained(3));
        assert!(!bitmap.is_retained(0));
        assert!(!bitmap.is_retained(17));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(
            RetentionBitmap::from_nodes(2, [2]),
            Err(GraphError::UnknownNode { node: 2, size: 2 })
        );
    }
}
