//! Depth-ordered index of mounted nodes.

use super::NodeId;

/// Nodes sorted by depth, parents before children. Nodes at the same depth
/// keep mount order. Sorting is deferred until the order is read.
#[derive(Debug, Clone, Default)]
pub struct FlatTree {
    entries: Vec<(usize, NodeId)>,
    is_dirty: bool,
}

impl FlatTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: NodeId, depth: usize) {
        if !self.contains(node) {
            self.entries.push((depth, node));
            self.is_dirty = true;
        }
    }

    pub fn remove(&mut self, node: NodeId) {
        self.entries.retain(|(_, id)| *id != node);
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.iter().any(|(_, id)| *id == node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ordered(&mut self) -> Vec<NodeId> {
        if self.is_dirty {
            self.entries.sort_by_key(|(depth, _)| *depth);
            self.is_dirty = false;
        }
        self.entries.iter().map(|(_, id)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_by_depth_then_mount_order() {
        let mut tree = FlatTree::new();
        tree.add(NodeId(3), 2);
        tree.add(NodeId(1), 0);
        tree.add(NodeId(4), 1);
        tree.add(NodeId(2), 1);
        tree.add(NodeId(2), 1);

        assert_eq!(tree.len(), 4);
        assert_eq!(
            tree.ordered(),
            vec![NodeId(1), NodeId(4), NodeId(2), NodeId(3)]
        );

        tree.remove(NodeId(4));
        assert_eq!(tree.ordered(), vec![NodeId(1), NodeId(2), NodeId(3)]);
    }
}
