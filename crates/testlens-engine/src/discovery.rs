use std::collections::HashMap;
use testlens_core::{Node, NodeId, TestTree};
use tracing::{info, warn};

/// Routes keys to the nodes of the most recent discovered set.
#[derive(Debug, Default)]
pub struct DiscoveryIndex {
    tree: TestTree,
    root: Option<NodeId>,
    by_key: HashMap<String, NodeId>,
}

impl DiscoveryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole set. Nothing from the previous set stays reachable.
    pub fn on_discovered(&mut self, tree: TestTree) {
        let mut roots = tree.iter().filter(|node| node.is_root()).map(|node| node.id);
        let root = roots.next();
        let extra_roots = roots.count();
        if extra_roots > 0 {
            warn!(
                event = "discovery_multiple_roots",
                epoch = tree.epoch(),
                extra = extra_roots
            );
        }

        let mut by_key = HashMap::with_capacity(tree.len());
        let mut duplicates = 0usize;
        for node in tree.iter() {
            if by_key.contains_key(&node.key) {
                duplicates += 1;
                continue;
            }
            by_key.insert(node.key.clone(), node.id);
        }
        if duplicates > 0 {
            warn!(
                event = "discovery_duplicate_keys",
                epoch = tree.epoch(),
                duplicates
            );
        }

        info!(
            event = "tests_discovered",
            epoch = tree.epoch(),
            nodes = tree.len(),
            has_root = root.is_some()
        );

        self.tree = tree;
        self.root = root;
        self.by_key = by_key;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|id| self.tree.get(id))
    }

    pub fn id_of(&self, key: &str) -> Option<NodeId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.id_of(key).and_then(|id| self.tree.get(id))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        let id = self.id_of(key)?;
        self.tree.get_mut(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.tree.get_mut(id)
    }

    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut TestTree {
        &mut self.tree
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{discovered, sample_outline};
    use testlens_core::ROOT_KEY;

    #[test]
    fn rebuild_drops_every_node_of_the_previous_set() {
        let mut index = DiscoveryIndex::new();
        index.on_discovered(TestTree::from_outline(&sample_outline()));
        let old_leaf = index.id_of("math adds").expect("first set");
        let old_root = index.root().expect("first root");

        index.on_discovered(TestTree::from_outline(&sample_outline()));

        assert!(index.node(old_leaf).is_none());
        assert!(index.node(old_root).is_none());
        let new_leaf = index.id_of("math adds").expect("second set");
        assert_ne!(new_leaf, old_leaf);
        assert_eq!(index.get("math adds").map(|node| node.id), Some(new_leaf));
    }

    #[test]
    fn keys_missing_from_the_new_set_are_gone() {
        let mut index = DiscoveryIndex::new();
        index.on_discovered(TestTree::from_outline(&sample_outline()));
        assert!(index.get("standalone").is_some());

        index.on_discovered(discovered(&[("root", None, true), ("only", Some("root"), false)]));
        assert!(index.get("standalone").is_none());
        assert!(index.get("only").is_some());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn root_is_located_by_marker_not_position() {
        let mut index = DiscoveryIndex::new();
        index.on_discovered(TestTree::from_outline(&sample_outline()));
        assert_eq!(index.root_node().map(|node| node.key.as_str()), Some(ROOT_KEY));

        index.on_discovered(discovered(&[
            ("suite", None, false),
            ("marker", None, true),
        ]));
        assert_eq!(index.root_node().map(|node| node.key.as_str()), Some("marker"));
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let mut index = DiscoveryIndex::new();
        index.on_discovered(discovered(&[("a", None, false), ("b", Some("a"), false)]));
        assert!(index.root().is_none());
        assert!(index.get("b").is_some());
    }

    #[test]
    fn duplicate_keys_resolve_to_first_occurrence() {
        let mut index = DiscoveryIndex::new();
        index.on_discovered(discovered(&[("dup", None, false), ("dup", None, false)]));
        let id = index.id_of("dup").expect("dup");
        assert_eq!(id.index(), 0);
    }
}
