//! Arena of remote nodes indexed by id.
//!
//! Parent links are stored as ids, so a malformed remote can describe a
//! cycle. Every walk here carries a visited set and stops when it revisits a
//! node.

use mirror_core::types::RemoteNode;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    nodes: Vec<RemoteNode>,
    index: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>
}

impl RemoteTree {
    /// Build the arena. Later duplicates of an id are ignored.
    pub fn new(nodes: impl IntoIterator<Item = RemoteNode>) -> Self {
        let mut tree = Self::default();
        for node in nodes {
            if tree.index.contains_key(&node.id) {
                tracing::warn!("remote listed node {} twice, keeping the first", node.id);
                continue;
            }
            tree.index.insert(node.id.clone(), tree.nodes.len());
            tree.nodes.push(node);
        }
        for (idx, node) in tree.nodes.iter().enumerate() {
            if let Some(parent) = &node.parent_id {
                if parent != &node.id {
                    tree.children.entry(parent.clone()).or_default().push(idx);
                }
            }
        }
        tree
    }

    pub fn get(&self, id: &str) -> Option<&RemoteNode> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[RemoteNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_children(&self, id: &str) -> bool {
        self.children.get(id).is_some_and(|c| !c.is_empty())
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &RemoteNode> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.nodes[idx])
    }

    /// Ancestors of `id`, nearest first. Stops at a missing parent or at the
    /// first node already seen on this walk.
    pub fn ancestors(&self, id: &str) -> Vec<&RemoteNode> {
        let mut out = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut current = self.get(id).and_then(|n| n.parent_id.as_deref());
        while let Some(parent_id) = current {
            if !visited.insert(parent_id) {
                tracing::warn!("cycle in remote parent chain at {}", parent_id);
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            out.push(parent);
            current = parent.parent_id.as_deref();
        }
        out
    }

    /// Every node, parents before children. Roots (no parent, or a parent
    /// outside the tree) come in list order; nodes only reachable through a
    /// cycle are appended last in list order.
    pub fn parents_first(&self) -> Vec<&RemoteNode> {
        let mut visited = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| match &n.parent_id {
                None => true,
                Some(p) => p == &n.id || !self.contains(p)
            })
            .map(|(idx, _)| idx)
            .collect();

        while let Some(idx) = queue.pop_front() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            out.push(&self.nodes[idx]);
            if let Some(children) = self.children.get(&self.nodes[idx].id) {
                queue.extend(children.iter().copied().filter(|c| !visited[*c]));
            }
        }

        for (idx, seen) in visited.iter().enumerate() {
            if !seen {
                out.push(&self.nodes[idx]);
            }
        }
        out
    }
}
