use crate::dom::element::{Node, NodeId, NodeKind};
use crate::error::{BrowserError, Result};

/// Arena of nodes reconstructed from one snapshot.
///
/// Nodes are addressed by [`NodeId`], which is also their index in the arena.
/// Node 0 is the root and every other node's parent sits at a smaller index.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
}

impl DomTree {
    /// Wire parent/child links over a flat list of nodes.
    ///
    /// Each node must carry its own position as `id` and its parent in `parent`;
    /// `children` are rebuilt here in position order.
    pub fn from_nodes(mut nodes: Vec<Node>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(BrowserError::MalformedSnapshot("snapshot contains no nodes".to_string()));
        }

        for node in &mut nodes {
            node.children.clear();
        }

        for i in 0..nodes.len() {
            if nodes[i].id != NodeId(i) {
                return Err(BrowserError::MalformedSnapshot(format!(
                    "node at position {} carries id {}",
                    i, nodes[i].id
                )));
            }

            match (i, nodes[i].parent) {
                (0, None) => {}
                (0, Some(parent)) => {
                    return Err(BrowserError::MalformedSnapshot(format!(
                        "root node declares parent {}",
                        parent
                    )));
                }
                (_, None) => {
                    return Err(BrowserError::MalformedSnapshot(format!(
                        "node {} has no parent but is not the root",
                        i
                    )));
                }
                (_, Some(parent)) if parent.index() >= i => {
                    return Err(BrowserError::MalformedSnapshot(format!(
                        "node {} references parent {} which is not defined before it",
                        i, parent
                    )));
                }
                (_, Some(parent)) => nodes[parent.index()].children.push(NodeId(i)),
            }
        }

        Ok(Self { nodes })
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in position order
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> {
        self.nodes.iter()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    /// Children of a node, in stored order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.get(*child))
    }

    /// Depth-first, parent-before-children walk from the root
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![NodeId(0)],
        }
    }

    /// Count element nodes (text and other nodes excluded)
    pub fn count_elements(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Element)
            .count()
    }

    /// Find the node holding an affordance id
    pub fn find_node_by_affordance(&self, affordance_id: usize) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.affordance_id == Some(affordance_id))
    }

    /// Convert the tree to JSON (nodes in position order)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.nodes)
            .map_err(|e| BrowserError::MalformedSnapshot(format!("Failed to serialize tree to JSON: {}", e)))
    }
}

/// Iterator returned by [`DomTree::pre_order`]
pub struct PreOrder<'a> {
    tree: &'a DomTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}
