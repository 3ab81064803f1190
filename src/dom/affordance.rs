use crate::dom::element::{Node, NodeId};
use crate::dom::page::PageModel;
use crate::dom::tree::DomTree;
use indexmap::IndexMap;

/// Tags that can receive a click (when the renderer also flags them clickable)
pub const CLICKABLE_TAGS: &[&str] = &["a", "button", "img", "details", "summary"];

/// Form tags that accept typed input
pub const INPUT_TAGS: &[&str] = &["input", "textarea", "select", "option"];

/// Map of affordance ids to the nodes that hold them.
/// Uses IndexMap to preserve assignment order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AffordanceMap {
    map: IndexMap<usize, NodeId>,
}

impl AffordanceMap {
    /// Create a new empty AffordanceMap
    pub fn new() -> Self {
        Self { map: IndexMap::new() }
    }

    pub(crate) fn insert(&mut self, affordance_id: usize, node: NodeId) {
        self.map.insert(affordance_id, node);
    }

    /// Get the node holding an affordance id
    pub fn get(&self, affordance_id: usize) -> Option<NodeId> {
        self.map.get(&affordance_id).copied()
    }

    /// Check if an affordance id exists
    pub fn contains(&self, affordance_id: usize) -> bool {
        self.map.contains_key(&affordance_id)
    }

    /// Get the number of registered affordances
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all (affordance id, node) pairs in assignment order
    pub fn iter(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.map.iter().map(|(id, node)| (*id, *node))
    }

    /// Get all affordance ids
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    /// Export to JSON for debugging
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.map)
    }
}

/// Assigns dense affordance ids to visible interactive nodes.
///
/// Ids come from one counter shared by both maps, handed out in a single pre-order
/// walk (parent first, children in stored order). That order is the only source
/// of id determinism.
#[derive(Debug, Clone, Copy, Default)]
pub struct AffordanceIndexer;

impl AffordanceIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Consume a resolved tree and produce the page model
    pub fn index(&self, mut tree: DomTree) -> PageModel {
        let mut clickable = AffordanceMap::new();
        let mut inputable = AffordanceMap::new();
        let mut assignments = Vec::new();

        for node in tree.pre_order() {
            let is_clickable = Self::is_clickable(node);
            let is_inputable = Self::is_inputable(node);

            if Self::is_on_screen(node) && (is_clickable || is_inputable) {
                let affordance_id = assignments.len();
                if is_clickable {
                    clickable.insert(affordance_id, node.id);
                }
                if is_inputable {
                    inputable.insert(affordance_id, node.id);
                }
                assignments.push(node.id);
            }
        }

        for node in tree.nodes_mut() {
            node.affordance_id = None;
        }
        for (affordance_id, node_id) in assignments.iter().enumerate() {
            if let Some(node) = tree.get_mut(*node_id) {
                node.affordance_id = Some(affordance_id);
            }
        }

        log::debug!(
            "Indexed {} affordances ({} clickable, {} inputable)",
            assignments.len(),
            clickable.len(),
            inputable.len()
        );
        PageModel::new(tree, clickable, inputable)
    }

    /// Clickable tag, flagged clickable by the renderer, and placed on the page
    pub fn is_clickable(node: &Node) -> bool {
        CLICKABLE_TAGS.contains(&node.tag_name.as_str()) && node.is_clickable && node.center.is_some()
    }

    /// Form tag, or anything carrying an input value
    pub fn is_inputable(node: &Node) -> bool {
        INPUT_TAGS.contains(&node.tag_name.as_str()) || node.input_value.is_some()
    }

    fn is_on_screen(node: &Node) -> bool {
        node.visible && !node.is_style_hidden()
    }
}
