use crate::dom::affordance::{AffordanceIndexer, AffordanceMap};
use crate::dom::element::Node;
use crate::dom::render;
use crate::dom::snapshot::{CapturedSnapshot, LayoutTable, SnapshotOptions, SnapshotParser};
use crate::dom::tree::DomTree;
use crate::dom::visibility::{ScreenBounds, VisibilityResolver};
use crate::error::Result;
use std::collections::BTreeSet;

/// Immutable view of one snapshot: the tree plus its clickable and inputable affordances.
///
/// A new capture always yields a new `PageModel`; affordance ids are meaningless across models.
#[derive(Debug, Clone)]
pub struct PageModel {
    tree: DomTree,
    clickable: AffordanceMap,
    inputable: AffordanceMap,
}

impl PageModel {
    pub(crate) fn new(tree: DomTree, clickable: AffordanceMap, inputable: AffordanceMap) -> Self {
        Self {
            tree,
            clickable,
            inputable,
        }
    }

    /// Run the whole pipeline: parse, resolve visibility, index affordances
    pub fn from_snapshot(
        snapshot: &CapturedSnapshot,
        screen: ScreenBounds,
        device_pixel_ratio: f64,
        options: &SnapshotOptions,
    ) -> Result<Self> {
        let tree = SnapshotParser::new(options.clone()).parse(snapshot)?;
        let layout = LayoutTable::from_snapshot(snapshot)?;
        let tree = VisibilityResolver::new(screen, device_pixel_ratio).resolve(tree, &layout);
        Ok(AffordanceIndexer::new().index(tree))
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn clickable(&self) -> &AffordanceMap {
        &self.clickable
    }

    pub fn inputable(&self) -> &AffordanceMap {
        &self.inputable
    }

    /// Node holding an affordance id, from either map
    pub fn node(&self, affordance_id: usize) -> Option<&Node> {
        self.clickable
            .get(affordance_id)
            .or_else(|| self.inputable.get(affordance_id))
            .and_then(|id| self.tree.get(id))
    }

    pub fn clickable_node(&self, affordance_id: usize) -> Option<&Node> {
        self.clickable.get(affordance_id).and_then(|id| self.tree.get(id))
    }

    pub fn inputable_node(&self, affordance_id: usize) -> Option<&Node> {
        self.inputable.get(affordance_id).and_then(|id| self.tree.get(id))
    }

    /// Union of both maps' keys, ascending
    pub fn affordance_ids(&self) -> BTreeSet<usize> {
        self.clickable.ids().chain(self.inputable.ids()).collect()
    }

    /// Number of distinct affordances
    pub fn len(&self) -> usize {
        self.affordance_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clickable.is_empty() && self.inputable.is_empty()
    }

    /// The outline handed to the proposer
    pub fn render_outline(&self) -> String {
        render::render_outline(self)
    }
}
