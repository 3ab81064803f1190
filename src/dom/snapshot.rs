//! Decoding of `DOMSnapshot.captureSnapshot` results.
//!
//! The snapshot is columnar: every per-node property lives in its own array indexed by
//! node position, and all strings are indices into one shared string table.

use crate::dom::element::{Node, NodeId, NodeKind};
use crate::dom::tree::DomTree;
use crate::error::{BrowserError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

/// Default cap on attribute value length, in characters
pub const DEFAULT_ATTRIBUTE_VALUE_CAP: usize = 100;

/// Reads `null` as the type's default so absent CDP columns deserialize as empty
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level `DOMSnapshot.captureSnapshot` return value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapturedSnapshot {
    #[serde(default, deserialize_with = "nullable")]
    pub documents: Vec<DocumentSnapshot>,

    /// Shared string table
    #[serde(default, deserialize_with = "nullable")]
    pub strings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    #[serde(default, deserialize_with = "nullable")]
    pub nodes: NodeTreeSnapshot,

    #[serde(default, deserialize_with = "nullable")]
    pub layout: LayoutTreeSnapshot,
}

/// Per-node columns. String-valued columns hold string table indices, `-1` meaning absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeTreeSnapshot {
    #[serde(default, deserialize_with = "nullable")]
    pub parent_index: Vec<i64>,

    #[serde(default, deserialize_with = "nullable")]
    pub node_type: Vec<i64>,

    #[serde(default, deserialize_with = "nullable")]
    pub node_name: Vec<i64>,

    /// Absent or null means no node has a value; present must cover every node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_value: Option<Vec<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_node_id: Option<Vec<i64>>,

    /// Flattened `[name, value, name, value, ...]` per node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Vec<i64>>>,

    #[serde(default, deserialize_with = "nullable")]
    pub input_value: RareStringData,

    #[serde(default, deserialize_with = "nullable")]
    pub input_checked: RareBooleanData,

    #[serde(default, deserialize_with = "nullable")]
    pub option_selected: RareBooleanData,

    #[serde(default, deserialize_with = "nullable")]
    pub is_clickable: RareBooleanData,
}

/// Sparse string column: `value[i]` belongs to node `index[i]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RareStringData {
    #[serde(default, deserialize_with = "nullable")]
    pub index: Vec<i64>,

    #[serde(default, deserialize_with = "nullable")]
    pub value: Vec<i64>,
}

/// Sparse boolean column: every listed node has the flag set
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RareBooleanData {
    #[serde(default, deserialize_with = "nullable")]
    pub index: Vec<i64>,
}

/// Geometry of the nodes the renderer actually laid out
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTreeSnapshot {
    /// Node position for each layout entry
    #[serde(default, deserialize_with = "nullable")]
    pub node_index: Vec<i64>,

    /// `[x, y, width, height]` per layout entry, in device pixels
    #[serde(default, deserialize_with = "nullable")]
    pub bounds: Vec<Vec<f64>>,
}

impl CapturedSnapshot {
    /// Parse a raw CDP JSON value
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| BrowserError::MalformedSnapshot(format!("Failed to decode snapshot: {}", e)))
    }

    /// The main frame's document
    pub fn main_document(&self) -> Result<&DocumentSnapshot> {
        self.documents
            .first()
            .ok_or_else(|| BrowserError::MalformedSnapshot("snapshot contains no documents".to_string()))
    }
}

/// Options for [`SnapshotParser`]
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Attribute values longer than this many characters are cut off
    pub attribute_value_cap: usize,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            attribute_value_cap: DEFAULT_ATTRIBUTE_VALUE_CAP,
        }
    }
}

impl SnapshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute_value_cap(mut self, cap: usize) -> Self {
        self.attribute_value_cap = cap;
        self
    }
}

/// Decodes a columnar snapshot into a [`DomTree`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotParser {
    options: SnapshotOptions,
}

impl SnapshotParser {
    pub fn new(options: SnapshotOptions) -> Self {
        Self { options }
    }

    /// Build the tree for the snapshot's main document.
    ///
    /// All nodes are created first; parent/child links are wired in a second pass.
    pub fn parse(&self, snapshot: &CapturedSnapshot) -> Result<DomTree> {
        let document = snapshot.main_document()?;
        let columns = &document.nodes;
        let strings = StringTable(&snapshot.strings);
        let count = columns.parent_index.len();

        check_column("nodeType", Some(columns.node_type.len()), count)?;
        check_column("nodeName", Some(columns.node_name.len()), count)?;
        check_column("nodeValue", columns.node_value.as_ref().map(Vec::len), count)?;
        check_column("backendNodeId", columns.backend_node_id.as_ref().map(Vec::len), count)?;
        check_column("attributes", columns.attributes.as_ref().map(Vec::len), count)?;

        let clickable = position_set(&columns.is_clickable.index);
        let checked = position_set(&columns.input_checked.index);
        let selected = position_set(&columns.option_selected.index);
        let input_values = input_value_map(&columns.input_value, &strings)?;

        let mut nodes = Vec::with_capacity(count);
        for i in 0..count {
            let parent = match columns.parent_index[i] {
                p if p < 0 => None,
                p => Some(NodeId(p as usize)),
            };

            let tag_name = strings
                .get(columns.node_name[i])?
                .map(str::to_lowercase)
                .unwrap_or_default();

            let mut node = Node::new(NodeId(i), tag_name).with_kind(NodeKind::from_node_type(columns.node_type[i]));
            node.parent = parent;
            node.text_value = match columns.node_value.as_ref().and_then(|values| values.get(i)) {
                Some(&index) => strings.get(index)?.map(|v| v.trim().to_string()),
                None => None,
            };
            node.backend_node_id = columns
                .backend_node_id
                .as_ref()
                .and_then(|ids| ids.get(i))
                .copied()
                .unwrap_or_default();
            node.attributes = match columns.attributes.as_ref().and_then(|attributes| attributes.get(i)) {
                Some(flat) => self.attributes(flat, &strings)?,
                None => IndexMap::new(),
            };
            node.is_clickable = clickable.contains(&i);
            node.input_value = input_values.get(&i).cloned();
            node.input_checked = checked.contains(&i).then_some(true);
            node.option_selected = selected.contains(&i).then_some(true);

            nodes.push(node);
        }

        let tree = DomTree::from_nodes(nodes)?;
        log::debug!(
            "Parsed snapshot: {} nodes ({} elements) from {} strings",
            tree.len(),
            tree.count_elements(),
            snapshot.strings.len()
        );
        Ok(tree)
    }

    /// Pair up flattened name/value indices; a trailing unpaired name is dropped
    fn attributes(&self, flat: &[i64], strings: &StringTable<'_>) -> Result<IndexMap<String, String>> {
        let mut attributes = IndexMap::with_capacity(flat.len() / 2);
        for pair in flat.chunks_exact(2) {
            let Some(name) = strings.get(pair[0])? else {
                continue;
            };
            let value = strings.get(pair[1])?.unwrap_or_default();
            attributes.insert(name.to_string(), truncate_chars(value, self.options.attribute_value_cap));
        }
        Ok(attributes)
    }
}

/// Position → raw device-pixel rectangle for every laid-out node
#[derive(Debug, Clone, Default)]
pub struct LayoutTable {
    bounds: HashMap<NodeId, [f64; 4]>,
}

impl LayoutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the layout columns of the snapshot's main document.
    ///
    /// Rectangles that do not have exactly four components are skipped.
    pub fn from_snapshot(snapshot: &CapturedSnapshot) -> Result<Self> {
        let layout = &snapshot.main_document()?.layout;
        if layout.node_index.len() != layout.bounds.len() {
            return Err(BrowserError::MalformedSnapshot(format!(
                "layout has {} node indices but {} bounds",
                layout.node_index.len(),
                layout.bounds.len()
            )));
        }

        let mut table = Self::new();
        for (&position, rect) in layout.node_index.iter().zip(&layout.bounds) {
            match (usize::try_from(position), <[f64; 4]>::try_from(rect.as_slice())) {
                (Ok(position), Ok(rect)) => table.insert(NodeId(position), rect),
                _ => log::debug!("Skipping layout entry for node {}: {:?}", position, rect),
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, id: NodeId, rect: [f64; 4]) {
        self.bounds.insert(id, rect);
    }

    pub fn get(&self, id: NodeId) -> Option<[f64; 4]> {
        self.bounds.get(&id).copied()
    }

    /// Width of the root document's layout rectangle, used to derive the device pixel ratio
    pub fn document_width(&self) -> Option<f64> {
        self.get(NodeId(0)).map(|rect| rect[2])
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

struct StringTable<'a>(&'a [String]);

impl<'a> StringTable<'a> {
    /// Resolve an index; negative means absent, out of range is malformed
    fn get(&self, index: i64) -> Result<Option<&'a str>> {
        if index < 0 {
            return Ok(None);
        }
        self.0
            .get(index as usize)
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| {
                BrowserError::MalformedSnapshot(format!(
                    "string index {} out of range ({} strings)",
                    index,
                    self.0.len()
                ))
            })
    }
}

/// `None` is a column the renderer left out; a present column needs one entry per node
fn check_column(name: &str, len: Option<usize>, expected: usize) -> Result<()> {
    match len {
        Some(len) if len != expected => Err(BrowserError::MalformedSnapshot(format!(
            "{} has {} entries, expected {}",
            name, len, expected
        ))),
        _ => Ok(()),
    }
}

fn position_set(indices: &[i64]) -> HashSet<usize> {
    indices
        .iter()
        .filter_map(|&i| usize::try_from(i).ok())
        .collect()
}

fn input_value_map(data: &RareStringData, strings: &StringTable<'_>) -> Result<HashMap<usize, String>> {
    if data.index.len() != data.value.len() {
        return Err(BrowserError::MalformedSnapshot(format!(
            "inputValue has {} indices but {} values",
            data.index.len(),
            data.value.len()
        )));
    }

    let mut values = HashMap::with_capacity(data.index.len());
    for (&position, &value) in data.index.iter().zip(&data.value) {
        if let Ok(position) = usize::try_from(position) {
            values.insert(position, strings.get(value)?.unwrap_or_default().to_string());
        }
    }
    Ok(values)
}

fn truncate_chars(value: &str, cap: usize) -> String {
    match value.char_indices().nth(cap) {
        Some((end, _)) => value[..end].to_string(),
        None => value.to_string(),
    }
}
