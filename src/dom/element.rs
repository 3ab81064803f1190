use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a node in the snapshot's flat arrays.
///
/// Only unique within one snapshot; ids from different captures must never be mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse node classification derived from the CDP `nodeType` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Element,
    Text,
    Other,
}

impl NodeKind {
    /// Map a DOM `nodeType` value (1 = element, 3 = text)
    pub fn from_node_type(node_type: i64) -> Self {
        match node_type {
            1 => NodeKind::Element,
            3 => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }
}

/// A node of the page tree, stored in a [`DomTree`](super::DomTree) arena
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Position in the snapshot arrays
    pub id: NodeId,

    /// Parent position; `None` only for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,

    pub kind: NodeKind,

    /// Lower-cased node name (`#text` for text nodes)
    pub tag_name: String,

    /// Trimmed node value (text content of text nodes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,

    /// Attributes in document order, values truncated to the snapshot cap
    #[serde(default)]
    pub attributes: IndexMap<String, String>,

    /// Renderer-stable backend id, useful when talking to CDP again
    #[serde(default)]
    pub backend_node_id: i64,

    /// Geometry in viewport-relative CSS pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Point>,

    /// Set when the renderer reported a click listener or native clickability
    #[serde(default)]
    pub is_clickable: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_checked: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_selected: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,

    /// Whether the node (or, for containers, a descendant) is on screen
    #[serde(default)]
    pub visible: bool,

    /// Dense id handed to the proposer for interactive nodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordance_id: Option<usize>,
}

/// Bounding box coordinates for a node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A point in viewport-relative CSS pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Node {
    /// Create a detached element node at the given position
    pub fn new(id: NodeId, tag_name: impl Into<String>) -> Self {
        Self {
            id,
            parent: None,
            kind: NodeKind::Element,
            tag_name: tag_name.into(),
            text_value: None,
            attributes: IndexMap::new(),
            backend_node_id: 0,
            bounding_box: None,
            center: None,
            is_clickable: false,
            input_value: None,
            input_checked: None,
            option_selected: None,
            children: Vec::new(),
            visible: false,
            affordance_id: None,
        }
    }

    /// Create a detached text node
    pub fn text(id: NodeId, value: impl Into<String>) -> Self {
        let mut node = Self::new(id, "#text");
        node.kind = NodeKind::Text;
        node.text_value = Some(value.into());
        node
    }

    /// Builder method: set the kind
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder method: set clickability
    pub fn with_clickable(mut self, clickable: bool) -> Self {
        self.is_clickable = clickable;
        self
    }

    /// Builder method: set the current input value
    pub fn with_input_value(mut self, value: impl Into<String>) -> Self {
        self.input_value = Some(value.into());
        self
    }

    /// Builder method: add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute(key, value);
        self
    }

    /// Add a single attribute
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Get attribute value by key
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Check if node is a specific tag
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Attach geometry, deriving the center from it
    pub fn set_bounding_box(&mut self, bbox: BoundingBox) {
        self.center = Some(bbox.center());
        self.bounding_box = Some(bbox);
    }

    /// Whether the inline style explicitly hides this node
    pub fn is_style_hidden(&self) -> bool {
        self.get_attribute("style").is_some_and(|style| {
            let declarations: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            declarations.contains("visibility:hidden")
        })
    }
}

impl BoundingBox {
    /// Create a new BoundingBox
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Check if the bounding box has non-zero dimensions
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Calculate the area of the bounding box
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Strict overlap test; boxes that only touch at an edge do not intersect
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Node::new(NodeId(3), "button")
            .with_attribute("id", "submit")
            .with_attribute("class", "btn primary")
            .with_clickable(true);

        assert_eq!(node.id, NodeId(3));
        assert!(node.is_tag("BUTTON"));
        assert_eq!(node.get_attribute("id"), Some("submit"));
        assert!(node.is_clickable);
        assert!(node.is_leaf());
        assert_eq!(node.kind, NodeKind::Element);
    }

    #[test]
    fn test_attributes_keep_document_order() {
        let node = Node::new(NodeId(0), "a")
            .with_attribute("href", "/x")
            .with_attribute("title", "X")
            .with_attribute("alt", "x");

        let keys: Vec<_> = node.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["href", "title", "alt"]);
    }

    #[test]
    fn test_text_node() {
        let node = Node::text(NodeId(4), "OK");
        assert!(node.is_text());
        assert_eq!(node.tag_name, "#text");
        assert_eq!(node.text_value.as_deref(), Some("OK"));
    }

    #[test]
    fn test_node_kind_from_node_type() {
        assert_eq!(NodeKind::from_node_type(1), NodeKind::Element);
        assert_eq!(NodeKind::from_node_type(3), NodeKind::Text);
        assert_eq!(NodeKind::from_node_type(9), NodeKind::Other);
    }

    #[test]
    fn test_style_hidden() {
        let hidden = Node::new(NodeId(1), "div").with_attribute("style", "color: red; visibility: hidden");
        let shown = Node::new(NodeId(2), "div").with_attribute("style", "visibility: visible");
        assert!(hidden.is_style_hidden());
        assert!(!shown.is_style_hidden());
        assert!(!Node::new(NodeId(3), "div").is_style_hidden());
    }

    #[test]
    fn test_style_hidden_ignores_spacing_and_case() {
        for style in ["visibility:hidden", "VISIBILITY: HIDDEN", "top: 0;visibility :\thidden ;"] {
            let node = Node::new(NodeId(0), "span").with_attribute("style", style);
            assert!(node.is_style_hidden(), "{:?} should hide the node", style);
        }
        let node = Node::new(NodeId(0), "span").with_attribute("style", "Visibility: Visible");
        assert!(!node.is_style_hidden());
    }

    #[test]
    fn test_set_bounding_box_derives_center() {
        let mut node = Node::new(NodeId(0), "img");
        node.set_bounding_box(BoundingBox::new(10.0, 20.0, 100.0, 50.0));
        assert_eq!(node.center, Some(Point::new(60.0, 45.0)));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 50.0);

        assert!(bbox.is_visible());
        assert_eq!(bbox.area(), 5000.0);

        let invisible_bbox = BoundingBox::new(0.0, 0.0, 0.0, 0.0);
        assert!(!invisible_bbox.is_visible());
    }

    #[test]
    fn test_bounding_box_intersects() {
        let viewport = BoundingBox::new(0.0, 0.0, 800.0, 600.0);
        assert!(BoundingBox::new(790.0, 590.0, 20.0, 20.0).intersects(&viewport));
        assert!(!BoundingBox::new(800.0, 0.0, 20.0, 20.0).intersects(&viewport));
        assert!(!BoundingBox::new(0.0, -30.0, 20.0, 30.0).intersects(&viewport));
    }

    #[test]
    fn test_serialization() {
        let mut node = Node::new(NodeId(2), "button").with_clickable(true);
        node.children.push(NodeId(3));
        node.affordance_id = Some(0);

        let json = serde_json::to_string(&node).unwrap();
        let deserialized: Node = serde_json::from_str(&json).unwrap();

        assert_eq!(node, deserialized);
    }
}
