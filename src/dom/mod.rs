//! Page model reconstruction
//!
//! This module turns a columnar `DOMSnapshot.captureSnapshot` result into an addressable
//! page model. It includes:
//! - SnapshotParser: decodes the flat arrays and string table into a node arena
//! - VisibilityResolver: attaches geometry and decides what is on screen
//! - AffordanceIndexer: numbers the visible clickable and inputable nodes
//! - PageModel: the immutable result, and the outline rendered from it

pub mod affordance;
pub mod element;
pub mod page;
pub mod render;
pub mod snapshot;
pub mod tree;
pub mod visibility;

pub use affordance::{AffordanceIndexer, AffordanceMap};
pub use element::{BoundingBox, Node, NodeId, NodeKind, Point};
pub use page::PageModel;
pub use snapshot::{CapturedSnapshot, LayoutTable, SnapshotOptions, SnapshotParser};
pub use tree::DomTree;
pub use visibility::{ScreenBounds, VisibilityResolver};
