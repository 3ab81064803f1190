use crate::dom::element::{BoundingBox, Node};
use crate::dom::snapshot::LayoutTable;
use crate::dom::tree::DomTree;
use serde::{Deserialize, Serialize};

/// The visible part of the page: scroll offset and viewport size, in CSS pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScreenBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The viewport in its own coordinate space
    fn viewport(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.width, self.height)
    }
}

/// Attaches geometry to laid-out nodes and decides which nodes are on screen.
///
/// Only leaf geometry is trusted: containers often carry stale or degenerate boxes,
/// so a container is visible exactly when one of its children is.
#[derive(Debug, Clone)]
pub struct VisibilityResolver {
    screen: ScreenBounds,
    device_pixel_ratio: f64,
}

impl VisibilityResolver {
    /// A non-positive or non-finite ratio falls back to 1.0
    pub fn new(screen: ScreenBounds, device_pixel_ratio: f64) -> Self {
        let device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self { screen, device_pixel_ratio }
    }

    pub fn screen(&self) -> ScreenBounds {
        self.screen
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Annotate `bounding_box`, `center` and `visible` on every node
    pub fn resolve(&self, mut tree: DomTree, layout: &LayoutTable) -> DomTree {
        for node in tree.nodes_mut() {
            if let Some(raw) = layout.get(node.id) {
                node.set_bounding_box(self.to_viewport(raw));
            }
        }

        // children always sit at larger positions than their parent
        let mut visible = vec![false; tree.len()];
        for node in tree.nodes().rev() {
            visible[node.id.index()] = if node.is_leaf() {
                self.is_leaf_visible(node)
            } else {
                node.children.iter().any(|child| visible[child.index()])
            };
        }

        for node in tree.nodes_mut() {
            node.visible = visible[node.id.index()];
        }

        log::debug!(
            "Resolved visibility: {} of {} nodes on screen ({} with layout)",
            visible.iter().filter(|v| **v).count(),
            tree.len(),
            layout.len()
        );
        tree
    }

    /// Non-zero area, overlapping the viewport, and not hidden by inline style
    pub fn is_leaf_visible(&self, node: &Node) -> bool {
        match &node.bounding_box {
            Some(bbox) => bbox.is_visible() && bbox.intersects(&self.screen.viewport()) && !node.is_style_hidden(),
            None => false,
        }
    }

    fn to_viewport(&self, raw: [f64; 4]) -> BoundingBox {
        let [x, y, width, height] = raw.map(|v| v / self.device_pixel_ratio);
        BoundingBox::new(x - self.screen.x, y - self.screen.y, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::element::{NodeId, Point};

    fn linked(id: usize, parent: Option<usize>, tag: &str) -> Node {
        let mut node = Node::new(NodeId(id), tag);
        node.parent = parent.map(NodeId);
        node
    }

    // div > (span, p > (em, strong))
    fn nested_tree() -> DomTree {
        DomTree::from_nodes(vec![
            linked(0, None, "div"),
            linked(1, Some(0), "span"),
            linked(2, Some(0), "p"),
            linked(3, Some(2), "em"),
            linked(4, Some(2), "strong"),
        ])
        .unwrap()
    }

    fn resolver() -> VisibilityResolver {
        VisibilityResolver::new(ScreenBounds::new(0.0, 0.0, 800.0, 600.0), 1.0)
    }

    #[test]
    fn test_container_visible_through_descendant() {
        let mut layout = LayoutTable::new();
        layout.insert(NodeId(4), [10.0, 10.0, 30.0, 10.0]);

        let tree = resolver().resolve(nested_tree(), &layout);

        assert!(tree.get(NodeId(4)).unwrap().visible);
        assert!(tree.get(NodeId(2)).unwrap().visible);
        assert!(tree.root().visible);
        assert!(!tree.get(NodeId(1)).unwrap().visible);
        assert!(!tree.get(NodeId(3)).unwrap().visible);
    }

    #[test]
    fn test_container_geometry_is_ignored() {
        let mut layout = LayoutTable::new();
        // the container box covers the viewport but none of its leaves are laid out
        layout.insert(NodeId(2), [0.0, 0.0, 800.0, 600.0]);

        let tree = resolver().resolve(nested_tree(), &layout);

        assert!(tree.get(NodeId(2)).unwrap().bounding_box.is_some());
        assert!(!tree.get(NodeId(2)).unwrap().visible);
        assert!(!tree.root().visible);
    }

    #[test]
    fn test_zero_area_leaf_never_visible() {
        let mut layout = LayoutTable::new();
        layout.insert(NodeId(1), [10.0, 10.0, 0.0, 40.0]);
        layout.insert(NodeId(3), [10.0, 10.0, 40.0, 0.0]);

        let tree = resolver().resolve(nested_tree(), &layout);
        assert!(tree.nodes().all(|n| !n.visible));
    }

    #[test]
    fn test_leaf_outside_viewport() {
        let mut layout = LayoutTable::new();
        layout.insert(NodeId(1), [10.0, 700.0, 40.0, 40.0]);

        let tree = resolver().resolve(nested_tree(), &layout);
        assert!(!tree.get(NodeId(1)).unwrap().visible);
    }

    #[test]
    fn test_scroll_offset_moves_viewport() {
        let mut layout = LayoutTable::new();
        layout.insert(NodeId(1), [10.0, 700.0, 40.0, 40.0]);

        let resolver = VisibilityResolver::new(ScreenBounds::new(0.0, 500.0, 800.0, 600.0), 1.0);
        let tree = resolver.resolve(nested_tree(), &layout);

        let span = tree.get(NodeId(1)).unwrap();
        assert!(span.visible);
        assert_eq!(span.bounding_box, Some(BoundingBox::new(10.0, 200.0, 40.0, 40.0)));
        assert_eq!(span.center, Some(Point::new(30.0, 220.0)));
    }

    #[test]
    fn test_device_pixel_ratio_scales_geometry() {
        let mut layout = LayoutTable::new();
        layout.insert(NodeId(1), [20.0, 40.0, 100.0, 60.0]);

        let resolver = VisibilityResolver::new(ScreenBounds::new(0.0, 0.0, 800.0, 600.0), 2.0);
        let tree = resolver.resolve(nested_tree(), &layout);

        assert_eq!(
            tree.get(NodeId(1)).unwrap().bounding_box,
            Some(BoundingBox::new(10.0, 20.0, 50.0, 30.0))
        );
    }

    #[test]
    fn test_hidden_style_leaf() {
        let mut nodes = vec![linked(0, None, "div"), linked(1, Some(0), "span")];
        nodes[1].add_attribute("style", "visibility: hidden");
        let tree = DomTree::from_nodes(nodes).unwrap();

        let mut layout = LayoutTable::new();
        layout.insert(NodeId(1), [10.0, 10.0, 40.0, 40.0]);

        let tree = resolver().resolve(tree, &layout);
        assert!(!tree.get(NodeId(1)).unwrap().visible);
        assert!(!tree.root().visible);
    }

    #[test]
    fn test_invalid_ratio_falls_back() {
        let screen = ScreenBounds::new(0.0, 0.0, 800.0, 600.0);
        assert_eq!(VisibilityResolver::new(screen, 0.0).device_pixel_ratio(), 1.0);
        assert_eq!(VisibilityResolver::new(screen, f64::NAN).device_pixel_ratio(), 1.0);
        assert_eq!(VisibilityResolver::new(screen, 1.5).device_pixel_ratio(), 1.5);
    }
}
