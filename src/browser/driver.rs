//! The browser seam: capturing pages and performing validated actions.

use crate::browser::screenshot::Screenshot;
use crate::dom::{CapturedSnapshot, Node, PageModel, Point, ScreenBounds, SnapshotOptions};
use crate::error::{BrowserError, Result};
use crate::protocol::{Action, ScrollDirection};

/// Everything read from the page for one step
#[derive(Debug, Clone)]
pub struct Capture {
    pub snapshot: CapturedSnapshot,
    /// Viewport scroll offset and size in CSS pixels
    pub screen: ScreenBounds,
    pub device_pixel_ratio: f64,
    pub screenshot: Option<Screenshot>,
}

impl Capture {
    /// Build the page model for this capture
    pub fn page_model(&self, options: &SnapshotOptions) -> Result<PageModel> {
        PageModel::from_snapshot(&self.snapshot, self.screen, self.device_pixel_ratio, options)
    }
}

/// Operations the action loop needs from a browser.
///
/// Points are viewport-relative CSS pixels, as stored on nodes of a [`PageModel`].
pub trait BrowserDriver {
    fn capture_snapshot(&self) -> Result<Capture>;

    fn click(&self, point: Point) -> Result<()>;

    /// Focus the element at `point`, type `text`, and press Enter when `submit` is set
    fn type_text(&self, point: Point, text: &str, submit: bool) -> Result<()>;

    fn scroll(&self, direction: ScrollDirection) -> Result<()>;

    fn go_back(&self) -> Result<()>;

    fn navigate(&self, url: &str) -> Result<()>;
}

/// What the loop should do after an action ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Capture the page again and ask for the next action
    Continue,
    /// The proposer declared the objective complete
    Complete,
}

/// Perform a validated action against the page it was validated for
pub fn execute_action<D: BrowserDriver + ?Sized>(driver: &D, model: &PageModel, action: &Action) -> Result<Outcome> {
    match action {
        Action::GoBack => driver.go_back()?,
        Action::Scroll { direction } => driver.scroll(*direction)?,
        Action::Click { id } => {
            let node = model.clickable_node(*id).ok_or(BrowserError::UnknownAffordance(*id))?;
            driver.click(target_point(node, "click")?)?;
        }
        Action::Type { id, text, submit } => {
            let node = model.inputable_node(*id).ok_or(BrowserError::UnknownAffordance(*id))?;
            driver.type_text(target_point(node, "type")?, text, *submit)?;
        }
        Action::Complete => return Ok(Outcome::Complete),
    }
    Ok(Outcome::Continue)
}

fn target_point(node: &Node, action: &str) -> Result<Point> {
    node.center.ok_or_else(|| BrowserError::ActionFailed {
        action: action.to_string(),
        reason: format!("<{}> has no bounds to target", node.tag_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{AffordanceMap, BoundingBox, DomTree, NodeId};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingDriver {
        calls: RefCell<Vec<String>>,
    }

    impl BrowserDriver for RecordingDriver {
        fn capture_snapshot(&self) -> Result<Capture> {
            Err(BrowserError::TabOperationFailed("not supported".to_string()))
        }

        fn click(&self, point: Point) -> Result<()> {
            self.calls.borrow_mut().push(format!("click {} {}", point.x, point.y));
            Ok(())
        }

        fn type_text(&self, point: Point, text: &str, submit: bool) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("type {} {} {:?} {}", point.x, point.y, text, submit));
            Ok(())
        }

        fn scroll(&self, direction: ScrollDirection) -> Result<()> {
            self.calls.borrow_mut().push(format!("scroll {}", direction));
            Ok(())
        }

        fn go_back(&self) -> Result<()> {
            self.calls.borrow_mut().push("back".to_string());
            Ok(())
        }

        fn navigate(&self, url: &str) -> Result<()> {
            self.calls.borrow_mut().push(format!("navigate {}", url));
            Ok(())
        }
    }

    fn model() -> PageModel {
        let mut button = Node::new(NodeId(1), "button");
        button.parent = Some(NodeId(0));
        button.set_bounding_box(BoundingBox::new(10.0, 20.0, 100.0, 40.0));
        let mut input = Node::new(NodeId(2), "input");
        input.parent = Some(NodeId(0));
        let tree = DomTree::from_nodes(vec![Node::new(NodeId(0), "body"), button, input]).unwrap();

        let mut clickable = AffordanceMap::new();
        clickable.insert(0, NodeId(1));
        let mut inputable = AffordanceMap::new();
        inputable.insert(1, NodeId(2));
        PageModel::new(tree, clickable, inputable)
    }

    #[test]
    fn test_click_targets_center() {
        let driver = RecordingDriver::default();
        let outcome = execute_action(&driver, &model(), &Action::Click { id: 0 }).unwrap();

        assert_eq!(outcome, Outcome::Continue);
        assert_eq!(driver.calls.borrow().as_slice(), ["click 60 40"]);
    }

    #[test]
    fn test_scroll_and_back() {
        let driver = RecordingDriver::default();
        let model = model();
        execute_action(
            &driver,
            &model,
            &Action::Scroll {
                direction: ScrollDirection::Up,
            },
        )
        .unwrap();
        execute_action(&driver, &model, &Action::GoBack).unwrap();

        assert_eq!(driver.calls.borrow().as_slice(), ["scroll up", "back"]);
    }

    #[test]
    fn test_complete_touches_nothing() {
        let driver = RecordingDriver::default();
        let outcome = execute_action(&driver, &model(), &Action::Complete).unwrap();

        assert_eq!(outcome, Outcome::Complete);
        assert!(driver.calls.borrow().is_empty());
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let driver = RecordingDriver::default();
        let result = execute_action(&driver, &model(), &Action::Click { id: 1 });

        assert!(matches!(result, Err(BrowserError::UnknownAffordance(1))));
        assert!(driver.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_geometry() {
        let driver = RecordingDriver::default();
        let action = Action::Type {
            id: 1,
            text: "hi".to_string(),
            submit: false,
        };

        let result = execute_action(&driver, &model(), &action);
        assert!(matches!(result, Err(BrowserError::ActionFailed { .. })));
    }
}
