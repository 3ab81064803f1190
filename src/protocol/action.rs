use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "up"),
            ScrollDirection::Down => write!(f, "down"),
        }
    }
}

/// One validated operation against the current page.
///
/// Produced by [`ActionProtocol`](super::ActionProtocol) after the ids were checked against
/// the page model it was given; the ids are only meaningful for that model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    GoBack,
    Scroll { direction: ScrollDirection },
    Click { id: usize },
    Type { id: usize, text: String, submit: bool },
    Complete,
}

impl Action {
    /// Affordance id targeted by the action, if any
    pub fn target(&self) -> Option<usize> {
        match self {
            Action::Click { id } | Action::Type { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Action::Complete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::GoBack => write!(f, "Go back"),
            Action::Scroll { direction } => write!(f, "Scroll {}", direction),
            Action::Click { id } => write!(f, "Click node {}", id),
            Action::Type { id, text, submit } => {
                write!(f, "Type {:?}", text)?;
                if *submit {
                    write!(f, " and submit")?;
                }
                write!(f, " into node {}", id)
            }
            Action::Complete => write!(f, "Objective complete"),
        }
    }
}
