use std::fmt;
use thiserror::Error;

/// Errors raised while capturing a page or driving the browser
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The snapshot's columnar arrays could not be turned into a tree.
    /// Usually transient: the page was not fully loaded, so re-capture after a delay.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Action '{action}' failed: {reason}")]
    ActionFailed { action: String, reason: String },

    /// An action referenced an affordance id the page model does not know about
    #[error("No affordance with id {0} on the current page")]
    UnknownAffordance(usize),
}

/// Result alias used by the snapshot pipeline and the browser driver
pub type Result<T> = std::result::Result<T, BrowserError>;

/// Which affordance map an id was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffordanceKind {
    Clickable,
    Inputable,
}

impl AffordanceKind {
    /// The action function that requires this kind
    pub fn function(self) -> &'static str {
        match self {
            AffordanceKind::Clickable => "click",
            AffordanceKind::Inputable => "type",
        }
    }
}

impl fmt::Display for AffordanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffordanceKind::Clickable => write!(f, "clickable"),
            AffordanceKind::Inputable => write!(f, "inputable"),
        }
    }
}

/// A proposal that could not be turned into an action.
///
/// All of these are fed back to the proposer and retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProposalError {
    #[error("No code blocks found, please include a code block in your response")]
    NoCodeBlock,

    #[error("No function called: {0}")]
    NoActionParsed(String),

    #[error("No id specified for {0}()")]
    MissingId(&'static str),

    #[error("{}() called but id {id} is not {kind}", .kind.function())]
    UnknownOrWrongKindId { id: i64, kind: AffordanceKind },

    #[error("Malformed arguments: {0}")]
    MalformedArguments(String),
}

impl ProposalError {
    /// Stable name of the error kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProposalError::NoCodeBlock => "NoCodeBlock",
            ProposalError::NoActionParsed(_) => "NoActionParsed",
            ProposalError::MissingId(_) => "MissingId",
            ProposalError::UnknownOrWrongKindId { .. } => "UnknownOrWrongKindId",
            ProposalError::MalformedArguments(_) => "MalformedArguments",
        }
    }
}

/// Failures of the proposal transport itself
#[derive(Debug, Error)]
pub enum ProposerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Missing API key: set {0}")]
    MissingApiKey(String),
}

/// One rejected proposal, kept for the caller's observability
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Full proposal text as received
    pub proposal: String,
    pub error: ProposalError,
}

/// Terminal failures of one action-selection step
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Max retries exceeded after {} attempts: {last}", .attempts.len())]
    RetriesExhausted {
        last: ProposalError,
        attempts: Vec<Attempt>,
    },

    #[error("Proposer failed: {0}")]
    Proposer(#[from] ProposerError),

    #[error("Cancelled while waiting for a proposal")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_snapshot_message() {
        let err = BrowserError::MalformedSnapshot("nodeName has 3 entries, expected 4".to_string());
        assert_eq!(err.to_string(), "Malformed snapshot: nodeName has 3 entries, expected 4");
    }

    #[test]
    fn test_action_failed_message() {
        let err = BrowserError::ActionFailed {
            action: "click".to_string(),
            reason: "target closed".to_string(),
        };
        assert!(err.to_string().contains("'click'"));
        assert!(err.to_string().contains("target closed"));
    }

    #[test]
    fn test_wrong_kind_message() {
        let err = ProposalError::UnknownOrWrongKindId {
            id: 7,
            kind: AffordanceKind::Clickable,
        };
        assert_eq!(err.to_string(), "click() called but id 7 is not clickable");

        let err = ProposalError::UnknownOrWrongKindId {
            id: 2,
            kind: AffordanceKind::Inputable,
        };
        assert_eq!(err.to_string(), "type() called but id 2 is not inputable");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ProposalError::NoCodeBlock.kind_name(), "NoCodeBlock");
        assert_eq!(ProposalError::MissingId("click").kind_name(), "MissingId");
        assert_eq!(ProposalError::MissingId("click").to_string(), "No id specified for click()");
    }

    #[test]
    fn test_retries_exhausted_message() {
        let attempts = vec![
            Attempt {
                proposal: "hello".to_string(),
                error: ProposalError::NoCodeBlock,
            };
            3
        ];
        let err = ProtocolError::RetriesExhausted {
            last: ProposalError::NoCodeBlock,
            attempts,
        };
        assert!(err.to_string().starts_with("Max retries exceeded after 3 attempts"));
    }
}
