//! # page-agent
//!
//! Turns Chrome `DOMSnapshot.captureSnapshot` results into an addressable page model, and turns
//! an LLM's code-shaped answers into validated browser actions.
//!
//! ## Features
//!
//! - **Page model**: rebuilds the node tree from the snapshot's columnar arrays, resolves which
//!   nodes are on screen, and numbers every visible clickable or inputable node
//! - **Outline**: a compact pseudo-HTML listing of those nodes, suitable for a prompt
//! - **Action protocol**: prompts a proposer, extracts the last code block from its answer,
//!   parses it with a small whitelist grammar, validates ids, and retries with feedback
//! - **Browser driver**: a `headless_chrome` session that captures pages and performs actions
//!
//! ## Running the agent
//!
//! ```bash
//! OPENAI_API_KEY=... cargo run --bin page-agent -- \
//!     --objective "find the latest Rust release notes" --url rust-lang.org
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use page_agent::{ActionProtocol, BrowserDriver, BrowserSession, LaunchOptions, Outcome, SnapshotOptions, Transcript};
//! use page_agent::protocol::openai::{OpenAiOptions, OpenAiProposer};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! session.navigate("https://example.com")?;
//!
//! let protocol = ActionProtocol::new(OpenAiProposer::from_env(OpenAiOptions::default())?);
//! let mut transcript = Transcript::new();
//!
//! loop {
//!     let capture = session.capture_snapshot()?;
//!     let model = capture.page_model(&SnapshotOptions::default())?;
//!     let action = protocol
//!         .next_action("open the first link", &mut transcript, &model, None)
//!         .await?;
//!     if page_agent::execute_action(&session, &model, &action)? == Outcome::Complete {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Page model without a browser
//!
//! ```rust
//! use page_agent::{CapturedSnapshot, PageModel, ScreenBounds, SnapshotOptions};
//! use serde_json::json;
//!
//! let snapshot = CapturedSnapshot::from_json(json!({
//!     "documents": [{
//!         "nodes": {
//!             "parentIndex": [-1, 0, 1, 2],
//!             "nodeType": [1, 1, 1, 3],
//!             "nodeName": [0, 1, 2, 3],
//!             "nodeValue": [-1, -1, -1, 4],
//!             "isClickable": { "index": [2] }
//!         },
//!         "layout": {
//!             "nodeIndex": [2, 3],
//!             "bounds": [[10.0, 10.0, 80.0, 20.0], [12.0, 12.0, 40.0, 16.0]]
//!         }
//!     }],
//!     "strings": ["HTML", "BODY", "BUTTON", "#text", "Go"]
//! }))
//! .unwrap();
//!
//! let model = PageModel::from_snapshot(&snapshot, ScreenBounds::new(0.0, 0.0, 800.0, 600.0), 1.0, &SnapshotOptions::default()).unwrap();
//! assert!(model.render_outline().starts_with("<node id=0 clickable=true inputable=false>"));
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: snapshot parsing, visibility, affordance indexing and the outline
//! - [`protocol`]: transcript, prompts, the restricted grammar and the retry loop
//! - [`browser`]: the driver trait, the `headless_chrome` session and action execution
//! - [`error`]: error types and result aliases

pub mod browser;
pub mod dom;
pub mod error;
pub mod protocol;

pub use browser::{BrowserDriver, BrowserSession, Capture, ConnectionOptions, LaunchOptions, Outcome, execute_action};
pub use dom::{
    AffordanceMap, BoundingBox, CapturedSnapshot, DomTree, Node, NodeId, PageModel, Point, ScreenBounds,
    SnapshotOptions,
};
pub use error::{BrowserError, ProposalError, ProposerError, ProtocolError, Result};
pub use protocol::{
    Action, ActionProposer, ActionProtocol, Message, Proposal, ProtocolOptions, Role, ScrollDirection, Transcript,
};
