//! Action selection protocol
//!
//! Turns the proposer's free-form answers into one validated [`Action`] per step:
//! - prompt: system and user messages shown to the proposer
//! - grammar: code block extraction and the restricted call grammar
//! - proposer: the [`ActionProposer`] seam, with plain and streamed proposals
//! - transcript: the append-only conversation owned by the caller
//! - openai: an OpenAI-compatible proposer (requires the `openai` feature)

pub mod action;
pub mod grammar;
#[cfg(feature = "openai")]
pub mod openai;
pub mod prompt;
pub mod proposer;
pub mod transcript;

pub use action::{Action, ScrollDirection};
pub use grammar::{Call, Function, Value};
pub use proposer::{ActionProposer, Proposal, ProposalStream};
pub use transcript::{Message, Role, Transcript};

use crate::dom::PageModel;
use crate::error::{Attempt, ProposalError, ProposerError, ProtocolError};
use prompt::Stage;
use tokio_util::sync::CancellationToken;

/// Rejected proposals tolerated per step before giving up
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Options for the action protocol
#[derive(Debug, Clone)]
pub struct ProtocolOptions {
    /// Number of proposals requested before the step fails. Zero behaves like one.
    pub max_retries: usize,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ProtocolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the retry budget
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

enum State {
    BuildPrompt,
    AwaitProposal,
    Parse(String),
    Validate {
        proposal: String,
        code: String,
        call: Option<Call>,
    },
    AppendFeedback {
        proposal: String,
        error: ProposalError,
        trace: String,
    },
}

/// Obtains one validated action per page from an [`ActionProposer`]
pub struct ActionProtocol<P> {
    proposer: P,
    options: ProtocolOptions,
    cancel: CancellationToken,
}

impl<P: ActionProposer> ActionProtocol<P> {
    pub fn new(proposer: P) -> Self {
        Self {
            proposer,
            options: ProtocolOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Builder method: replace the options
    pub fn with_options(mut self, options: ProtocolOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder method: abandon in-flight proposals when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn proposer(&self) -> &P {
        &self.proposer
    }

    pub fn options(&self) -> &ProtocolOptions {
        &self.options
    }

    /// Ask the proposer for the next action on `model`.
    ///
    /// Messages are appended to `transcript` only once a proposal has been received, so a
    /// cancelled request leaves it untouched. The system message is added when the transcript
    /// is empty. `screenshot` is attached to the user message as an image URL.
    pub async fn next_action(
        &self,
        objective: &str,
        transcript: &mut Transcript,
        model: &PageModel,
        screenshot: Option<&str>,
    ) -> Result<Action, ProtocolError> {
        let max_attempts = self.options.max_retries.max(1);
        let mut pending = Vec::new();
        let mut attempts: Vec<Attempt> = Vec::new();
        let mut state = State::BuildPrompt;

        loop {
            state = match state {
                State::BuildPrompt => {
                    if transcript.is_empty() {
                        pending.push(prompt::system_message(objective));
                    }
                    pending.push(prompt::user_message(&model.render_outline(), screenshot));
                    State::AwaitProposal
                }
                State::AwaitProposal => {
                    let messages = transcript.with_pending(&pending);
                    log::debug!(
                        "Requesting proposal (attempt {}/{}, {} messages)",
                        attempts.len() + 1,
                        max_attempts,
                        messages.len()
                    );

                    let proposal = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(ProtocolError::Cancelled),
                        result = self.fetch(&messages) => result?,
                    };

                    transcript.extend(pending.drain(..));
                    transcript.push(Message::assistant(proposal.clone()));
                    State::Parse(proposal)
                }
                State::Parse(proposal) => match grammar::extract_code_block(&proposal).map(str::to_string) {
                    None => {
                        let error = ProposalError::NoCodeBlock;
                        State::AppendFeedback {
                            trace: prompt::error_trace(Stage::Extract, None, &error),
                            error,
                            proposal,
                        }
                    }
                    Some(code) => match grammar::parse_call(&code) {
                        Ok(call) => State::Validate { proposal, code, call },
                        Err(error) => State::AppendFeedback {
                            trace: prompt::error_trace(Stage::Parse, Some(code.as_str()), &error),
                            error,
                            proposal,
                        },
                    },
                },
                State::Validate { proposal, code, call } => match grammar::validate(call, model) {
                    Ok(action) => {
                        log::info!("Accepted action: {}", action);
                        return Ok(action);
                    }
                    Err(error) => State::AppendFeedback {
                        trace: prompt::error_trace(Stage::Validate, Some(code.as_str()), &error),
                        error,
                        proposal,
                    },
                },
                State::AppendFeedback { proposal, error, trace } => {
                    transcript.push(prompt::feedback_message(&error, &trace));
                    attempts.push(Attempt {
                        proposal,
                        error: error.clone(),
                    });

                    if attempts.len() >= max_attempts {
                        log::warn!("Giving up after {} rejected proposals: {}", attempts.len(), error);
                        return Err(ProtocolError::RetriesExhausted { last: error, attempts });
                    }

                    log::warn!(
                        "Rejected proposal ({}/{}), retrying: {}",
                        attempts.len(),
                        max_attempts,
                        error
                    );
                    State::AwaitProposal
                }
            };
        }
    }

    async fn fetch(&self, messages: &[Message]) -> Result<String, ProposerError> {
        self.proposer.propose(messages).await?.collect().await
    }
}
