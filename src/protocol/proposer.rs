//! The seam between the action protocol and whatever produces proposals.

use crate::error::ProposerError;
use crate::protocol::transcript::Message;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Incremental chunks of a proposal
pub type ProposalStream = Pin<Box<dyn Stream<Item = Result<String, ProposerError>> + Send>>;

/// A proposal as delivered by the proposer
pub enum Proposal {
    /// The full text at once
    Text(String),
    /// Text delivered in chunks; only the concatenation is ever validated
    Stream(ProposalStream),
}

impl Proposal {
    /// Build a streaming proposal from already-known chunks
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks: Vec<Result<String, ProposerError>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Proposal::Stream(Box::pin(futures::stream::iter(chunks)))
    }

    /// Buffer the whole proposal
    pub async fn collect(self) -> Result<String, ProposerError> {
        match self {
            Proposal::Text(text) => Ok(text),
            Proposal::Stream(mut stream) => {
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    text.push_str(&chunk?);
                }
                Ok(text)
            }
        }
    }
}

impl std::fmt::Debug for Proposal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proposal::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Proposal::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

impl From<String> for Proposal {
    fn from(text: String) -> Self {
        Proposal::Text(text)
    }
}

impl From<&str> for Proposal {
    fn from(text: &str) -> Self {
        Proposal::Text(text.to_string())
    }
}

/// Produces the next proposal from the conversation so far.
///
/// Implementations receive the full message list for every call, including messages the
/// protocol has not committed to the transcript yet.
#[async_trait]
pub trait ActionProposer: Send + Sync {
    async fn propose(&self, messages: &[Message]) -> Result<Proposal, ProposerError>;
}

#[async_trait]
impl<P: ActionProposer + ?Sized> ActionProposer for std::sync::Arc<P> {
    async fn propose(&self, messages: &[Message]) -> Result<Proposal, ProposerError> {
        (**self).propose(messages).await
    }
}
