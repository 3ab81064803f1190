//! [`ActionProposer`] backed by an OpenAI-compatible chat completions endpoint.

use crate::error::ProposerError;
use crate::protocol::proposer::{ActionProposer, Proposal};
use crate::protocol::transcript::{Message, Role};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Text placed before a screenshot in vision requests
const IMAGE_PREAMBLE: &str = "This is an image of the browser.";

/// Request settings for [`OpenAiProposer`]
#[derive(Debug, Clone)]
pub struct OpenAiOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_url: String,
    /// Environment variable read by [`OpenAiProposer::from_env`]
    pub api_key_env: String,
}

impl Default for OpenAiOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 500,
            api_url: DEFAULT_API_URL.to_string(),
            api_key_env: API_KEY_ENV.to_string(),
        }
    }
}

impl OpenAiOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Builder method: point at another OpenAI-compatible server
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = name.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

fn convert_message(message: &Message) -> ApiMessage<'_> {
    let content = match &message.image_url {
        Some(url) => MessageContent::Parts(vec![
            ContentPart::Text { text: IMAGE_PREAMBLE },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
            ContentPart::Text {
                text: &message.content,
            },
        ]),
        None => MessageContent::Text(&message.content),
    };
    ApiMessage {
        role: message.role,
        content,
    }
}

/// Splits a server-sent event byte stream into content deltas
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, ProposerError>> {
        self.buffer.extend_from_slice(bytes);
        let mut deltas = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim_end().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                self.done = true;
                continue;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => deltas.extend(
                    chunk
                        .choices
                        .into_iter()
                        .filter_map(|choice| choice.delta.content)
                        .filter(|content| !content.is_empty())
                        .map(Ok),
                ),
                Err(e) => deltas.push(Err(ProposerError::Stream(format!("Invalid stream chunk: {}", e)))),
            }
        }

        deltas
    }
}

/// Streams proposals from an OpenAI-compatible API
pub struct OpenAiProposer {
    api_key: String,
    options: OpenAiOptions,
    client: reqwest::Client,
}

impl OpenAiProposer {
    pub fn new(api_key: impl Into<String>, options: OpenAiOptions) -> Self {
        Self {
            api_key: api_key.into(),
            options,
            client: reqwest::Client::new(),
        }
    }

    /// Read the API key from the environment variable named in `options`
    pub fn from_env(options: OpenAiOptions) -> Result<Self, ProposerError> {
        let api_key = std::env::var(&options.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProposerError::MissingApiKey(options.api_key_env.clone()))?;
        Ok(Self::new(api_key, options))
    }

    pub fn options(&self) -> &OpenAiOptions {
        &self.options
    }

    fn build_request<'a>(&'a self, messages: &'a [Message]) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.options.model,
            messages: messages.iter().map(convert_message).collect(),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl ActionProposer for OpenAiProposer {
    async fn propose(&self, messages: &[Message]) -> Result<Proposal, ProposerError> {
        let request = self.build_request(messages);
        log::debug!("Sending {} messages to {}", messages.len(), self.options.model);

        let response = self
            .client
            .post(&self.options.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProposerError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProposerError::Api { status, message });
        }

        let stream = response
            .bytes_stream()
            .scan(SseDecoder::default(), |decoder, result| {
                let deltas = match result {
                    Ok(bytes) => decoder.push(&bytes),
                    Err(e) => vec![Err(ProposerError::Stream(e.to_string()))],
                };
                futures::future::ready(Some(futures::stream::iter(deltas)))
            })
            .flatten();

        Ok(Proposal::Stream(Box::pin(stream)))
    }
}
