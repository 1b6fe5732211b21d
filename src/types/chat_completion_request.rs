use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Body of a `POST /v1/chat/completions` request.
///
/// A request is a snapshot: it is built fresh for every call from the
/// transcript and the [`CompletionOptions`](crate::types::CompletionOptions)
/// and is not touched after it has been sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Model to generate with.
    pub model: String,

    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Whether the server should answer with an event stream.
    pub stream: bool,

    /// Cap on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    /// Create a new non-streaming request.
    pub fn new(model: impl Into<String>, messages: Vec<Message>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            stream: false,
            max_tokens: None,
        }
    }

    /// Set the stream flag.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the token cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
