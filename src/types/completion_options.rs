use crate::types::{ChatCompletionRequest, Message};

/// Default model for the `vllm-chat` front end.
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-7B-Instruct";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per-request generation settings, independent of the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Model to generate with.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Cap on generated tokens.
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Create options for `model` with the default temperature and no token cap.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the token cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Snapshot these options and `messages` into a request body.
    pub fn request(&self, messages: &[Message], stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest::new(self.model.clone(), messages.to_vec(), self.temperature)
            .with_stream(stream)
            .with_max_tokens(self.max_tokens)
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}
