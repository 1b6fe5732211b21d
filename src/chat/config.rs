//! Configuration types for the chat front ends.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! [`ChatConfig`] shared by both binaries.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::types::{CompletionOptions, DEFAULT_MODEL, Message, Role};

/// Default server address.
pub const DEFAULT_URL: &str = "http://localhost:8000";

/// Request timeout of `vllm-chat`.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

/// Request timeout of `vllm-repl`.
pub const REPL_TIMEOUT: Duration = Duration::from_secs(120);

/// Transcript length kept by `vllm-repl`.
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Token cap used by `vllm-repl`.
pub const REPL_MAX_TOKENS: u32 = 512;

/// Pause between requests in loop mode.
pub const LOOP_INTERVAL: Duration = Duration::from_secs(5);

/// Message sent by loop mode.
pub const LOOP_MESSAGE: &str = "hello, testing inference";

/// Command-line arguments for the vllm-chat tool.
///
/// Positional arguments are `ROLE:CONTENT` messages, used in order when no
/// `--prompt` is given.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Server address; `/v1/chat/completions` is appended.
    #[arrrg(optional, "Server base URL (default: http://localhost:8000)", "URL")]
    pub url: Option<String>,

    /// Model to use for chat.
    #[arrrg(optional, "Model name (default: Qwen/Qwen2.5-7B-Instruct)", "MODEL")]
    pub model: Option<String>,

    /// Single user prompt.
    #[arrrg(optional, "Single prompt message", "TEXT")]
    pub prompt: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Stream the response.
    #[arrrg(flag, "Stream the response")]
    pub stream: bool,

    /// Sampling temperature, parsed when the configuration is resolved.
    #[arrrg(optional, "Temperature (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Maximum tokens to generate", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Interactive chat mode.
    #[arrrg(flag, "Interactive chat mode")]
    pub interactive: bool,

    /// Retry once with the last user message when the context overflows.
    #[arrrg(flag, "Retry once with only the last user message on context overflow")]
    pub recover_overflow: bool,

    /// Send a fixed message every five seconds until interrupted.
    #[arrrg(flag, "Loop mode: send a test message every 5 seconds")]
    pub loop_mode: bool,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log requests and responses to stderr.
    #[arrrg(flag, "Log requests and responses to stderr as JSON lines")]
    pub verbose: bool,
}

/// What a `vllm-chat` invocation does.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChatMode {
    /// Send one request built from the prompt, messages, or stdin.
    OneShot,
    /// Send [`LOOP_MESSAGE`] every [`LOOP_INTERVAL`] until interrupted.
    Loop,
    /// Read prompts from the terminal.
    Interactive,
}

impl ChatArgs {
    /// The mode selected by the flags; loop mode wins over interactive mode.
    pub fn mode(&self) -> ChatMode {
        if self.loop_mode {
            ChatMode::Loop
        } else if self.interactive {
            ChatMode::Interactive
        } else {
            ChatMode::OneShot
        }
    }

    /// The server address to use.
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_URL)
    }
}

/// Command-line arguments for the vllm-repl tool.
///
/// The single positional argument is the server address.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ReplArgs {
    /// Model to use instead of the first one the server lists.
    #[arrrg(optional, "Model name (default: discovered from /v1/models)", "MODEL")]
    pub model: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt kept across history trimming", "PROMPT")]
    pub system: Option<String>,

    /// Number of messages kept in the transcript.
    #[arrrg(optional, "Messages of history to keep (default: 20)", "COUNT")]
    pub max_history: Option<usize>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Maximum tokens to generate (default: 512)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature, parsed when the configuration is resolved.
    #[arrrg(optional, "Temperature (default: 0.7)", "TEMP")]
    pub temperature: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 120)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Log requests and responses to stderr.
    #[arrrg(flag, "Log requests and responses to stderr as JSON lines")]
    pub verbose: bool,
}

impl ReplArgs {
    /// Resolve the arguments into a configuration for `model`.
    pub fn into_config(self, model: impl Into<String>) -> Result<ChatConfig> {
        let options = CompletionOptions::new(model)
            .with_max_tokens(Some(self.max_tokens.unwrap_or(REPL_MAX_TOKENS)));
        let options = match parse_temperature(self.temperature.as_deref())? {
            Some(temperature) => options.with_temperature(temperature),
            None => options,
        };
        Ok(ChatConfig {
            options,
            system_prompt: self.system,
            stream: false,
            max_history: Some(self.max_history.unwrap_or(DEFAULT_MAX_HISTORY)),
            recover_overflow: true,
            use_color: !self.no_color,
            timeout: self
                .timeout
                .map(Duration::from_secs)
                .unwrap_or(REPL_TIMEOUT),
        })
    }
}

fn parse_temperature(value: Option<&str>) -> Result<Option<f32>> {
    value
        .map(|value| {
            value.trim().parse::<f32>().map_err(|_| {
                Error::config(
                    format!("temperature must be a number, got {value:?}"),
                    Some("temperature".to_string()),
                )
            })
        })
        .transpose()
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Model, temperature and token cap sent with every request.
    pub options: CompletionOptions,

    /// Optional system prompt placed first in the transcript.
    pub system_prompt: Option<String>,

    /// Whether replies are streamed.
    pub stream: bool,

    /// Message-count limit applied before each send; `None` keeps everything.
    pub max_history: Option<usize>,

    /// Whether a context-length overflow triggers the single retry with the
    /// last user message.
    pub recover_overflow: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Request timeout.
    pub timeout: Duration,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: Qwen/Qwen2.5-7B-Instruct, temperature 0.7, no token cap
    /// - Streaming: off
    /// - History limit: none
    /// - Overflow recovery: on
    /// - Color: enabled
    /// - Timeout: 60 seconds
    pub fn new() -> Self {
        Self {
            options: CompletionOptions::default(),
            system_prompt: None,
            stream: false,
            max_history: None,
            recover_overflow: true,
            use_color: true,
            timeout: CHAT_TIMEOUT,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.options.model = model.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.options.max_tokens = max_tokens;
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Sets the history limit.
    pub fn with_max_history(mut self, max_history: Option<usize>) -> Self {
        self.max_history = max_history;
        self
    }

    /// Sets whether overflow recovery is active.
    pub fn with_overflow_recovery(mut self, enabled: bool) -> Self {
        self.recover_overflow = enabled;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The model name.
    pub fn model(&self) -> &str {
        &self.options.model
    }

    /// Check the values a server would reject or that break the session.
    pub fn validate(&self) -> Result<()> {
        if self.options.model.trim().is_empty() {
            return Err(Error::config(
                "model name is empty",
                Some("model".to_string()),
            ));
        }
        let temperature = self.options.temperature;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(Error::config(
                format!("temperature must be a non-negative number, got {temperature}"),
                Some("temperature".to_string()),
            ));
        }
        if self.options.max_tokens == Some(0) {
            return Err(Error::config(
                "max tokens must be at least 1",
                Some("max-tokens".to_string()),
            ));
        }
        if let Some(max) = self.max_history
            && max < 2
        {
            return Err(Error::config(
                format!("history limit must be at least 2 messages, got {max}"),
                Some("max-history".to_string()),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::config(
                "timeout must be at least one second",
                Some("timeout".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: &ChatArgs) -> Result<Self> {
        let mut config = ChatConfig::new()
            .with_model(args.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .with_max_tokens(args.max_tokens)
            .with_stream(args.stream)
            .with_overflow_recovery(args.recover_overflow);
        if let Some(temperature) = parse_temperature(args.temperature.as_deref())? {
            config = config.with_temperature(temperature);
        }
        if let Some(system) = &args.system {
            config = config.with_system_prompt(system.clone());
        }
        if let Some(timeout) = args.timeout {
            config = config.with_timeout(Duration::from_secs(timeout));
        }
        if args.no_color {
            config = config.without_color();
        }
        Ok(config)
    }
}

/// Parse a `ROLE:CONTENT` command-line message.
///
/// ```
/// # use vllm_chat::chat::parse_message_arg;
/// # use vllm_chat::Role;
/// let message = parse_message_arg("system:You are terse.").unwrap();
/// assert_eq!(message.role, Role::System);
/// assert_eq!(message.content, "You are terse.");
/// ```
pub fn parse_message_arg(arg: &str) -> Result<Message> {
    let Some((role, content)) = arg.split_once(':') else {
        return Err(Error::config(
            format!("message {arg:?} is not of the form ROLE:CONTENT"),
            Some("message".to_string()),
        ));
    };
    let role: Role = role
        .parse()
        .map_err(|e| Error::config(format!("{e}"), Some("message".to_string())))?;
    Ok(Message::new(role, content))
}
