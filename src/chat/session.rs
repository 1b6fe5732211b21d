//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript
//! of one conversation and drives the client for each user turn.

use std::fmt;

use futures::StreamExt;

use crate::chat::config::ChatConfig;
use crate::client::{ChatClient, Completion};
use crate::error::Result;
use crate::observability::TRANSCRIPT_TRUNCATIONS;
use crate::render::Renderer;
use crate::transcript::Transcript;
use crate::types::{StreamEvent, Usage};

/// A chat session that manages conversation state and API interactions.
///
/// The session is the only owner of its transcript.  Before every request it
/// applies the configured history limit; non-streaming replies are appended
/// to the transcript, streamed replies are not.
pub struct ChatSession {
    client: ChatClient,
    config: ChatConfig,
    transcript: Transcript,
    usage_totals: Usage,
    turns: u64,
    overflow_recoveries: u64,
    truncated_messages: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of messages in the transcript.
    pub message_count: usize,
    /// The history limit, if any.
    pub max_history: Option<usize>,
    /// Whether replies are streamed.
    pub stream: bool,
    /// Sampling temperature.
    pub temperature: f32,
    /// Token cap per reply.
    pub max_tokens: Option<u32>,
    /// Number of turns sent.
    pub turns: u64,
    /// Prompt tokens reported across non-streaming replies.
    pub total_prompt_tokens: u64,
    /// Completion tokens reported across non-streaming replies.
    pub total_completion_tokens: u64,
    /// Turns answered by the retry after a context overflow.
    pub overflow_recoveries: u64,
    /// Messages dropped by the history limit.
    pub truncated_messages: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session Statistics:")?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Messages: {}", self.message_count)?;
        match self.max_history {
            Some(max) => writeln!(f, "  History limit: {max} messages")?,
            None => writeln!(f, "  History limit: (none)")?,
        }
        writeln!(f, "  Streaming: {}", if self.stream { "on" } else { "off" })?;
        writeln!(f, "  Temperature: {:.2}", self.temperature)?;
        match self.max_tokens {
            Some(max) => writeln!(f, "  Max tokens: {max}")?,
            None => writeln!(f, "  Max tokens: (server default)")?,
        }
        writeln!(
            f,
            "  Total tokens: {} in / {} out ({} turns)",
            self.total_prompt_tokens, self.total_completion_tokens, self.turns
        )?;
        writeln!(f, "  Overflow recoveries: {}", self.overflow_recoveries)?;
        write!(f, "  Messages trimmed: {}", self.truncated_messages)
    }
}

impl ChatSession {
    /// Creates a new chat session with the given client and configuration.
    ///
    /// The transcript starts with the configured system prompt, if any.
    pub fn new(client: ChatClient, config: ChatConfig) -> Self {
        let transcript = initial_transcript(&config);
        Self::with_transcript(client, config, transcript)
    }

    /// Creates a chat session that continues an existing transcript.
    pub fn with_transcript(client: ChatClient, config: ChatConfig, transcript: Transcript) -> Self {
        Self {
            client,
            config,
            transcript,
            usage_totals: Usage::default(),
            turns: 0,
            overflow_recoveries: 0,
            truncated_messages: 0,
        }
    }

    /// Sends a user message and waits for the complete reply.
    ///
    /// The reply is appended to the transcript.  When overflow recovery is
    /// enabled and the server reports a context overflow, the transcript is
    /// reduced to this message before the single retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.  The user message stays in the
    /// transcript.
    pub async fn send(&mut self, user_input: &str) -> Result<Completion> {
        self.transcript.push_user(user_input);
        self.exchange().await
    }

    /// Sends the transcript as it stands and waits for the complete reply.
    pub async fn exchange(&mut self) -> Result<Completion> {
        self.apply_history_limit();
        self.turns += 1;
        let completion = if self.config.recover_overflow {
            self.client
                .send_completion(&mut self.transcript, &self.config.options)
                .await?
        } else {
            let completion = self
                .client
                .complete(self.transcript.messages(), &self.config.options)
                .await?;
            self.transcript.push_assistant(completion.content.clone());
            completion
        };
        if let Some(usage) = completion.usage {
            self.usage_totals = self.usage_totals + usage;
        }
        if completion.recovered() {
            self.overflow_recoveries += 1;
        }
        Ok(completion)
    }

    /// Sends a user message and streams the reply into `renderer`.
    ///
    /// Returns the text received.  The reply is not added to the transcript,
    /// so later turns do not see it as context.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        self.transcript.push_user(user_input);
        self.stream_exchange(renderer).await
    }

    /// Streams a reply to the transcript as it stands into `renderer`.
    ///
    /// Stops early, keeping what was received, when the renderer reports an
    /// interrupt.
    pub async fn stream_exchange(&mut self, renderer: &mut dyn Renderer) -> Result<String> {
        self.apply_history_limit();
        self.turns += 1;
        let mut events = self
            .client
            .stream_completion(&self.transcript, &self.config.options)
            .await?;

        let mut reply = String::new();
        while let Some(event) = events.next().await {
            if renderer.should_interrupt() {
                renderer.print_interrupted();
                return Ok(reply);
            }
            match event? {
                StreamEvent::Content(text) => {
                    renderer.print_text(&text);
                    reply.push_str(&text);
                }
                StreamEvent::Done => break,
            }
        }
        renderer.finish_response();
        Ok(reply)
    }

    fn apply_history_limit(&mut self) {
        if let Some(max) = self.config.max_history {
            let dropped = self.transcript.truncate(max);
            if dropped > 0 {
                TRANSCRIPT_TRUNCATIONS.click();
                self.truncated_messages += dropped as u64;
            }
        }
    }

    /// Resets the conversation, keeping only the system prompt.
    pub fn clear(&mut self) {
        self.transcript = initial_transcript(&self.config);
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.transcript.len()
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        self.config.model()
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the client.
    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model().to_string(),
            message_count: self.message_count(),
            max_history: self.config.max_history,
            stream: self.config.stream,
            temperature: self.config.options.temperature,
            max_tokens: self.config.options.max_tokens,
            turns: self.turns,
            total_prompt_tokens: u64::from(self.usage_totals.prompt_tokens),
            total_completion_tokens: u64::from(self.usage_totals.completion_tokens),
            overflow_recoveries: self.overflow_recoveries,
            truncated_messages: self.truncated_messages,
        }
    }
}

fn initial_transcript(config: &ChatConfig) -> Transcript {
    match &config.system_prompt {
        Some(prompt) => Transcript::with_system(prompt.clone()),
        None => Transcript::new(),
    }
}
