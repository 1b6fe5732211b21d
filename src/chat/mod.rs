//! Chat front-end support shared by the `vllm-chat` and `vllm-repl` binaries.
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: transcript ownership and per-turn request handling
//! - [`commands`]: REPL command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    CHAT_TIMEOUT, ChatArgs, ChatConfig, ChatMode, DEFAULT_MAX_HISTORY, DEFAULT_URL,
    LOOP_INTERVAL, LOOP_MESSAGE, REPL_MAX_TOKENS, REPL_TIMEOUT, ReplArgs, parse_message_arg,
};
pub use session::{ChatSession, SessionStats};
