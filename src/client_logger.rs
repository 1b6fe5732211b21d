//! Logging trait for chat client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all API interactions passing through the [`ChatClient`], and
//! [`StderrLogger`], which writes them to standard error as JSON lines.
//!
//! [`ChatClient`]: crate::ChatClient

use std::io::{self, Write};

use serde_json::json;

use crate::overflow::OverflowState;
use crate::types::{ChatCompletion, ChatCompletionRequest, StreamEvent};

/// A trait for logging chat client operations.
///
/// # Example
///
/// ```rust,ignore
/// use vllm_chat::{ChatCompletion, ChatCompletionRequest, ClientLogger, StreamEvent};
///
/// struct CountingLogger(std::sync::atomic::AtomicUsize);
///
/// impl ClientLogger for CountingLogger {
///     fn log_request(&self, _: &ChatCompletionRequest) {
///         self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
///     }
///     fn log_response(&self, _: &ChatCompletion) {}
///     fn log_stream_event(&self, _: &StreamEvent) {}
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request body just before it is sent.
    fn log_request(&self, request: &ChatCompletionRequest);

    /// Log a complete response from a non-streaming call.
    fn log_response(&self, response: &ChatCompletion);

    /// Log an individual streaming event.
    fn log_stream_event(&self, event: &StreamEvent);

    /// Log a transition of the overflow recovery policy.
    fn log_overflow(&self, state: OverflowState, message: &str) {
        _ = state;
        _ = message;
    }
}

/// Writes one compact JSON object per operation to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl StderrLogger {
    /// Creates a new stderr logger.
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, record: serde_json::Value) {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{record}");
    }
}

fn request_record(request: &ChatCompletionRequest) -> serde_json::Value {
    json!({
        "event": "request",
        "model": request.model,
        "messages": request.messages.len(),
        "stream": request.stream,
        "temperature": shortest_f64(request.temperature),
        "max_tokens": request.max_tokens,
    })
}

/// Widens `value` through its shortest decimal form, the same digits the
/// request body carries, so 0.7 logs as 0.7 rather than 0.699999988079071.
fn shortest_f64(value: f32) -> f64 {
    value
        .to_string()
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(value))
}

impl ClientLogger for StderrLogger {
    fn log_request(&self, request: &ChatCompletionRequest) {
        self.emit(request_record(request));
    }

    fn log_response(&self, response: &ChatCompletion) {
        self.emit(json!({
            "event": "response",
            "id": response.id,
            "choices": response.choices.len(),
            "usage": response.usage,
        }));
    }

    fn log_stream_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Content(text) => self.emit(json!({
                "event": "stream_content",
                "bytes": text.len(),
            })),
            StreamEvent::Done => self.emit(json!({"event": "stream_done"})),
        }
    }

    fn log_overflow(&self, state: OverflowState, message: &str) {
        self.emit(json!({
            "event": "overflow",
            "state": state.to_string(),
            "message": message,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    struct Silent;

    impl ClientLogger for Silent {
        fn log_request(&self, _: &ChatCompletionRequest) {}
        fn log_response(&self, _: &ChatCompletion) {}
        fn log_stream_event(&self, _: &StreamEvent) {}
    }

    #[test]
    fn overflow_logging_defaults_to_noop() {
        Silent.log_overflow(OverflowState::Overflowed, "maximum context length");
    }

    #[test]
    fn request_record_matches_wire_temperature() {
        let request = ChatCompletionRequest::new("m1", vec![Message::user("hi")], 0.7);
        let record = request_record(&request);
        assert_eq!(record["temperature"], json!(0.7));
        assert_eq!(record["messages"], json!(1));

        let wire: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&request).unwrap()).unwrap();
        assert_eq!(record["temperature"], wire["temperature"]);
    }

    #[test]
    fn stderr_logger_accepts_every_record() {
        let logger = StderrLogger::new();
        let request = ChatCompletionRequest::new("m1", vec![Message::user("hi")], 0.7);
        logger.log_request(&request);
        logger.log_stream_event(&StreamEvent::Content("hi".to_string()));
        logger.log_stream_event(&StreamEvent::Done);
        logger.log_overflow(OverflowState::Fatal, "reduce the length");
    }
}
