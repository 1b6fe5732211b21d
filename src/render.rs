//! Output rendering for chat replies.
//!
//! This module provides the renderer trait used by the chat session and a
//! plain-text implementation with optional ANSI styling.

use std::io::{self, Stdout, Write};
use std::sync::Arc;

use crate::interrupt::Interrupt;

/// ANSI escape code for dim text (used for informational messages).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for the speaker label).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for interruptions).
const ANSI_YELLOW: &str = "\x1b[33m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Called before the first fragment of a reply.
    fn start_response(&mut self, label: &str) {
        _ = label;
    }

    /// Print a chunk of regular response text.
    ///
    /// This is called incrementally as fragments are streamed from the server.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Replies go to stdout, errors to stderr.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    line_start: bool,
    interrupted: Option<Arc<Interrupt>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt signal to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<Interrupt>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Returns true if ANSI styling is enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        print!("{text}");
        self.line_start = text.ends_with('\n');
        self.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self, label: &str) {
        let label = self.styled(ANSI_BOLD, &format!("{label}: "));
        self.write(&label);
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn print_error(&mut self, error: &str) {
        if !self.line_start {
            self.write("\n");
        }
        eprintln!("{}", self.styled(ANSI_RED, &format!("Error: {error}")));
    }

    fn print_info(&mut self, info: &str) {
        if !self.line_start {
            self.write("\n");
        }
        let info = self.styled(ANSI_DIM, info);
        self.write(&format!("{info}\n"));
    }

    fn finish_response(&mut self) {
        self.write("\n");
    }

    fn print_interrupted(&mut self) {
        let message = self.styled(ANSI_YELLOW, "[interrupted]");
        self.write(&format!("\n{message}\n"));
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|interrupt| interrupt.is_triggered())
    }
}
