//! The ordered conversation context sent with every request.

use crate::types::{Message, Role};

/// Ordered, owned list of messages supplied as conversational context.
///
/// A transcript only grows during a turn.  It shrinks in two places:
/// [`Transcript::truncate`], which runs before each send when a message-count
/// limit is configured, and [`Transcript::retain_last_user`], which the
/// overflow recovery uses when the server reports that the prompt no longer
/// fits the model's context window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript that starts with a system message.
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// The messages, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if there are no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The most recent user message.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// Keep at most `max` messages, newest first.
    ///
    /// When the transcript opens with a system message and `max >= 2`, that
    /// message survives at index 0 and the most recent `max - 1` others fill
    /// the rest.  Returns the number of messages dropped; a transcript that
    /// already fits is left untouched.
    pub fn truncate(&mut self, max: usize) -> usize {
        let len = self.messages.len();
        if len <= max {
            return 0;
        }
        let keep_system = max >= 2 && self.messages[0].role == Role::System;
        if keep_system {
            let tail = self.messages.split_off(len - (max - 1));
            self.messages.truncate(1);
            self.messages.extend(tail);
        } else {
            self.messages.drain(..len - max);
        }
        len - self.messages.len()
    }

    /// Drop everything except the most recent user message.
    ///
    /// Older context is lost for good.  Returns false, leaving the transcript
    /// unchanged, when there is no user message to keep.
    pub fn retain_last_user(&mut self) -> bool {
        let Some(last) = self.last_user().cloned() else {
            return false;
        };
        self.messages = vec![last];
        true
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl IntoIterator for Transcript {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(turns: usize) -> Transcript {
        let mut transcript = Transcript::new();
        for i in 0..turns {
            transcript.push_user(format!("question {i}"));
            transcript.push_assistant(format!("answer {i}"));
        }
        transcript
    }

    #[test]
    fn truncate_noop_within_limit() {
        let mut transcript = conversation(2);
        assert_eq!(transcript.truncate(4), 0);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.truncate(20), 0);
        assert_eq!(transcript, conversation(2));
    }

    #[test]
    fn truncate_keeps_most_recent() {
        let mut transcript = conversation(3);
        assert_eq!(transcript.truncate(3), 3);
        assert_eq!(
            transcript.messages(),
            &[
                Message::assistant("answer 1"),
                Message::user("question 2"),
                Message::assistant("answer 2"),
            ]
        );
    }

    #[test]
    fn truncate_preserves_system_prompt() {
        let mut transcript = Transcript::with_system("be brief");
        for i in 0..15 {
            transcript.push_user(format!("question {i}"));
            transcript.push_assistant(format!("answer {i}"));
        }
        transcript.push_user("question 15");
        assert_eq!(transcript.len(), 32);

        transcript.truncate(20);
        assert_eq!(transcript.len(), 20);
        assert_eq!(transcript.messages()[0], Message::system("be brief"));
        assert_eq!(transcript.messages()[1], Message::user("question 6"));
        assert_eq!(transcript.messages()[19], Message::user("question 15"));
    }

    #[test]
    fn truncate_is_idempotent() {
        for max in 1..8 {
            let mut with_system = Transcript::with_system("s");
            with_system.push_user("a");
            with_system.push_assistant("b");
            with_system.push_user("c");
            with_system.push_assistant("d");
            with_system.push_user("e");
            for mut transcript in [with_system, conversation(5)] {
                transcript.truncate(max);
                let once = transcript.clone();
                assert_eq!(transcript.truncate(max), 0);
                assert_eq!(transcript, once);
                assert!(transcript.len() <= max);
            }
        }
    }

    #[test]
    fn truncate_system_invariant_holds_for_small_limits() {
        let mut transcript = Transcript::with_system("s");
        transcript.push_user("a");
        transcript.push_assistant("b");
        transcript.truncate(2);
        assert_eq!(
            transcript.messages(),
            &[Message::system("s"), Message::assistant("b")]
        );

        let mut transcript = Transcript::with_system("s");
        transcript.push_user("a");
        transcript.truncate(1);
        assert_eq!(transcript.messages(), &[Message::user("a")]);
    }

    #[test]
    fn retain_last_user() {
        let mut transcript = Transcript::with_system("s");
        transcript.push_user("old");
        transcript.push_assistant("reply");
        transcript.push_user("new");
        assert!(transcript.retain_last_user());
        assert_eq!(transcript.messages(), &[Message::user("new")]);
    }

    #[test]
    fn retain_last_user_without_user_message() {
        let mut transcript = Transcript::with_system("s");
        assert!(!transcript.retain_last_user());
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn last_user_skips_assistant() {
        let mut transcript = conversation(2);
        assert_eq!(transcript.last_user(), Some(&Message::user("question 1")));
        transcript.clear();
        assert!(transcript.is_empty());
        assert!(transcript.last_user().is_none());
    }
}
