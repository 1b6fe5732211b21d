/// A decoded unit of a streamed chat completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of the assistant's reply.
    Content(String),

    /// The server sent the `[DONE]` sentinel; nothing follows.
    Done,
}

impl StreamEvent {
    /// The text fragment, if this is a content event.
    pub fn content(&self) -> Option<&str> {
        match self {
            StreamEvent::Content(text) => Some(text),
            StreamEvent::Done => None,
        }
    }

    /// Returns true for the terminal sentinel.
    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}
