use serde::{Deserialize, Serialize};

use crate::types::{Role, Usage};

/// A complete (non-streaming) chat completion response.
///
/// Only `choices[0].message.content` is required by the client; the other
/// fields are kept when the server sends them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    /// Server-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Model that produced the completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Generated alternatives; the client reads the first.
    pub choices: Vec<Choice>,

    /// Token accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// One alternative of a [`ChatCompletion`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Position of the choice.
    #[serde(default)]
    pub index: u32,

    /// The generated message.
    pub message: ChoiceMessage,

    /// Why generation stopped, e.g. `stop` or `length`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a [`Choice`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceMessage {
    /// Usually `assistant`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Generated text; servers send `null` when there is none.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice, if the server produced one.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialization_minimal() {
        let json = r#"{"choices":[{"message":{"content":"Hello"}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(completion.content(), Some("Hello"));
        assert!(completion.usage.is_none());
    }

    #[test]
    fn deserialization_vllm() {
        let json = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "Qwen/Qwen2.5-7B-Instruct",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        });
        let completion: ChatCompletion = serde_json::from_value(json).unwrap();
        assert_eq!(completion.content(), Some("Hi there"));
        assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, 13);
    }

    #[test]
    fn empty_choices_have_no_content() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(completion.content(), None);

        let completion: ChatCompletion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(completion.content(), None);
    }
}
