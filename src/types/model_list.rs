use serde::{Deserialize, Serialize};

/// Response of `GET /v1/models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Models served by the endpoint, in server order.
    pub data: Vec<ModelInfo>,
}

/// One entry of a [`ModelList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier to pass as `model` in completion requests.
    pub id: String,

    /// Owner reported by the server (vLLM says `vllm`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,

    /// Context window of the deployment, when vLLM reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_model_len: Option<u32>,
}

impl ModelList {
    /// Identifier of the first listed model.
    pub fn first_id(&self) -> Option<&str> {
        self.data.first().map(|model| model.id.as_str())
    }
}
