// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod completion_options;
pub mod message;
pub mod model_list;
pub mod stream_event;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, Choice, ChoiceMessage};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, Delta};
pub use chat_completion_request::ChatCompletionRequest;
pub use completion_options::{CompletionOptions, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
pub use message::{Message, Role, RoleParseError};
pub use model_list::{ModelInfo, ModelList};
pub use stream_event::StreamEvent;
pub use usage::Usage;
