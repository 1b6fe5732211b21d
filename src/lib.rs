// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod endpoint;
pub mod error;
pub mod interrupt;
pub mod observability;
pub mod overflow;
pub mod render;
pub mod sse;
pub mod transcript;
pub mod types;

// Re-exports
pub use client::{ChatClient, Completion, EventStream};
pub use client_logger::{ClientLogger, StderrLogger};
pub use endpoint::{models_endpoint, resolve_endpoint};
pub use error::{Error, Result};
pub use interrupt::Interrupt;
pub use observability::register_biometrics;
pub use overflow::OverflowState;
pub use transcript::Transcript;
pub use types::*;
