//! Upstream model completion API: types, provider trait, and implementations.

mod error;
mod openai;
mod provider;
mod registry;
mod types;

pub use error::LlmError;
pub use openai::OpenAiProvider;
pub use provider::ModelProvider;
pub use registry::{ModelRegistry, ResolvedModel};
pub use types::{
    ChatRequest, ChatResponse, Choice, FunctionCall, FunctionDefinition, Message, ModelStream,
    Role, StreamEvent, ToolCall, ToolDefinition,
};
