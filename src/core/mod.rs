pub mod llm;

pub use llm::{ChatMessage, ChatResponder, Completion, LlmClient};
