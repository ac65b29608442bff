pub mod anthropic;
pub mod backend;
pub mod failover;
pub mod openai;
pub mod parse;
pub mod service;

pub use backend::{ChatBackend, ChatRequest};
pub use service::LlmAnalyzer;
