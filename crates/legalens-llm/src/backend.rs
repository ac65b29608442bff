use anyhow::Result;
use async_trait::async_trait;

/// One chat-completion request. Every analysis stage supplies its own
/// system message, temperature and token budget.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A chat-model provider. Implementations return the raw completion text;
/// transport errors (unreachable host, non-2xx, unparsable envelope) are
/// real errors so a failover chain can try the next provider.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Provider name for logging ("groq", "openai", "anthropic").
    fn name(&self) -> &str;

    async fn generate(&self, request: &ChatRequest) -> Result<String>;
}
