use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::backend::{ChatBackend, ChatRequest};

/// Ordered provider chain: the first backend is preferred, the rest are
/// fallbacks tried in order when a provider fails at the transport level.
/// The orchestrator only ever sees success-with-text or the final failure.
pub struct FailoverChat {
    backends: Vec<Arc<dyn ChatBackend>>,
}

impl FailoverChat {
    pub fn new(backends: Vec<Arc<dyn ChatBackend>>) -> Self {
        Self { backends }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait]
impl ChatBackend for FailoverChat {
    fn name(&self) -> &str {
        "failover"
    }

    async fn generate(&self, request: &ChatRequest) -> Result<String> {
        let mut last_error = anyhow!("no chat backends configured");

        for (i, backend) in self.backends.iter().enumerate() {
            match backend.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if i + 1 < self.backends.len() {
                        warn!(provider = backend.name(), "chat backend failed, trying fallback: {e:#}");
                        info!(provider = self.backends[i + 1].name(), "falling back to next provider");
                    } else {
                        warn!(provider = backend.name(), "chat backend failed: {e:#}");
                    }
                    last_error = e;
                }
            }
        }

        Err(last_error.context("all chat backends failed"))
    }
}
