//! AI provider trait

use crate::ai::AIResult;
use async_trait::async_trait;

/// Text generation backend
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Complete text for a fully formed prompt, returning the raw reply
    async fn complete_text(&self, prompt: &str) -> AIResult<String>;
}
