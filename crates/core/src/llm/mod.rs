pub mod error;
pub mod gemini;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Canned,
}

/// Free-text generation capability. Everything that talks to a hosted model goes through this
/// seam so the feature modules can be exercised against canned responses.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}
