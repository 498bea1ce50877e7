use async_trait::async_trait;

/// A model-serving backend that turns an instruction plus a message into text.
///
/// Implementations own transport, authentication and response parsing.
/// Agents never see anything but the final text.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// One-shot generation with a system instruction.
    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<String>;
}
