//! Model-serving providers.
//!
//! The pipeline only depends on the [`Provider`] trait; [`GeminiProvider`]
//! is the production backend.

pub mod gemini;
pub mod traits;

pub use gemini::GeminiProvider;
pub use traits::Provider;

use crate::config::ModelConfig;
use std::sync::Arc;

/// Build the configured provider.
pub fn create_provider(config: &ModelConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
        anyhow::bail!(
            "No Gemini API key configured: set GEMINI_API_KEY (or GOOGLE_API_KEY), \
             or model.api_key in config.toml"
        );
    };
    Ok(Arc::new(GeminiProvider::new(
        key.to_string(),
        config.api_url.clone(),
        std::time::Duration::from_secs(config.timeout_secs),
    )))
}

/// Stand-in used when the server starts without credentials.
///
/// Every call fails with the reason the real provider could not be built,
/// so the gateway stays up and pipeline routes report a server error.
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn chat_with_system(
        &self,
        _system_prompt: Option<&str>,
        _message: &str,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        anyhow::bail!("Model provider unavailable: {}", self.reason)
    }
}

/// Scrub credentials from an upstream error before it reaches logs.
///
/// Handles `key=...` query parameters and bare Google API keys (`AIza...`).
pub fn sanitize_api_error(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for (i, token) in message.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&sanitize_token(token));
    }
    crate::util::truncate_with_ellipsis(&out, 500)
}

fn sanitize_token(token: &str) -> String {
    if let Some(idx) = token.find("key=") {
        let value_start = idx + 4;
        let value_end = token[value_start..]
            .find(['&', '"', '\'', ')'])
            .map_or(token.len(), |end| value_start + end);
        return format!("{}[REDACTED]{}", &token[..value_start], &token[value_end..]);
    }
    if let Some(idx) = token.find("AIza") {
        return format!("{}[REDACTED]", &token[..idx]);
    }
    token.to_string()
}
