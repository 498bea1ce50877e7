//! Leaf agent bound to a model instruction.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::error::{AgentError, AgentResult};
use super::traits::{Agent, Content, Event, InvocationContext};
use crate::providers::{self, Provider};

/// A natural-language instruction executed by a [`Provider`].
///
/// The instruction is sent as the system prompt. The user message carries
/// the original prompt followed by every prior event in context order.
pub struct LlmAgent {
    name: String,
    description: String,
    instruction: String,
    model: String,
    temperature: f64,
    provider: Arc<dyn Provider>,
}

impl LlmAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instruction: impl Into<String>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instruction: instruction.into(),
            model: model.into(),
            temperature: 0.2,
            provider,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Build the user message for this agent.
    fn build_message(ctx: &InvocationContext) -> String {
        let mut msg = String::from("## User Input\n");
        msg.push_str(&ctx.user_content.text());

        let prior: Vec<&Event> = ctx.events.iter().filter(|e| e.author != "user").collect();
        if !prior.is_empty() {
            msg.push_str("\n\n## Prior Agent Outputs\n");
            for event in prior {
                msg.push_str(&format!("\n### [{}]\n{}\n", event.author, event.text()));
            }
        }
        msg
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &InvocationContext) -> AgentResult<Vec<Event>> {
        let start = Instant::now();
        let message = Self::build_message(ctx);

        tracing::debug!(
            agent = %self.name,
            invocation_id = %ctx.invocation_id,
            model = %self.model,
            prior_events = ctx.events.len(),
            "Running agent"
        );

        let text = self
            .provider
            .chat_with_system(Some(&self.instruction), &message, &self.model, self.temperature)
            .await
            .map_err(|source| {
                tracing::warn!(
                    agent = %self.name,
                    invocation_id = %ctx.invocation_id,
                    error = %providers::sanitize_api_error(&source.to_string()),
                    "Agent model call failed"
                );
                AgentError::Failed {
                    agent: self.name.clone(),
                    source,
                }
            })?;

        if text.trim().is_empty() {
            return Err(AgentError::EmptyOutput {
                agent: self.name.clone(),
            });
        }

        tracing::info!(
            agent = %self.name,
            invocation_id = %ctx.invocation_id,
            duration_ms = start.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
            output_chars = text.chars().count(),
            "Agent completed"
        );

        Ok(vec![Event::new(
            &ctx.invocation_id,
            &self.name,
            Content::model(text),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;

    fn agent(provider: Arc<dyn Provider>) -> LlmAgent {
        LlmAgent::new(
            "EthicsAgent",
            "Ethics review",
            "You are an expert in AI ethics.",
            provider,
            "gemini-2.5-flash",
        )
    }

    #[test]
    fn message_without_prior_events_has_only_input() {
        let ctx = InvocationContext::new(Content::user("Summarize this article"));
        let msg = LlmAgent::build_message(&ctx);
        assert!(msg.contains("Summarize this article"));
        assert!(!msg.contains("Prior Agent Outputs"));
    }

    #[test]
    fn message_includes_prior_events_in_order() {
        let ctx = InvocationContext::new(Content::user("prompt"));
        let id = ctx.invocation_id.clone();
        let ctx = ctx.with_events(&[
            Event::new(&id, "user", Content::user("prompt")),
            Event::new(&id, "EthicsAgent", Content::model("ethics finding")),
            Event::new(&id, "BiasDetectionAgent", Content::model("bias finding")),
        ]);
        let msg = LlmAgent::build_message(&ctx);
        let ethics = msg.find("[EthicsAgent]").unwrap();
        let bias = msg.find("[BiasDetectionAgent]").unwrap();
        assert!(ethics < bias);
        assert!(msg.contains("bias finding"));
        assert!(!msg.contains("[user]"));
    }

    #[tokio::test]
    async fn run_emits_single_authored_event() {
        let provider = Arc::new(ScriptedProvider::new().respond("AI ethics", "No ethical concerns."));
        let agent = agent(provider.clone());
        let ctx = InvocationContext::new(Content::user("hello"));

        let events = agent.run(&ctx).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].author, "EthicsAgent");
        assert_eq!(events[0].invocation_id, ctx.invocation_id);
        assert_eq!(events[0].text(), "No ethical concerns.");
        assert_eq!(provider.calls(), vec!["AI ethics".to_string()]);
    }

    #[tokio::test]
    async fn run_wraps_provider_failure_with_agent_name() {
        let provider = Arc::new(ScriptedProvider::new().fail("AI ethics"));
        let err = agent(provider).run(&InvocationContext::new(Content::user("x"))).await.unwrap_err();
        assert!(matches!(err, AgentError::Failed { .. }));
        assert_eq!(err.agent(), "EthicsAgent");
    }

    #[tokio::test]
    async fn run_rejects_blank_output() {
        let provider = Arc::new(ScriptedProvider::new().respond("AI ethics", "   \n"));
        let err = agent(provider).run(&InvocationContext::new(Content::user("x"))).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyOutput { .. }));
    }
}
