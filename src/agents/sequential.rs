//! Ordered container.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::AgentResult;
use super::traits::{Agent, Event, InvocationContext};

/// Runs sub-agents one after another.
///
/// Each stage sees the incoming context plus every event produced by the
/// stages before it. A failing stage stops the sequence.
pub struct SequentialAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        sub_agents: Vec<Arc<dyn Agent>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            sub_agents,
        }
    }
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    async fn run(&self, ctx: &InvocationContext) -> AgentResult<Vec<Event>> {
        let mut produced: Vec<Event> = Vec::new();

        for (stage, agent) in self.sub_agents.iter().enumerate() {
            tracing::debug!(
                agent = %self.name,
                invocation_id = %ctx.invocation_id,
                stage,
                sub_agent = agent.name(),
                "Entering stage"
            );
            let stage_ctx = ctx.with_events(&produced);
            let events = agent.run(&stage_ctx).await?;
            produced.extend(events);
        }

        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedProvider;
    use crate::agents::{Content, LlmAgent};
    use crate::providers::Provider;

    fn leaf(name: &str, instruction: &str, provider: &Arc<ScriptedProvider>) -> Arc<dyn Agent> {
        let provider: Arc<dyn Provider> = provider.clone();
        Arc::new(LlmAgent::new(name, name, instruction, provider, "m"))
    }

    #[tokio::test]
    async fn later_stages_see_earlier_output() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .respond("first", "draft from first")
                .respond("second", "review from second"),
        );
        let seq = SequentialAgent::new(
            "Seq",
            "two stages",
            vec![leaf("One", "first", &provider), leaf("Two", "second", &provider)],
        );
        let events = seq
            .run(&InvocationContext::new(Content::user("p")))
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(provider.calls(), vec!["first", "second"]);
        assert!(!provider.messages_for("first")[0].contains("draft from first"));
        assert!(provider.messages_for("second")[0].contains("draft from first"));
    }

    #[tokio::test]
    async fn failure_stops_the_sequence() {
        let provider = Arc::new(ScriptedProvider::new().fail("first").respond("second", "never"));
        let seq = SequentialAgent::new(
            "Seq",
            "two stages",
            vec![leaf("One", "first", &provider), leaf("Two", "second", &provider)],
        );
        let err = seq
            .run(&InvocationContext::new(Content::user("p")))
            .await
            .unwrap_err();
        assert_eq!(err.agent(), "One");
        assert_eq!(provider.calls(), vec!["first"]);
    }
}
