//! Fan-out/fan-in container.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Instant;

use super::error::AgentResult;
use super::traits::{Agent, Event, InvocationContext};

/// Runs every sub-agent concurrently against the same context.
///
/// Sub-agents never see each other's output. The join waits for all of
/// them; the first failure fails the whole container and the remaining
/// calls are dropped. Events come back in declaration order, not
/// completion order.
pub struct ParallelAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
}

impl ParallelAgent {
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
impl Agent for ParallelAgent {
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
        let start = Instant::now();
        tracing::debug!(
            agent = %self.name,
            invocation_id = %ctx.invocation_id,
            branches = self.sub_agents.len(),
            "Fanning out"
        );

        let branches = self.sub_agents.iter().map(|agent| agent.run(ctx));
        let results = try_join_all(branches).await?;

        tracing::debug!(
            agent = %self.name,
            invocation_id = %ctx.invocation_id,
            duration_ms = start.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
            "All branches joined"
        );

        Ok(results.into_iter().flatten().collect())
    }
}
