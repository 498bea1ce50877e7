//! Runs the screening pipeline and folds its events into an [`Assessment`].

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::reviewers::{
    build_pipeline, AgentModel, ARBITER_AGENT, CRITIQUE_AGENT, REVIEW_AGENTS,
};
use super::verdict::{AgentFinding, Assessment, Verdict};
use crate::agents::{Agent, AgentError, AgentInfo, Content, Event, InvocationContext};
use crate::providers::Provider;
use crate::util::truncate_with_ellipsis;

/// Why an assessment could not be produced.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error(transparent)]
    Agent(#[from] AgentError),

    /// A stage the verdict depends on emitted nothing.
    #[error("pipeline produced no output for '{agent}'")]
    MissingOutput { agent: String },

    /// The arbiter answered without any of SAFE, RISK or BLOCK.
    #[error("final arbiter output contains no SAFE/RISK/BLOCK label")]
    NoVerdict,
}

/// Events of one pipeline run plus the assessment derived from them.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub events: Vec<Event>,
    pub assessment: Assessment,
}

/// Entry point for screening prompts.
pub struct EthicalGuard {
    root: Arc<dyn Agent>,
}

impl EthicalGuard {
    /// Standard pipeline on `provider`.
    pub fn new(provider: Arc<dyn Provider>, settings: &AgentModel) -> Self {
        Self {
            root: Arc::new(build_pipeline(provider, settings)),
        }
    }

    /// Wrap an arbitrary root agent.
    pub fn from_agent(root: Arc<dyn Agent>) -> Self {
        Self { root }
    }

    pub fn info(&self) -> AgentInfo {
        self.root.info()
    }

    /// Screen a single prompt.
    pub async fn assess(&self, prompt: &str) -> Result<Assessment, GuardError> {
        let ctx = InvocationContext::new(Content::user(prompt));
        Ok(self.invoke(&ctx).await?.assessment)
    }

    /// Run the pipeline against `ctx`.
    ///
    /// Any agent failure, missing stage, or unlabelled arbiter output fails
    /// the whole run; no partial result is returned.
    pub async fn invoke(&self, ctx: &InvocationContext) -> Result<Invocation, GuardError> {
        let prompt = ctx.user_content.text();
        if prompt.trim().is_empty() {
            return Err(GuardError::EmptyPrompt);
        }

        let start = Instant::now();
        tracing::info!(
            invocation_id = %ctx.invocation_id,
            prompt = %truncate_with_ellipsis(&prompt, 120),
            "Screening prompt"
        );

        let events = match self.root.run(ctx).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(
                    invocation_id = %ctx.invocation_id,
                    agent = e.agent(),
                    "Pipeline failed"
                );
                return Err(e.into());
            }
        };

        let assessment = fold_events(&ctx.invocation_id, &prompt, &events)?;

        tracing::info!(
            invocation_id = %ctx.invocation_id,
            verdict = assessment.verdict.label.label(),
            duration_ms = start.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
            "Screening completed"
        );

        Ok(Invocation { events, assessment })
    }
}

fn last_text_by(events: &[Event], agent: &str) -> Result<String, GuardError> {
    events
        .iter()
        .rev()
        .find(|e| e.author == agent)
        .map(Event::text)
        .ok_or_else(|| GuardError::MissingOutput {
            agent: agent.to_string(),
        })
}

/// Build the typed assessment from raw pipeline events.
fn fold_events(invocation_id: &str, prompt: &str, events: &[Event]) -> Result<Assessment, GuardError> {
    let findings = REVIEW_AGENTS
        .iter()
        .map(|agent| {
            Ok(AgentFinding {
                agent: (*agent).to_string(),
                analysis: last_text_by(events, agent)?,
            })
        })
        .collect::<Result<Vec<_>, GuardError>>()?;

    let critique = last_text_by(events, CRITIQUE_AGENT)?;
    let arbiter = last_text_by(events, ARBITER_AGENT)?;
    let verdict = Verdict::from_arbiter_output(&arbiter).ok_or(GuardError::NoVerdict)?;

    Ok(Assessment {
        invocation_id: invocation_id.to_string(),
        prompt: prompt.to_string(),
        findings,
        critique,
        verdict,
    })
}
