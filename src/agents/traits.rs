//! Core agent abstractions.
//!
//! Leaf agents ([`LlmAgent`](super::LlmAgent)) and containers
//! ([`ParallelAgent`](super::ParallelAgent),
//! [`SequentialAgent`](super::SequentialAgent)) all implement [`Agent`],
//! so a pipeline is just a tree of trait objects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AgentResult;

// ── Content ──────────────────────────────────────────────────────

/// A single text part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// A message: the user's prompt or an agent's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".into(),
            parts: vec![Part { text: text.into() }],
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ── Event ────────────────────────────────────────────────────────

/// One authored output recorded during an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    /// Agent name, or `"user"` for the incoming message.
    pub author: String,
    pub content: Content,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(invocation_id: &str, author: &str, content: Content) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            invocation_id: invocation_id.to_string(),
            author: author.to_string(),
            content,
            timestamp: Utc::now(),
        }
    }

    pub fn text(&self) -> String {
        self.content.text()
    }
}

// ── Invocation context ───────────────────────────────────────────

/// State visible to an agent when it runs.
///
/// `events` only ever holds output of stages that already finished;
/// containers extend it as they go.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub invocation_id: String,
    pub user_content: Content,
    pub events: Vec<Event>,
}

impl InvocationContext {
    pub fn new(user_content: Content) -> Self {
        Self {
            invocation_id: format!("e-{}", uuid::Uuid::new_v4()),
            user_content,
            events: Vec::new(),
        }
    }

    /// Copy of this context with `events` appended.
    pub fn with_events(&self, events: &[Event]) -> Self {
        let mut next = self.clone();
        next.events.extend_from_slice(events);
        next
    }
}

// ── Agent tree description ───────────────────────────────────────

/// Static description of an agent and its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_agents: Vec<AgentInfo>,
}

// ── Agent trait ──────────────────────────────────────────────────

/// A unit of work in a pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name, used as the author of emitted events.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Direct children, in execution order. Empty for leaf agents.
    fn sub_agents(&self) -> &[std::sync::Arc<dyn Agent>] {
        &[]
    }

    /// Run against `ctx` and return the events produced, in a stable order.
    async fn run(&self, ctx: &InvocationContext) -> AgentResult<Vec<Event>>;

    /// Describe this agent and its subtree.
    fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            sub_agents: self.sub_agents().iter().map(|a| a.info()).collect(),
        }
    }
}
