//! Minimal agent orchestration.
//!
//! ```text
//! SequentialAgent ─┬─▸ ParallelAgent ─┬─▸ LlmAgent
//!                  │                  ├─▸ LlmAgent
//!                  │                  └─▸ LlmAgent
//!                  ├─▸ LlmAgent
//!                  └─▸ LlmAgent
//! ```
//!
//! Leaf [`LlmAgent`]s call a [`Provider`](crate::providers::Provider);
//! containers only decide ordering and which events each child sees.

pub mod error;
pub mod llm;
pub mod parallel;
pub mod sequential;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AgentError, AgentResult};
pub use llm::LlmAgent;
pub use parallel::ParallelAgent;
pub use sequential::SequentialAgent;
pub use traits::{Agent, AgentInfo, Content, Event, InvocationContext, Part};
