//! Prompt screening pipeline.
//!
//! ```text
//! prompt ─▸ ParallelEvaluationAgent ─┬─▸ EthicsAgent ──────┐
//!                                    ├─▸ ComplianceAgent ──┼─▸ LLMCritiqueAgent ─▸ FinalArbiterAgent ─▸ Verdict
//!                                    └─▸ BiasDetectionAgent┘
//! ```
//!
//! The three reviewers run concurrently and see only the prompt. The
//! critique sees their findings; the arbiter sees everything and answers
//! with one of SAFE, RISK or BLOCK.

pub mod pipeline;
pub mod reviewers;
pub mod verdict;

pub use pipeline::{EthicalGuard, GuardError, Invocation};
pub use reviewers::{build_pipeline, AgentModel};
pub use verdict::{AgentFinding, Assessment, Verdict, VerdictLabel};

/// Application name the pipeline is published under.
pub const APP_NAME: &str = "ethical_compliance_agents";
