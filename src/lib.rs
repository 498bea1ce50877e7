//! Multi-agent ethics, compliance and bias screening for LLM prompts.
//!
//! Three reviewer agents examine a prompt concurrently, a critique agent
//! checks their analyses, and a final arbiter labels the prompt SAFE, RISK
//! or BLOCK. The [`gateway`] serves the pipeline over HTTP.

pub mod agents;
pub mod config;
pub mod gateway;
pub mod guard;
pub mod providers;
pub mod session;
pub mod util;

pub use config::Config;
pub use guard::{Assessment, EthicalGuard, Verdict, VerdictLabel};
