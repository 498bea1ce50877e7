//! Agent definitions for the screening pipeline.

use std::sync::Arc;

use crate::agents::{Agent, LlmAgent, ParallelAgent, SequentialAgent};
use crate::providers::Provider;

pub const ETHICS_AGENT: &str = "EthicsAgent";
pub const COMPLIANCE_AGENT: &str = "ComplianceAgent";
pub const BIAS_AGENT: &str = "BiasDetectionAgent";
pub const PARALLEL_AGENT: &str = "ParallelEvaluationAgent";
pub const CRITIQUE_AGENT: &str = "LLMCritiqueAgent";
pub const ARBITER_AGENT: &str = "FinalArbiterAgent";
pub const PIPELINE_AGENT: &str = "EthicalGuardPipeline";

/// Reviewers whose output is an [`AgentFinding`](super::AgentFinding), in order.
pub const REVIEW_AGENTS: [&str; 3] = [ETHICS_AGENT, COMPLIANCE_AGENT, BIAS_AGENT];

const ETHICS_INSTRUCTION: &str = "You are an expert in AI ethics. Carefully examine the user's input for potential misuse, moral dilemmas, unsafe behavior, \
and ethical red flags, including deception, manipulation, misinformation, or harm to individuals or society. \
Flag anything that could cause real-world ethical concern in AI output or usage.";

const COMPLIANCE_INSTRUCTION: &str = "You are an expert legal and policy compliance analyst. Review the input for violations or risks related to regulatory frameworks \
such as GDPR, HIPAA, COPPA, EEOC, or corporate policies. Identify issues including personal data exposure, \
unauthorized advice, IP infringement, or failure to meet fairness and accessibility standards.";

const BIAS_INSTRUCTION: &str = "You are an expert fairness and bias auditor. Examine the input for implicit or explicit bias across gender, race, age, culture, \
disability, or socio-economic status. Highlight any stereotyping, exclusionary language, or framing that could lead to \
discriminatory outcomes or reinforce harmful narratives.";

const CRITIQUE_INSTRUCTION: &str = "You are a large language model (LLM) evaluator. Review the analyses from the Ethics, Compliance, and Bias Detection agents. \
Provide a constructive critique based on coherence, thoroughness, contradictions, or gaps in reasoning. \
Suggest any overlooked issues, contextually relevant improvements, or concerns about prompt quality or safety.";

const ARBITER_INSTRUCTION: &str = "You are the final decision-maker. Based on the detailed evaluations from Ethics, Compliance, Bias Detection, and LLM Critique agents, \
summarize the key findings and issue one of three final decisions: [SAFE], [RISK], or [BLOCK]. \
Be conservative in uncertain cases. Provide a brief rationale that balances ethical, legal, and societal implications.";

/// Model settings shared by every leaf agent.
#[derive(Debug, Clone)]
pub struct AgentModel {
    pub model: String,
    pub temperature: f64,
}

fn llm(
    name: &str,
    description: &str,
    instruction: &str,
    provider: &Arc<dyn Provider>,
    settings: &AgentModel,
) -> Arc<dyn Agent> {
    Arc::new(
        LlmAgent::new(name, description, instruction, provider.clone(), settings.model.clone())
            .with_temperature(settings.temperature),
    )
}

/// The three independent reviewers, in declaration order.
pub fn review_agents(provider: &Arc<dyn Provider>, settings: &AgentModel) -> Vec<Arc<dyn Agent>> {
    vec![
        llm(
            ETHICS_AGENT,
            "Analyzes prompts for ethical risks, moral concerns, and potential for misuse or harm.",
            ETHICS_INSTRUCTION,
            provider,
            settings,
        ),
        llm(
            COMPLIANCE_AGENT,
            "Assesses legal, regulatory, and policy compliance within the prompt.",
            COMPLIANCE_INSTRUCTION,
            provider,
            settings,
        ),
        llm(
            BIAS_AGENT,
            "Scans prompts for social bias, discrimination, and fairness issues.",
            BIAS_INSTRUCTION,
            provider,
            settings,
        ),
    ]
}

/// Build the full pipeline: parallel review → critique → final arbiter.
pub fn build_pipeline(provider: Arc<dyn Provider>, settings: &AgentModel) -> SequentialAgent {
    build_pipeline_with_reviewers(review_agents(&provider, settings), provider, settings)
}

/// Same as [`build_pipeline`] with a caller-supplied review stage.
pub fn build_pipeline_with_reviewers(
    reviewers: Vec<Arc<dyn Agent>>,
    provider: Arc<dyn Provider>,
    settings: &AgentModel,
) -> SequentialAgent {
    let parallel: Arc<dyn Agent> = Arc::new(ParallelAgent::new(
        PARALLEL_AGENT,
        "Runs ethics, compliance, and bias evaluations in parallel.",
        reviewers,
    ));

    SequentialAgent::new(
        PIPELINE_AGENT,
        "Sequentially evaluates prompt using ethical, compliance, bias, and critique agents before final judgment.",
        vec![
            parallel,
            llm(
                CRITIQUE_AGENT,
                "Performs an expert-level review and critique of prior agent analyses.",
                CRITIQUE_INSTRUCTION,
                &provider,
                settings,
            ),
            llm(
                ARBITER_AGENT,
                "Aggregates all agent findings and delivers a final safety classification: SAFE, RISK, or BLOCK.",
                ARBITER_INSTRUCTION,
                &provider,
                settings,
            ),
        ],
    )
}
