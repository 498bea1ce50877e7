use thiserror::Error;

/// Failure of an agent or of a container running it.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The model call behind an agent failed.
    #[error("agent '{agent}' failed: {source}")]
    Failed {
        agent: String,
        #[source]
        source: anyhow::Error,
    },

    /// The model answered with no text.
    #[error("agent '{agent}' produced empty output")]
    EmptyOutput { agent: String },
}

impl AgentError {
    /// Name of the leaf agent that failed.
    pub fn agent(&self) -> &str {
        match self {
            Self::Failed { agent, .. } | Self::EmptyOutput { agent } => agent,
        }
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_agent_and_cause() {
        let err = AgentError::Failed {
            agent: "EthicsAgent".into(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(err.to_string(), "agent 'EthicsAgent' failed: connection reset");
        assert_eq!(err.agent(), "EthicsAgent");
    }

    #[test]
    fn empty_output_names_agent() {
        let err = AgentError::EmptyOutput {
            agent: "FinalArbiterAgent".into(),
        };
        assert!(err.to_string().contains("FinalArbiterAgent"));
    }
}
