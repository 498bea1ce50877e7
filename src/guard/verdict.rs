//! Pipeline output types and verdict extraction.

use serde::{Deserialize, Serialize};

// ── Verdict label ────────────────────────────────────────────────

/// Final classification of a prompt.
///
/// Ordered by severity so the most conservative label compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLabel {
    Safe,
    Risk,
    Block,
}

impl VerdictLabel {
    pub const ALL: [VerdictLabel; 3] = [Self::Safe, Self::Risk, Self::Block];

    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Risk => "RISK",
            Self::Block => "BLOCK",
        }
    }
}

impl std::fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Arbiter decision plus its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: VerdictLabel,
    pub rationale: String,
}

impl Verdict {
    /// Extract the verdict from the arbiter's free text.
    ///
    /// Bracketed labels (`[BLOCK]`) win over bare words. When several
    /// distinct labels appear, the most severe one is taken. Returns
    /// `None` when the text names no label at all.
    pub fn from_arbiter_output(text: &str) -> Option<Self> {
        let bracketed: Vec<VerdictLabel> = VerdictLabel::ALL
            .into_iter()
            .filter(|l| text.contains(&format!("[{}]", l.label())))
            .collect();

        let found: Vec<VerdictLabel> = if bracketed.is_empty() {
            VerdictLabel::ALL
                .into_iter()
                .filter(|l| contains_word(text, l.label()))
                .collect()
        } else {
            bracketed
        };

        let label = found.into_iter().max()?;
        Some(Self {
            label,
            rationale: text.trim().to_string(),
        })
    }
}

/// Whole-word, case-sensitive match.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

// ── Findings and assessment ──────────────────────────────────────

/// Free-text analysis from one reviewing agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFinding {
    pub agent: String,
    pub analysis: String,
}

/// Everything the pipeline produced for one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub invocation_id: String,
    pub prompt: String,
    pub findings: Vec<AgentFinding>,
    pub critique: String,
    pub verdict: Verdict,
}

impl Assessment {
    /// Render as markdown for the CLI.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("## Verdict: {}\n\n", self.verdict.label));
        md.push_str(&format!("{}\n\n", self.verdict.rationale));
        for finding in &self.findings {
            md.push_str(&format!("---\n\n### {}\n\n{}\n\n", finding.agent, finding.analysis));
        }
        md.push_str(&format!("---\n\n### Critique\n\n{}\n", self.critique));
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(VerdictLabel::Block > VerdictLabel::Risk);
        assert!(VerdictLabel::Risk > VerdictLabel::Safe);
    }

    #[test]
    fn bracketed_label_is_extracted() {
        let v = Verdict::from_arbiter_output("Decision: [SAFE]\nNo concerns were raised.").unwrap();
        assert_eq!(v.label, VerdictLabel::Safe);
        assert!(v.rationale.starts_with("Decision: [SAFE]"));
    }

    #[test]
    fn bracketed_label_beats_bare_mentions() {
        let text = "Although the content is not SAFE in every context, the decision is [RISK].";
        let v = Verdict::from_arbiter_output(text).unwrap();
        assert_eq!(v.label, VerdictLabel::Risk);
    }

    #[test]
    fn bare_word_label_is_accepted() {
        let v = Verdict::from_arbiter_output("Final decision: BLOCK. Deceptive request.").unwrap();
        assert_eq!(v.label, VerdictLabel::Block);
    }

    #[test]
    fn ambiguous_output_resolves_to_most_severe() {
        let v = Verdict::from_arbiter_output("[SAFE] for adults, [BLOCK] for minors").unwrap();
        assert_eq!(v.label, VerdictLabel::Block);
    }

    #[test]
    fn embedded_words_do_not_match() {
        assert!(Verdict::from_arbiter_output("UNSAFE BLOCKED RISKY").is_none());
        assert!(Verdict::from_arbiter_output("this is safe").is_none());
    }

    #[test]
    fn missing_label_is_none() {
        assert!(Verdict::from_arbiter_output("I cannot decide.").is_none());
    }

    #[test]
    fn label_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&VerdictLabel::Block).unwrap(), "\"BLOCK\"");
        let parsed: VerdictLabel = serde_json::from_str("\"RISK\"").unwrap();
        assert_eq!(parsed, VerdictLabel::Risk);
    }

    fn sample_assessment() -> Assessment {
        Assessment {
            invocation_id: "e-1".into(),
            prompt: "p".into(),
            findings: vec![AgentFinding {
                agent: "EthicsAgent".into(),
                analysis: "deceptive".into(),
            }],
            critique: "consistent".into(),
            verdict: Verdict {
                label: VerdictLabel::Block,
                rationale: "[BLOCK] phishing".into(),
            },
        }
    }

    #[test]
    fn assessment_markdown_lists_everything() {
        let md = sample_assessment().to_markdown();
        assert!(md.contains("Verdict: BLOCK"));
        assert!(md.contains("### EthicsAgent"));
        assert!(md.contains("consistent"));
    }

    #[test]
    fn assessment_json_uses_camel_case() {
        let json = serde_json::to_value(sample_assessment()).unwrap();
        assert_eq!(json["invocationId"], "e-1");
        assert!(json.get("invocation_id").is_none());
        assert_eq!(json["verdict"]["label"], "BLOCK");
    }
}
