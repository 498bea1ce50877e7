//! Scripted provider for pipeline tests.
//!
//! Rules match on a substring of the system instruction, so each agent can
//! be scripted independently of call order.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::providers::Provider;

enum Outcome {
    Respond(String),
    Fail,
}

struct Rule {
    needle: String,
    outcome: Outcome,
    delay: Option<Duration>,
}

#[derive(Default)]
pub struct ScriptedProvider {
    rules: Vec<Rule>,
    rendezvous: Option<(Vec<String>, Arc<Barrier>)>,
    log: Mutex<Vec<String>>,
    messages: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, needle: &str, text: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            outcome: Outcome::Respond(text.into()),
            delay: None,
        });
        self
    }

    pub fn fail(mut self, needle: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            outcome: Outcome::Fail,
            delay: None,
        });
        self
    }

    /// Delay the most recently added rule for `needle`.
    pub fn delay(mut self, needle: &str, millis: u64) -> Self {
        if let Some(rule) = self.rules.iter_mut().rev().find(|r| r.needle == needle) {
            rule.delay = Some(Duration::from_millis(millis));
        }
        self
    }

    /// Calls matching `needles` block until all of them are in flight at once.
    pub fn rendezvous(mut self, needles: &[&str]) -> Self {
        let barrier = Arc::new(Barrier::new(needles.len()));
        self.rendezvous = Some((needles.iter().map(|n| (*n).to_string()).collect(), barrier));
        self
    }

    /// Needles of calls, in the order they started.
    pub fn calls(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|entry| entry.strip_prefix("start:").map(str::to_string))
            .collect()
    }

    /// Full `start:`/`end:` trace.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// User messages received by calls matching `needle`.
    pub fn messages_for(&self, needle: &str) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(n, _)| n == needle)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat_with_system(
        &self,
        system_prompt: Option<&str>,
        message: &str,
        _model: &str,
        _temperature: f64,
    ) -> anyhow::Result<String> {
        let system = system_prompt.unwrap_or_default();
        let Some(rule) = self.rules.iter().find(|r| system.contains(&r.needle)) else {
            anyhow::bail!("no scripted response for instruction: {system}");
        };

        self.log.lock().push(format!("start:{}", rule.needle));
        self.messages
            .lock()
            .push((rule.needle.clone(), message.to_string()));

        if let Some((needles, barrier)) = &self.rendezvous {
            if needles.contains(&rule.needle) {
                barrier.wait().await;
            }
        }
        if let Some(delay) = rule.delay {
            tokio::time::sleep(delay).await;
        }

        self.log.lock().push(format!("end:{}", rule.needle));
        match &rule.outcome {
            Outcome::Respond(text) => Ok(text.clone()),
            Outcome::Fail => anyhow::bail!("scripted failure for {}", rule.needle),
        }
    }
}
