use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default listening port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8080;

/// Default model bound to every pipeline agent.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Local session database, relative to the working directory.
pub const DEFAULT_SESSION_DB_URL: &str = "sqlite:///./sessions.db";

/// Default per-call model timeout.
pub const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 120;

/// Model calls a single run waits on back to back (reviews, critique, arbiter).
pub const SEQUENTIAL_MODEL_CALLS: u64 = 3;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ETHICAL_GUARD_CONFIG";

// ── Top-level config ─────────────────────────────────────────────

/// Process configuration.
///
/// Loaded from an optional TOML file, then overridden by environment
/// variables. Every field has a default so an empty file (or no file at
/// all) yields a runnable server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub model: ModelConfig,
    pub session: SessionConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// CORS allow-list. A `"*"` entry allows any origin.
    pub allow_origins: Vec<String>,
    /// Upper bound on a whole request, pipeline included. Should cover
    /// [`SEQUENTIAL_MODEL_CALLS`] model timeouts.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            allow_origins: vec![
                "http://localhost".into(),
                "http://localhost:8080".into(),
                "*".into(),
            ],
            request_timeout_secs: SEQUENTIAL_MODEL_CALLS * DEFAULT_MODEL_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Whether the allow-list contains a wildcard origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allow_origins.iter().any(|o| o.trim() == "*")
    }
}

/// Model-serving settings shared by every LLM agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Gemini API key. Usually supplied through `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL of the Generative Language API.
    pub api_url: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            api_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            temperature: 0.2,
            timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// `sqlite:///relative.db`, `sqlite:////absolute.db` or `sqlite:///:memory:`.
    pub db_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_SESSION_DB_URL.into(),
        }
    }
}

/// Where the session database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLocation {
    File(PathBuf),
    Memory,
}

impl SessionConfig {
    /// Resolve `db_url` into a concrete location.
    pub fn location(&self) -> Result<SessionLocation> {
        let url = self.db_url.trim();
        let Some(rest) = url.strip_prefix("sqlite://") else {
            anyhow::bail!(
                "Unsupported session db_url '{url}'. Only sqlite:// URIs are supported"
            );
        };

        // sqlite:///x.db is relative, sqlite:////x.db is absolute.
        let path = rest.strip_prefix('/').unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            return Ok(SessionLocation::Memory);
        }
        Ok(SessionLocation::File(PathBuf::from(path)))
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// Load configuration for the running process.
    ///
    /// File lookup order: `explicit` path, `ETHICAL_GUARD_CONFIG`, then
    /// `config.toml` in the platform config directory (skipped when
    /// absent). Environment overrides and validation run last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let requested = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match requested {
            Some(p) => Self::from_file(&p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(port) = non_empty("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(host) = non_empty("ETHICAL_GUARD_HOST") {
            self.gateway.host = host;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.model.api_key = Some(key);
        }
        if let Some(model) = non_empty("ETHICAL_GUARD_MODEL") {
            self.model.model = model;
        }
        if let Some(url) = non_empty("ETHICAL_GUARD_SESSION_DB") {
            self.session.db_url = url;
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.port == 0 {
            anyhow::bail!("gateway.port must be non-zero");
        }
        if self.model.model.trim().is_empty() {
            anyhow::bail!("model.model cannot be empty");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            anyhow::bail!(
                "model.temperature must be within [0.0, 2.0], got {}",
                self.model.temperature
            );
        }
        if self.model.timeout_secs == 0 || self.gateway.request_timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        let pipeline_budget = self.model.timeout_secs.saturating_mul(SEQUENTIAL_MODEL_CALLS);
        if self.gateway.request_timeout_secs < pipeline_budget {
            tracing::warn!(
                request_timeout_secs = self.gateway.request_timeout_secs,
                pipeline_budget,
                "gateway.request_timeout_secs is shorter than three model timeouts; slow runs will end in 408"
            );
        }
        self.session.location()?;
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ethical-guard").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment_contract() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert!(config.gateway.allows_any_origin());
        assert_eq!(config.session.db_url, "sqlite:///./sessions.db");
        assert_eq!(config.model.model, "gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn request_timeout_covers_every_sequential_model_call() {
        let config = Config::default();
        assert_eq!(config.gateway.request_timeout_secs, 360);
        assert!(
            config.gateway.request_timeout_secs
                >= SEQUENTIAL_MODEL_CALLS * config.model.timeout_secs
        );
    }

    #[test]
    fn port_env_overrides_default() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("PORT", "9090")]));
        assert_eq!(config.gateway.port, 9090);
    }

    #[test]
    fn invalid_port_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("PORT", "not-a-port")]));
        assert_eq!(config.gateway.port, DEFAULT_PORT);
    }

    #[test]
    fn gemini_key_takes_precedence_over_google_key() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("GEMINI_API_KEY", "gemini"),
            ("GOOGLE_API_KEY", "google"),
        ]));
        assert_eq!(config.model.api_key.as_deref(), Some("gemini"));

        let mut config = Config::default();
        config.apply_env_overrides(env(&[("GEMINI_API_KEY", "  "), ("GOOGLE_API_KEY", "google")]));
        assert_eq!(config.model.api_key.as_deref(), Some("google"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [gateway]
            port = 3000

            [model]
            temperature = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.model.temperature, 0.0);
        assert_eq!(config.model.model, DEFAULT_MODEL);
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn from_file_reads_toml() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[session]\ndb_url = \"sqlite:///:memory:\"\n").unwrap();
        let config = Config::from_file(tmp.path()).unwrap();
        assert_eq!(config.session.location().unwrap(), SessionLocation::Memory);
    }

    #[test]
    fn session_location_parses_relative_and_absolute() {
        let rel = SessionConfig::default().location().unwrap();
        assert_eq!(rel, SessionLocation::File(PathBuf::from("./sessions.db")));

        let abs = SessionConfig {
            db_url: "sqlite:////var/lib/guard/sessions.db".into(),
        };
        assert_eq!(
            abs.location().unwrap(),
            SessionLocation::File(PathBuf::from("/var/lib/guard/sessions.db"))
        );
    }

    #[test]
    fn session_location_rejects_other_schemes() {
        let cfg = SessionConfig {
            db_url: "postgres://localhost/sessions".into(),
        };
        assert!(cfg.location().is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.model = "   ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_detection_ignores_whitespace() {
        let gateway = GatewayConfig {
            allow_origins: vec!["http://localhost".into()],
            ..GatewayConfig::default()
        };
        assert!(!gateway.allows_any_origin());

        let gateway = GatewayConfig {
            allow_origins: vec![" * ".into()],
            ..GatewayConfig::default()
        };
        assert!(gateway.allows_any_origin());
    }
}
