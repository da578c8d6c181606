use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `max_retries`; retries against the completion service must stay finite
pub const MAX_RETRIES_LIMIT: u32 = 5;

pub const ENV_LLM_URL: &str = "REPOTRACE_LLM_URL";
pub const ENV_LLM_MODEL: &str = "REPOTRACE_LLM_MODEL";
pub const ENV_LLM_API_KEY: &str = "REPOTRACE_LLM_API_KEY";

/// Which completion collaborator drives synthesis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Offline,
    Http,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown provider `{other}` (expected offline or http)")),
        }
    }
}

/// `[synthesis]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Per-call limit on the completion collaborator
    pub timeout_secs: u64,

    /// Regenerations allowed after transient failures (timeouts, provider errors,
    /// malformed drafts), and separately after citation misses
    pub max_retries: u32,

    pub provider: ProviderKind,

    /// Base URL of an OpenAI-compatible endpoint (`.../v1`)
    pub url: Option<String>,
    pub model: String,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub temperature: Option<f32>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_retries: 1,
            provider: ProviderKind::Offline,
            url: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: Some(0.2),
        }
    }
}

impl SynthesisConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply `REPOTRACE_LLM_*` overrides
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(url) = non_empty(ENV_LLM_URL) {
            self.url = Some(url);
        }
        if let Some(model) = non_empty(ENV_LLM_MODEL) {
            self.model = model;
        }
        if let Some(key) = non_empty(ENV_LLM_API_KEY) {
            self.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("synthesis.timeout_secs must be > 0".to_string());
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(format!(
                "synthesis.max_retries must be <= {MAX_RETRIES_LIMIT} (got {})",
                self.max_retries
            ));
        }
        if self.provider == ProviderKind::Http {
            match self.url.as_deref().map(str::trim) {
                None | Some("") => {
                    return Err(
                        "synthesis.url is required when provider = \"http\" (or set REPOTRACE_LLM_URL)"
                            .to_string(),
                    )
                }
                Some(_) => {}
            }
            if self.model.trim().is_empty() {
                return Err("synthesis.model must not be empty".to_string());
            }
        }
        Ok(())
    }
}
