use anyhow::{anyhow, Context as AnyhowContext, Result};
use repotrace_code_units::AnalyzerConfig;
use repotrace_dataset::{EmitConfig, PipelineConfig};
use repotrace_graph::{EvidenceConfig, FlowConfig};
use repotrace_reasoning::SynthesisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "repotrace.toml";

/// Everything a run can be tuned with; every section is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub index: AnalyzerConfig,
    pub flow: FlowConfig,
    pub evidence: EvidenceConfig,
    pub synthesis: SynthesisConfig,
    pub emit: EmitConfig,
    pub pipeline: PipelineConfig,
}

impl RunConfig {
    /// Parse a TOML file, or YAML for `.yaml`/`.yml` paths
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if is_yaml {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("Invalid YAML config {}", path.display()))
        } else {
            toml::from_str(&raw).with_context(|| format!("Invalid TOML config {}", path.display()))
        }
    }

    /// `--config` if given, else `repotrace.toml` at the repository root, else defaults
    pub fn resolve(explicit: Option<&Path>, root: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }
        let candidate = root.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Ok((Self::load(&candidate)?, Some(candidate)));
        }
        Ok((Self::default(), None))
    }

    /// `REPOTRACE_LLM_*` and `REPOTRACE_WORKERS`
    pub fn apply_env(&mut self) {
        self.synthesis.apply_env();
        self.pipeline.apply_env();
    }

    pub fn validate(&self) -> Result<()> {
        let sections = [
            ("index", self.index.validate()),
            ("flow", self.flow.validate()),
            ("evidence", self.evidence.validate()),
            ("synthesis", self.synthesis.validate()),
            ("emit", self.emit.validate()),
            ("pipeline", self.pipeline.validate()),
        ];
        for (section, outcome) in sections {
            outcome.map_err(|msg| anyhow!("Invalid [{section}] config: {msg}"))?;
        }
        Ok(())
    }
}
