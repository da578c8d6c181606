use serde::{Deserialize, Serialize};

pub const ENV_WORKERS: &str = "REPOTRACE_WORKERS";
const MAX_WORKERS: usize = 64;

/// `[pipeline]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Generation requests in flight at once
    pub workers: usize,

    /// Business flows turned into questions
    pub max_flows: usize,

    /// Question requests per flow (entry first, then units with decision points)
    pub questions_per_flow: usize,

    /// Design proposals per feature request, one per distinct originating flow
    pub proposals: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_flows: 64,
            questions_per_flow: 1,
            proposals: 3,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
        .clamp(1, 8)
}

impl PipelineConfig {
    /// Apply `REPOTRACE_WORKERS`, clamped to a sane range; garbage is ignored
    pub fn apply_env(&mut self) {
        if let Some(workers) = parse_workers(std::env::var(ENV_WORKERS).ok().as_deref()) {
            self.workers = workers;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(format!(
                "pipeline.workers must be in 1..={MAX_WORKERS} (got {})",
                self.workers
            ));
        }
        if self.max_flows == 0 {
            return Err("pipeline.max_flows must be > 0".to_string());
        }
        Ok(())
    }
}

fn parse_workers(raw: Option<&str>) -> Option<usize> {
    raw?.trim()
        .parse::<usize>()
        .ok()
        .map(|n| n.clamp(1, MAX_WORKERS))
}
