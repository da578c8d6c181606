use crate::error::{PersistenceError, PipelineError};
use crate::manifest::RECORDS_FILE;
use crate::sink::{JsonlSink, RecordSink};
use repotrace_reasoning::VerifiedRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// `[emit]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    /// Append attempts per record before it is given up
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles after each failure
    pub backoff_ms: u64,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

impl EmitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(format!(
                "emit.max_attempts must be in 1..={MAX_ATTEMPTS_LIMIT} (got {})",
                self.max_attempts
            ));
        }
        Ok(())
    }
}

/// Serializes verified records onto one sink.
///
/// Appends happen under a single lock, so lines never interleave. Each record is
/// serialized before the lock is taken and written as one line.
pub struct DatasetEmitter {
    sink: Mutex<Box<dyn RecordSink>>,
    config: EmitConfig,
    emitted: AtomicUsize,
}

impl DatasetEmitter {
    pub fn new(sink: Box<dyn RecordSink>, config: EmitConfig) -> Self {
        Self {
            sink: Mutex::new(sink),
            config,
            emitted: AtomicUsize::new(0),
        }
    }

    /// Emitter writing `records.jsonl` under `out_dir`
    pub async fn jsonl(out_dir: &Path, config: EmitConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        let sink = JsonlSink::create(out_dir.join(RECORDS_FILE)).await?;
        log::info!("Writing records to {}", sink.describe());
        Ok(Self::new(Box::new(sink), config))
    }

    /// Records successfully appended so far
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Append `record`, retrying with exponential backoff; fatal only for this record
    pub async fn emit(&self, record: &VerifiedRecord) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut sink = self.sink.lock().await;
        let mut delay = Duration::from_millis(self.config.backoff_ms);
        let mut last = String::new();

        for attempt in 1..=self.config.max_attempts {
            match sink.append(&line).await {
                Ok(()) => {
                    self.emitted.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Err(err) => {
                    log::warn!(
                        "Append to {} failed (attempt {attempt}/{}): {err}",
                        sink.describe(),
                        self.config.max_attempts
                    );
                    last = err.to_string();
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    }
                }
            }
        }

        Err(PersistenceError::Exhausted {
            attempts: self.config.max_attempts,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_are_bounded() {
        assert!(EmitConfig::default().validate().is_ok());
        let zero = EmitConfig {
            max_attempts: 0,
            ..EmitConfig::default()
        };
        assert!(zero.validate().is_err());
        let many = EmitConfig {
            max_attempts: 11,
            ..EmitConfig::default()
        };
        assert!(many.validate().is_err());
    }
}
