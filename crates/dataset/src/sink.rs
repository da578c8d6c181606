use crate::error::PersistenceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Persistence collaborator: append one serialized record
#[async_trait]
pub trait RecordSink: Send {
    /// Append `line` (one record, newline-terminated) in full or not at all
    async fn append(&mut self, line: &str) -> Result<(), PersistenceError>;

    fn describe(&self) -> String;
}

/// Newline-delimited JSON file, append-only for the lifetime of the sink
pub struct JsonlSink {
    path: PathBuf,
    file: File,

    /// Bytes known to be durable; a failed append is truncated back to this
    committed: u64,
}

impl JsonlSink {
    /// Start a fresh file for this run, creating parent directories
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        File::create(&path).await?;
        let file = OpenOptions::new().append(true).open(&path).await?;
        Ok(Self {
            path,
            file,
            committed: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn rollback(&mut self) {
        if let Err(err) = self.file.set_len(self.committed).await {
            log::warn!(
                "Could not roll back partial write to {}: {err}",
                self.path.display()
            );
        }
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn append(&mut self, line: &str) -> Result<(), PersistenceError> {
        let written = async {
            self.file.write_all(line.as_bytes()).await?;
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;

        match written {
            Ok(()) => {
                self.committed += line.len() as u64;
                Ok(())
            }
            Err(err) => {
                self.rollback().await;
                Err(err.into())
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/records.jsonl");
        let mut sink = JsonlSink::create(&path).await.unwrap();
        sink.append("{\"n\":1}\n").await.unwrap();
        sink.append("{\"n\":2}\n").await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\"n\":1}\n{\"n\":2}\n");
        assert_eq!(sink.describe(), path.display().to_string());
    }

    #[tokio::test]
    async fn create_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        std::fs::write(&path, "stale\n").unwrap();

        let mut sink = JsonlSink::create(&path).await.unwrap();
        sink.append("fresh\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }
}
