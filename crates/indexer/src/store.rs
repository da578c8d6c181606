use crate::builder::IndexBuilder;
use crate::error::Result;
use crate::index::SourceIndex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Holder of the current index version.
///
/// Readers clone the `Arc` they start with and keep it for the whole request;
/// publishing swaps the pointer, so nobody ever sees a partially built index.
#[derive(Debug, Default)]
pub struct IndexStore {
    current: RwLock<Option<Arc<SourceIndex>>>,
    last_version: AtomicU64,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently published index, if any
    pub fn current(&self) -> Option<Arc<SourceIndex>> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.clone()
    }

    /// Stamp `index` with the next version and make it current
    pub fn publish(&self, mut index: SourceIndex) -> Arc<SourceIndex> {
        index.version = self.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        let index = Arc::new(index);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(Arc::clone(&index));
        log::debug!(
            "Published index v{} ({} units, fingerprint {})",
            index.version(),
            index.len(),
            index.fingerprint()
        );
        index
    }

    /// Rebuild from `root` and publish; the previous version stays valid for its holders
    pub async fn rebuild(
        &self,
        builder: &IndexBuilder,
        root: impl AsRef<Path>,
    ) -> Result<Arc<SourceIndex>> {
        let index = builder.index_root(root).await?;
        Ok(self.publish(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SourceInput;
    use repotrace_code_units::AnalyzerConfig;

    #[tokio::test]
    async fn publishing_bumps_version_and_keeps_old_snapshots() {
        let builder = IndexBuilder::new(AnalyzerConfig::default()).unwrap();
        let store = IndexStore::new();
        assert!(store.current().is_none());

        let first = builder
            .index_sources(vec![SourceInput::new("a.py", "def a():\n    pass\n")])
            .await
            .unwrap();
        let first = store.publish(first);

        let second = builder
            .index_sources(vec![
                SourceInput::new("a.py", "def a():\n    pass\n"),
                SourceInput::new("b.py", "def b():\n    pass\n"),
            ])
            .await
            .unwrap();
        let second = store.publish(second);

        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(store.current().unwrap().len(), 2);
        assert_ne!(first.fingerprint(), second.fingerprint());
    }
}
