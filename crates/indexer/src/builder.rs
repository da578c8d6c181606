use crate::error::{IdentifierCollision, IndexerError, Result};
use crate::identifier::{normalize_path, UnitId};
use crate::index::SourceIndex;
use crate::limits::index_concurrency_from_env;
use crate::resolve::{PendingUnit, SymbolTable};
use crate::scanner::FileScanner;
use crate::stats::{FileFailure, IndexStats};
use crate::unit::{CodeUnit, SourceFile};
use repotrace_code_units::{
    AnalysisError, AnalyzerConfig, ByteSpan, FileAnalysis, Language, SourceAnalyzer, UnitDraft,
    UnitKind,
};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A file handed to the indexer: repository-relative path plus contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInput {
    pub path: String,
    pub content: String,
}

impl SourceInput {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Outcome of parsing one file
enum FileOutcome {
    Parsed(FileAnalysis),
    Failed { language: Language, failure: FileFailure },
    Skipped,
}

struct ParsedFile {
    input: SourceInput,
    normalized: String,
    outcome: FileOutcome,
}

/// Builds a [`SourceIndex`] from a repository root or in-memory sources
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    analyzer: SourceAnalyzer,
    concurrency: usize,
}

impl IndexBuilder {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            analyzer: SourceAnalyzer::new(config)?,
            concurrency: index_concurrency_from_env(),
        })
    }

    /// Override the number of files parsed at once
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Walk `root` and index every supported source file under it
    pub async fn index_root(&self, root: impl AsRef<Path>) -> Result<SourceIndex> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(IndexerError::InvalidPath(root.display().to_string()));
        }

        let max_bytes = u64::try_from(self.analyzer.config().max_file_bytes).unwrap_or(u64::MAX);
        let scanner = FileScanner::new(root).with_max_file_bytes(max_bytes);
        let files = scanner.scan();

        let (inputs, unreadable) = self.read_sources(&scanner, &files).await?;
        self.build(inputs, unreadable).await
    }

    /// Read scanned files. A file that vanished or cannot be read is reported and
    /// indexed as an opaque unit; it never fails the whole index.
    async fn read_sources(
        &self,
        scanner: &FileScanner,
        files: &[PathBuf],
    ) -> Result<(Vec<SourceInput>, Vec<FileFailure>)> {
        let mut inputs = Vec::with_capacity(files.len());
        let mut unreadable = Vec::new();
        for file_chunk in files.chunks(self.concurrency) {
            let mut tasks = Vec::with_capacity(file_chunk.len());
            for file_path in file_chunk {
                let file_path = file_path.clone();
                tasks.push(tokio::spawn(async move {
                    let bytes = tokio::fs::read(&file_path).await;
                    (file_path, bytes)
                }));
            }

            for task in tasks {
                let (file_path, bytes) = task
                    .await
                    .map_err(|e| IndexerError::Other(format!("read task failed: {e}")))?;
                let path = scanner.relative_path(&file_path);
                let bytes = match bytes {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        log::warn!("{path}: cannot read ({err}); indexing as opaque unit");
                        unreadable.push(FileFailure {
                            path,
                            line: None,
                            message: format!("read failed: {err}"),
                        });
                        continue;
                    }
                };
                let content = match String::from_utf8(bytes) {
                    Ok(content) => content,
                    Err(err) => {
                        log::debug!("{} is not valid UTF-8, decoding lossily", file_path.display());
                        String::from_utf8_lossy(err.as_bytes()).into_owned()
                    }
                };
                inputs.push(SourceInput::new(path, content));
            }
        }
        Ok((inputs, unreadable))
    }

    /// Index in-memory sources; the result does not depend on input order
    pub async fn index_sources(&self, sources: Vec<SourceInput>) -> Result<SourceIndex> {
        self.build(sources, Vec::new()).await
    }

    async fn build(&self, sources: Vec<SourceInput>, unreadable: Vec<FileFailure>) -> Result<SourceIndex> {
        let started = Instant::now();
        let files_seen = sources.len() + unreadable.len();
        let parsed = self.parse_parallel(sources, unreadable).await?;
        let mut index = merge(parsed)?;
        index.stats.files_seen = files_seen;
        index.stats.time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        log::info!(
            "Indexed {} files: {} units, {} opaque, {} skipped",
            index.stats.files_indexed,
            index.stats.parsed_units,
            index.stats.opaque_units,
            index.stats.files_skipped
        );
        Ok(index)
    }

    async fn parse_parallel(
        &self,
        sources: Vec<SourceInput>,
        unreadable: Vec<FileFailure>,
    ) -> Result<Vec<ParsedFile>> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (position, input) in sources.into_iter().enumerate() {
            let analyzer = self.analyzer.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| IndexerError::Other(e.to_string()))?;
                let parsed = tokio::task::spawn_blocking(move || parse_one(&analyzer, input))
                    .await
                    .map_err(|e| IndexerError::Other(format!("parse task failed: {e}")))?;
                Ok::<_, IndexerError>((position, parsed))
            });
        }

        let mut parsed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| IndexerError::Other(format!("Task panicked: {e}")))?;
            parsed.push(result?);
        }

        // Completion order is arbitrary; identifiers must only depend on paths.
        let mut parsed: Vec<ParsedFile> = parsed.into_iter().map(|(_, file)| file).collect();
        parsed.extend(unreadable.into_iter().map(|failure| ParsedFile {
            input: SourceInput::new(failure.path.clone(), String::new()),
            normalized: normalize_path(&failure.path),
            outcome: FileOutcome::Failed {
                language: Language::from_path(&failure.path),
                failure,
            },
        }));
        parsed.sort_by(|a, b| {
            a.normalized
                .cmp(&b.normalized)
                .then_with(|| a.input.path.cmp(&b.input.path))
        });
        Ok(parsed)
    }
}

fn parse_one(analyzer: &SourceAnalyzer, input: SourceInput) -> ParsedFile {
    let normalized = normalize_path(&input.path);
    let language = Language::from_path(&input.path);

    let outcome = match analyzer.analyze_str(&input.content, &input.path) {
        Ok(analysis) => FileOutcome::Parsed(analysis),
        Err(AnalysisError::UnsupportedLanguage(_)) => FileOutcome::Skipped,
        Err(err) => {
            let line = match &err {
                AnalysisError::ParseError { line, .. } => Some(*line),
                _ => None,
            };
            log::warn!("{}: {err}; indexing as opaque unit", input.path);
            FileOutcome::Failed {
                language,
                failure: FileFailure {
                    path: input.path.clone(),
                    line,
                    message: err.to_string(),
                },
            }
        }
    };

    ParsedFile {
        input,
        normalized,
        outcome,
    }
}

/// Merge per-file results into one index, refusing to overwrite any identifier
fn merge(parsed: Vec<ParsedFile>) -> Result<SourceIndex> {
    let mut stats = IndexStats::new();
    let mut files: BTreeMap<String, SourceFile> = BTreeMap::new();
    let mut claimed: BTreeSet<UnitId> = BTreeSet::new();
    let mut pending: Vec<PendingUnit> = Vec::new();
    let mut opaque: Vec<CodeUnit> = Vec::new();
    let mut collisions: Vec<IdentifierCollision> = Vec::new();
    let mut hasher = Sha256::new();

    for file in parsed {
        let ParsedFile {
            input,
            normalized,
            outcome,
        } = file;

        let (language, file_units, failed) = match outcome {
            FileOutcome::Skipped => {
                log::debug!("Skipping unsupported file {}", input.path);
                stats.files_skipped += 1;
                continue;
            }
            FileOutcome::Parsed(analysis) => {
                let units = assign_identifiers(&input.path, analysis.language, analysis.units);
                (analysis.language, units, None)
            }
            FileOutcome::Failed { language, failure } => {
                let unit = CodeUnit {
                    id: UnitId::module(&input.path),
                    kind: UnitKind::Module,
                    language,
                    span: ByteSpan::whole(&input.content),
                    edges: Vec::new(),
                    branches: Vec::new(),
                    documentation: None,
                    parse_error: Some(failure.message.clone()),
                };
                (language, Vec::new(), Some((unit, failure)))
            }
        };

        // Identifiers embed the normalized path, so units can only clash when paths do.
        if let Some(first) = files.get(&normalized).map(|f| f.original_path.clone()) {
            let before = collisions.len();
            let ids = file_units
                .iter()
                .map(|u| &u.id)
                .chain(failed.iter().map(|(unit, _)| &unit.id));
            for id in ids.filter(|id| claimed.contains(*id)) {
                collisions.push(IdentifierCollision {
                    identifier: id.to_string(),
                    first: first.clone(),
                    second: input.path.clone(),
                });
            }
            if collisions.len() == before {
                collisions.push(IdentifierCollision {
                    identifier: normalized,
                    first,
                    second: input.path,
                });
            }
            continue;
        }

        claimed.extend(file_units.iter().map(|u| u.id.clone()));
        stats.parsed_units += file_units.len();
        pending.extend(file_units);
        if let Some((unit, failure)) = failed {
            claimed.insert(unit.id.clone());
            opaque.push(unit);
            stats.add_failure(failure);
        }

        hasher.update(normalized.as_bytes());
        hasher.update([0u8]);
        hasher.update(input.content.as_bytes());
        hasher.update([0u8]);

        let line_count = input.content.lines().count();
        stats.add_file(language.as_str(), line_count);
        files.insert(
            normalized.clone(),
            SourceFile {
                path: normalized,
                original_path: input.path,
                language,
                line_count,
                content: Arc::from(input.content),
            },
        );
    }

    if !collisions.is_empty() {
        for collision in &collisions {
            log::error!("Identifier collision: {collision}");
        }
        return Err(IndexerError::IdentifierCollision(collisions));
    }

    let edges: Vec<_> = {
        let table = SymbolTable::new(&pending);
        pending.iter().map(|unit| table.edges_for(unit)).collect()
    };

    let mut units: BTreeMap<UnitId, CodeUnit> = BTreeMap::new();
    for (unit, edges) in pending.into_iter().zip(edges) {
        let PendingUnit {
            id,
            language,
            draft,
        } = unit;
        units.insert(
            id.clone(),
            CodeUnit {
                id,
                kind: draft.kind,
                language,
                span: draft.span,
                edges,
                branches: draft.branches,
                documentation: draft.documentation,
                parse_error: None,
            },
        );
    }
    for unit in opaque {
        units.insert(unit.id.clone(), unit);
    }

    let mut referenced_by: BTreeMap<UnitId, Vec<UnitId>> = BTreeMap::new();
    for unit in units.values() {
        for edge in &unit.edges {
            match edge.target.as_internal() {
                Some(target) => {
                    stats.internal_edges += 1;
                    referenced_by
                        .entry(target.clone())
                        .or_default()
                        .push(unit.id.clone());
                }
                None => stats.external_edges += 1,
            }
        }
    }

    stats.failures.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(SourceIndex {
        version: 0,
        fingerprint: hex_encode_lower(&hasher.finalize()),
        units,
        referenced_by,
        files,
        stats,
    })
}

/// Give every draft its identifier; repeated symbols in one file get `#n` in source order
fn assign_identifiers(path: &str, language: Language, drafts: Vec<UnitDraft>) -> Vec<PendingUnit> {
    let mut totals: HashMap<String, u32> = HashMap::new();
    for draft in &drafts {
        *totals.entry(draft.symbol.clone()).or_insert(0) += 1;
    }

    let mut seen: HashMap<String, u32> = HashMap::new();
    drafts
        .into_iter()
        .map(|draft| {
            let overload = if totals.get(&draft.symbol).copied().unwrap_or(0) > 1 {
                let n = seen.entry(draft.symbol.clone()).or_insert(0);
                *n += 1;
                Some(*n)
            } else {
                None
            };
            PendingUnit {
                id: UnitId::new(path, draft.symbol.clone(), overload),
                language,
                draft,
            }
        })
        .collect()
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builder() -> IndexBuilder {
        IndexBuilder::new(AnalyzerConfig::default())
            .unwrap()
            .with_concurrency(2)
    }

    #[tokio::test]
    async fn overloads_get_source_order_suffixes() {
        let code = "def handle(x):\n    return 1\n\ndef handle(x, y):\n    return 2\n";
        let index = builder()
            .index_sources(vec![SourceInput::new("handlers.py", code)])
            .await
            .unwrap();

        let ids: Vec<String> = index.ids().map(ToString::to_string).collect();
        assert_eq!(
            ids,
            vec![
                "handlers.py::handle#1".to_string(),
                "handlers.py::handle#2".to_string()
            ]
        );
        let first = index.get_str("handlers.py::handle#1").unwrap();
        assert_eq!(first.span.start_line, 1);
    }

    #[tokio::test]
    async fn referenced_by_mirrors_edges() {
        let index = builder()
            .index_sources(vec![
                SourceInput::new("a.py", "def a():\n    b()\n"),
                SourceInput::new("b.py", "def b():\n    print('b')\n"),
            ])
            .await
            .unwrap();

        let b: UnitId = "b.py::b".parse().unwrap();
        let callers: Vec<String> = index.referenced_by(&b).iter().map(ToString::to_string).collect();
        assert_eq!(callers, vec!["a.py::a".to_string()]);

        let b_unit = index.get(&b).unwrap();
        assert_eq!(b_unit.external_targets().collect::<Vec<_>>(), vec!["print"]);
        assert_eq!(index.stats().internal_edges, 1);
        assert_eq!(index.stats().external_edges, 1);
    }

    #[tokio::test]
    async fn unsupported_files_are_skipped_not_opaque() {
        let index = builder()
            .index_sources(vec![
                SourceInput::new("notes.md", "# hello"),
                SourceInput::new("main.rs", "fn main() {}"),
            ])
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().files_skipped, 1);
        assert_eq!(index.opaque_unit_count(), 0);
    }

    #[tokio::test]
    async fn file_removed_after_scan_is_an_opaque_failure() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.py"), "def a():\n    return 1\n").unwrap();
        let scanner = FileScanner::new(temp.path());
        let files = vec![temp.path().join("a.py"), temp.path().join("gone.py")];

        let builder = builder();
        let (inputs, unreadable) = builder.read_sources(&scanner, &files).await.unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].path, "gone.py");

        let index = builder.build(inputs, unreadable).await.unwrap();
        assert_eq!(index.parsed_unit_count(), 1);
        assert_eq!(index.opaque_unit_count(), 1);
        assert!(index.contains(&UnitId::module("gone.py")));
        assert_eq!(index.stats().failures.len(), 1);
        assert!(index.stats().failures[0].message.starts_with("read failed"));
        assert_eq!(index.stats().files_seen, 2);
    }

    #[test]
    fn hex_encoding_is_lowercase() {
        assert_eq!(hex_encode_lower(&[0x00, 0xab, 0x7f]), "00ab7f");
    }
}
