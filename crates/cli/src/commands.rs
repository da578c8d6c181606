use crate::config::RunConfig;
use crate::report::{self, IndexReport};
use anyhow::{Context as AnyhowContext, Result};
use repotrace_dataset::{
    DatasetEmitter, Diagnostic, Pipeline, RunManifest, RunSummary, MANIFEST_FILE,
};
use repotrace_graph::AnalysisSnapshot;
use repotrace_indexer::{IndexBuilder, IndexStore, IndexerError, SourceIndex};
use repotrace_reasoning::{provider_from_config, ProviderKind, Synthesizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Overrides given on the command line; they win over file and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub workers: Option<usize>,
    pub max_flows: Option<usize>,
}

fn prepare(path: &Path, config_path: Option<&Path>, overrides: &Overrides) -> Result<(PathBuf, RunConfig)> {
    let root = path.canonicalize().context("Invalid repository path")?;
    let (mut config, source) = RunConfig::resolve(config_path, &root)?;
    if let Some(source) = source {
        log::info!("Using config {}", source.display());
    }
    config.apply_env();
    if let Some(provider) = overrides.provider {
        config.synthesis.provider = provider;
    }
    if let Some(workers) = overrides.workers {
        config.pipeline.workers = workers;
    }
    if let Some(max_flows) = overrides.max_flows {
        config.pipeline.max_flows = max_flows;
    }
    config.validate()?;
    Ok((root, config))
}

/// Index `root`; identifier collisions are reported and yield `None`
async fn build_index(root: &Path, config: &RunConfig, json: bool) -> Result<Option<Arc<SourceIndex>>> {
    let builder = IndexBuilder::new(config.index.clone()).context("Invalid [index] config")?;
    let store = IndexStore::new();
    match store.rebuild(&builder, root).await {
        Ok(index) => Ok(Some(index)),
        Err(IndexerError::IdentifierCollision(collisions)) => {
            let mut summary = RunSummary::default();
            for collision in &collisions {
                summary.record(Diagnostic::collision(collision));
            }
            log::error!(
                "Indexing aborted: {} identifier collisions; no records generated",
                collisions.len()
            );
            if json {
                report::print_json(&summary)?;
            } else {
                report::print_summary(&summary);
            }
            Ok(None)
        }
        Err(err) => Err(err).context("Indexing failed"),
    }
}

pub struct GenerateOptions {
    pub path: PathBuf,
    pub features: Vec<String>,
    pub out: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub json: bool,
}

/// Returns whether the run counts as a success for the exit code
pub async fn generate(options: GenerateOptions) -> Result<bool> {
    let (root, config) = prepare(&options.path, options.config.as_deref(), &options.overrides)?;
    let Some(index) = build_index(&root, &config, options.json).await? else {
        return Ok(false);
    };

    let snapshot = Arc::new(AnalysisSnapshot::new(index, config.flow, config.evidence));
    let provider = provider_from_config(&config.synthesis)
        .context("Failed to set up completion provider")?;
    let synthesizer = Arc::new(Synthesizer::new(provider, config.synthesis.clone()));
    log::info!("Completion provider: {}", synthesizer.provider_name());

    tokio::fs::create_dir_all(&options.out)
        .await
        .with_context(|| format!("Failed to create {}", options.out.display()))?;
    let emitter = Arc::new(DatasetEmitter::jsonl(&options.out, config.emit).await?);
    let pipeline = Pipeline::new(Arc::clone(&snapshot), synthesizer, emitter, config.pipeline)?;

    let cancel = pipeline.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; queued requests are cancelled, emitted records are kept");
            cancel.cancel();
        }
    });
    let summary = pipeline.run(&options.features).await;
    interrupt.abort();

    let manifest = RunManifest::new(&root, snapshot.index(), &options.features, summary);
    manifest
        .write(options.out.join(MANIFEST_FILE))
        .await
        .context("Failed to write run manifest")?;

    if options.json {
        report::print_json(&manifest.summary)?;
    } else {
        report::print_summary(&manifest.summary);
        eprintln!("Output: {}", options.out.display());
    }
    Ok(manifest.summary.is_success())
}

pub async fn index(path: &Path, config_path: Option<&Path>, json: bool) -> Result<bool> {
    let (root, config) = prepare(path, config_path, &Overrides::default())?;
    let Some(index) = build_index(&root, &config, json).await? else {
        return Ok(false);
    };

    let report = IndexReport::new(&root, &index);
    if json {
        report::print_json(&report)?;
    } else {
        report::print_index(&report);
    }
    Ok(report.summary.units > 0)
}

pub async fn flows(
    path: &Path,
    config_path: Option<&Path>,
    max_flows: Option<usize>,
    json: bool,
) -> Result<bool> {
    let overrides = Overrides {
        max_flows,
        ..Overrides::default()
    };
    let (root, config) = prepare(path, config_path, &overrides)?;
    let Some(index) = build_index(&root, &config, json).await? else {
        return Ok(false);
    };

    let units = index.parsed_unit_count();
    let snapshot = AnalysisSnapshot::new(index, config.flow, config.evidence);
    let flows = snapshot.discover(config.pipeline.max_flows);

    if json {
        report::print_json(&flows)?;
    } else {
        report::print_flows(&flows);
    }
    Ok(units > 0)
}
