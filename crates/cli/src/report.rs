use anyhow::Result;
use repotrace_dataset::{Diagnostic, RunSummary};
use repotrace_graph::Flow;
use repotrace_indexer::{IndexStats, SourceIndex};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Output of `repotrace index`
#[derive(Debug, Serialize)]
pub struct IndexReport {
    pub repository: String,
    pub version: u64,
    pub fingerprint: String,
    pub stats: IndexStats,
    pub summary: RunSummary,
}

impl IndexReport {
    pub fn new(root: &Path, index: &SourceIndex) -> Self {
        Self {
            repository: root.display().to_string(),
            version: index.version(),
            fingerprint: index.fingerprint().to_string(),
            stats: index.stats().clone(),
            summary: RunSummary::from_index(index),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("  {diagnostic}");
    }
}

pub fn print_summary(summary: &RunSummary) {
    eprintln!("{summary}");
    if !summary.diagnostics.is_empty() {
        eprintln!("Diagnostics:");
        print_diagnostics(&summary.diagnostics);
    }
}

pub fn print_index(report: &IndexReport) {
    eprintln!(
        "Indexed {} files, {} units ({} opaque), {} internal edges in {}ms",
        report.stats.files_indexed,
        report.summary.units,
        report.summary.opaque_units,
        report.stats.internal_edges,
        report.stats.time_ms
    );
    eprintln!("Fingerprint: {}", report.fingerprint);
    print_diagnostics(&report.summary.diagnostics);
}

pub fn print_flows(flows: &[Arc<Flow>]) {
    if flows.is_empty() {
        println!("No business flows found.");
        return;
    }
    for (i, flow) in flows.iter().enumerate() {
        println!(
            "{}. {} ({} units, {} decision points)",
            i + 1,
            flow.entry,
            flow.len(),
            flow.decision_points.len()
        );
        for point in &flow.decision_points {
            println!("     {} {}: {}", point.kind.as_str(), point.unit, point.text);
        }
    }
}
