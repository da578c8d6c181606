use repotrace_code_units::AnalyzerConfig;
use repotrace_indexer::{IndexBuilder, SourceIndex, SourceInput};

pub fn index_blocking(files: Vec<(String, String)>) -> SourceIndex {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let sources = files
        .into_iter()
        .map(|(path, content)| SourceInput::new(path, content))
        .collect();
    runtime
        .block_on(
            IndexBuilder::new(AnalyzerConfig::default())
                .expect("builder")
                .index_sources(sources),
        )
        .expect("index")
}

/// Python module with functions `f0..fn`, where `calls[i]` lists the callees of `fi`
#[allow(dead_code)]
pub fn call_graph_module(calls: &[Vec<usize>]) -> String {
    let mut out = String::new();
    for (i, callees) in calls.iter().enumerate() {
        out.push_str(&format!("def f{i}(x):\n"));
        if callees.is_empty() {
            out.push_str("    return x\n");
        }
        for callee in callees {
            out.push_str(&format!("    if x > {callee}:\n        f{callee}(x - 1)\n"));
        }
        out.push('\n');
    }
    out
}
