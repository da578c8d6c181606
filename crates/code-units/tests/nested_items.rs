use repotrace_code_units::{AnalyzerConfig, ReferenceKind, SourceAnalyzer, UnitDraft, UnitKind};

fn analyze(code: &str, path: &str) -> Vec<UnitDraft> {
    let analyzer = SourceAnalyzer::new(AnalyzerConfig::default()).expect("analyzer");
    analyzer
        .analyze_str(code, path)
        .expect("analysis failed")
        .units
}

#[test]
fn extracts_methods_inside_module_impl() {
    let code = r"
mod api {
    pub struct Car;

    impl Car {
        pub fn drive(&self) { self.stop(); }
        fn stop(&self) {}
    }
}
";

    let units = analyze(code, "nested.rs");
    let methods: Vec<_> = units
        .iter()
        .filter(|u| u.kind == UnitKind::Method)
        .map(|u| u.symbol.as_str())
        .collect();

    assert_eq!(methods, vec!["api::Car::drive", "api::Car::stop"]);

    let car = units.iter().find(|u| u.symbol == "api::Car").expect("struct unit");
    let members: Vec<_> = car
        .references
        .iter()
        .filter(|r| r.kind == ReferenceKind::Reference)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(members, vec!["drive", "stop"]);
}

#[test]
fn decorated_python_functions_are_units() {
    let code = r#"
import functools

@functools.lru_cache
def price_for(sku):
    return catalog.lookup(sku)
"#;

    let units = analyze(code, "pricing.py");
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].symbol, "price_for");
    assert_eq!(units[0].references[0].name, "lookup");
    assert_eq!(units[0].references[0].qualifier.as_deref(), Some("catalog"));
}

#[test]
fn unit_spans_slice_back_to_declarations() {
    let code = "function a() { return b(); }\nfunction b() { return 1; }\n";
    let units = analyze(code, "ab.js");

    assert_eq!(units.len(), 2);
    assert_eq!(
        units[0].span.slice(code),
        Some("function a() { return b(); }")
    );
    assert_eq!(units[1].span.start_line, 2);
}

#[test]
fn analysis_is_deterministic() {
    let code = include_str!("../src/ast_analyzer.rs");
    let first = analyze(code, "ast_analyzer.rs");
    let second = analyze(code, "ast_analyzer.rs");
    assert_eq!(first, second);
    assert!(first.iter().any(|u| u.symbol == "AstAnalyzer::collect_branches"));
}
