use std::path::Path;
use std::sync::Arc;
use strata_analyzer::{
    BuildMode, FileStatus, IndentOutlineBuilder, LargeProjectAnalyzer, PrimeRequest, StructuralBuilder,
};
use strata_incremental::{DecisionReason, ParseStrategy};
use strata_memory::{HotspotProfiler, RecordingTelemetry};

const FILE: &str = "service.py";

fn twenty_functions() -> String {
    (0..20)
        .map(|index| format!("def f_{index}(x): return x + {index}\n"))
        .collect()
}

fn write(root: &Path, contents: &str) {
    std::fs::write(root.join(FILE), contents).expect("write file");
}

fn prime(analyzer: &LargeProjectAnalyzer, root: &Path, version: &str) -> strata_analyzer::AnalyzerReport {
    analyzer
        .prime_cache(&PrimeRequest::new("svc", root, version))
        .expect("run completes")
}

#[test]
fn small_edit_is_patched_into_the_previous_outline() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &twenty_functions());
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");

    write(dir.path(), &twenty_functions().replace("def f_5(", "def renamed("));
    let report = prime(&analyzer, dir.path(), "v1");
    let file = report.file(FILE).expect("analyzed");
    assert_eq!(file.strategy, Some(ParseStrategy::PartialReparse));
    assert_eq!(file.reason, Some(DecisionReason::LimitedChange));
    assert_eq!(file.build_mode, Some(BuildMode::Partial));
    assert_eq!(file.diff.as_ref().map(|diff| diff.changed_lines.clone()), Some(vec![6]));
    assert_eq!(report.partial_reparses, 1);

    let hit = analyzer.kernels().peek_kernel("svc", FILE).expect("stored");
    let names: Vec<&str> = hit.ast().symbol_names().collect();
    assert_eq!(names.len(), 20);
    assert!(names.contains(&"renamed"));
    assert!(!names.contains(&"f_5"));
}

#[test]
fn comment_only_edit_reuses_the_outline() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &twenty_functions());
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");
    let before = analyzer.kernels().peek_kernel("svc", FILE).expect("stored");

    write(dir.path(), &format!("# generated\n{}", twenty_functions()));
    let report = prime(&analyzer, dir.path(), "v1");
    let file = report.file(FILE).expect("analyzed");
    assert_eq!(file.status, FileStatus::Stored);
    assert_eq!(file.strategy, Some(ParseStrategy::ReuseAst));
    assert_eq!(file.reason, Some(DecisionReason::WhitespaceOnlyChange));
    assert_eq!(file.build_mode, None);

    let after = analyzer.kernels().peek_kernel("svc", FILE).expect("stored");
    assert!(Arc::ptr_eq(before.ast(), after.ast()));
    assert_ne!(before.entry.content_hash, after.entry.content_hash);

    // The reused outline was stored under the new hash.
    let report = prime(&analyzer, dir.path(), "v1");
    assert_eq!(report.cache_hits, 1);
}

#[test]
fn version_bump_reuses_unchanged_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &twenty_functions());
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");

    let report = prime(&analyzer, dir.path(), "v2");
    assert_eq!(report.cache_misses, 1);
    assert_eq!(report.reused, 1);

    let report = prime(&analyzer, dir.path(), "v2");
    assert_eq!(report.cache_hits, 1);
}

#[test]
fn invalidated_kernels_are_rebuilt_from_scratch() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &twenty_functions());
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");

    assert_eq!(analyzer.kernels().invalidate("svc", None), 1);
    write(dir.path(), &twenty_functions().replace("def f_5(", "def renamed("));
    let report = prime(&analyzer, dir.path(), "v1");
    let file = report.file(FILE).expect("analyzed");
    assert_eq!(file.strategy, Some(ParseStrategy::FullReparse));
    assert_eq!(file.reason, Some(DecisionReason::NoBaseline));
    assert_eq!(file.similarity, None);
}

#[test]
fn parses_are_reported_to_the_profiler() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &twenty_functions());
    let telemetry = Arc::new(RecordingTelemetry::new());
    let analyzer = LargeProjectAnalyzer::with_defaults()
        .with_profiler(HotspotProfiler::new(telemetry.clone()));

    prime(&analyzer, dir.path(), "v1");
    write(dir.path(), &twenty_functions().replace("def f_5(", "def renamed("));
    prime(&analyzer, dir.path(), "v1");

    let labels: Vec<String> = telemetry
        .hotspots()
        .into_iter()
        .map(|hotspot| hotspot.label)
        .collect();
    assert_eq!(labels, ["analyzer.full_parse", "analyzer.partial_reparse"]);
    let hotspots = telemetry.hotspots();
    assert_eq!(hotspots[1].metadata.get("file").map(String::as_str), Some(FILE));
}

#[test]
fn opening_a_string_hides_symbols_on_untouched_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), &format!("x = 1\ndef hidden(): pass\ny = 2\n{}", twenty_functions()));
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");

    let edited = format!("x = \"\"\"\ndef hidden(): pass\n\"\"\"\n{}", twenty_functions());
    write(dir.path(), &edited);
    let report = prime(&analyzer, dir.path(), "v1");
    let file = report.file(FILE).expect("analyzed");
    assert_eq!(file.status, FileStatus::Stored);
    assert_eq!(file.strategy, Some(ParseStrategy::PartialReparse));
    assert_eq!(file.diff.as_ref().map(|diff| diff.changed_lines.clone()), Some(vec![1, 3]));
    assert_eq!(file.build_mode, Some(BuildMode::Full));

    let stored = analyzer.kernels().peek_kernel("svc", FILE).expect("stored");
    let fresh = IndentOutlineBuilder
        .build("python", &edited)
        .expect("valid");
    assert_eq!(stored.ast().as_ref(), &fresh);
    assert!(!stored.ast().symbol_names().any(|name| name == "hidden"));
}

#[test]
fn byte_edits_lost_to_lossy_decoding_still_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(FILE), b"x = '\xff'\n").expect("write file");
    let analyzer = LargeProjectAnalyzer::with_defaults();
    prime(&analyzer, dir.path(), "v1");

    std::fs::write(dir.path().join(FILE), b"x = '\xfe'\n").expect("write file");
    let report = prime(&analyzer, dir.path(), "v1");
    assert_eq!(report.cache_hits, 0);
    assert_eq!(report.cache_misses, 1);
    assert_eq!(report.file(FILE).expect("analyzed").status, FileStatus::Stored);

    let report = prime(&analyzer, dir.path(), "v1");
    assert_eq!(report.cache_hits, 1);
}
