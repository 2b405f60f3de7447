use std::path::Path;
use strata_analyzer::{FailureReason, FileStatus, LargeProjectAnalyzer, PrimeRequest};
use strata_domain::DomainKind;
use strata_incremental::ParseStrategy;
use strata_memory::Priority;

fn python_module(index: usize) -> String {
    format!(
        "import os\n\n\ndef handler_{index}(request):\n    return os.path.join(\"a\", str({index}))\n\n\nclass Service{index}:\n    def run(self):\n        return handler_{index}(None)\n"
    )
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dirs");
    }
    std::fs::write(path, contents).expect("write file");
}

fn python_project(root: &Path, files: usize) {
    for index in 0..files {
        write(root, &format!("pkg/module_{index:02}.py"), &python_module(index));
    }
}

#[test]
fn second_run_over_unchanged_project_is_all_hits() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 50);
    let analyzer = LargeProjectAnalyzer::with_defaults();
    let request = PrimeRequest::new("demo", dir.path(), "v1");

    let first = analyzer.prime_cache(&request).expect("first run");
    assert_eq!(first.total_files, 50);
    assert_eq!(first.processed, 50);
    assert_eq!(first.cache_hits, 0);
    assert_eq!(first.cache_misses, 50);
    assert_eq!(first.full_parses, 50);
    assert_eq!(first.stored, 50);
    assert!(first.failures.is_empty());
    assert_eq!(first.plan.domain, DomainKind::Backend);
    assert_eq!(first.priority, Priority::High);

    let module = first.file("pkg/module_07.py").expect("analyzed");
    assert_eq!(module.status, FileStatus::Stored);
    assert_eq!(module.strategy, Some(ParseStrategy::FullReparse));
    assert_eq!(module.symbols, 3);

    let second = analyzer.prime_cache(&request).expect("second run");
    assert_eq!(second.cache_hits, 50);
    assert_eq!(second.cache_misses, 0);
    assert!(second.failures.is_empty());
    assert!(second.files.iter().all(|file| file.status == FileStatus::CacheHit));
    assert_eq!(second.cache_stats.entries, 50);
}

#[test]
fn changing_one_file_misses_only_that_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 50);
    let analyzer = LargeProjectAnalyzer::with_defaults();
    let request = PrimeRequest::new("demo", dir.path(), "v1");
    analyzer.prime_cache(&request).expect("first run");

    write(
        dir.path(),
        "pkg/module_03.py",
        "def replaced():\n    return 3\n",
    );
    let report = analyzer.prime_cache(&request).expect("second run");
    assert_eq!(report.cache_hits, 49);
    assert_eq!(report.cache_misses, 1);

    let changed = report.file("pkg/module_03.py").expect("analyzed");
    assert_eq!(changed.status, FileStatus::Stored);
    assert_eq!(changed.strategy, Some(ParseStrategy::FullReparse));
    assert!(changed.similarity.is_some());
    assert_eq!(changed.symbols, 1);
}

#[test]
fn broken_file_is_reported_without_aborting_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 5);
    write(dir.path(), "pkg/broken.py", "def broken(:\n    return 1\n");
    let analyzer = LargeProjectAnalyzer::with_defaults();

    let report = analyzer
        .prime_cache(&PrimeRequest::new("demo", dir.path(), "v1"))
        .expect("run completes");
    assert_eq!(report.processed, 6);
    assert_eq!(report.stored, 5);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.file_path, "pkg/broken.py");
    assert_eq!(failure.reason, FailureReason::ParseError);
    assert!(failure.error.contains("python parse error"), "{}", failure.error);

    let recorded = analyzer.kernels().get_failure_report(None);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].file_path, "pkg/broken.py");
    assert_eq!(recorded[0].metadata.get("reason").map(String::as_str), Some("parse_error"));
    assert!(analyzer.kernels().peek_kernel("demo", "pkg/broken.py").is_none());
}

#[test]
fn missing_explicit_files_are_io_failures() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 2);
    let analyzer = LargeProjectAnalyzer::with_defaults();

    let request = PrimeRequest::new("demo", dir.path(), "v1").files(vec![
        "pkg/module_00.py".into(),
        "pkg/vanished.py".into(),
    ]);
    let report = analyzer.prime_cache(&request).expect("run completes");
    assert_eq!(report.processed, 2);
    assert_eq!(report.stored, 1);
    // Read failures count as neither hits nor misses.
    assert_eq!(report.cache_hits + report.cache_misses, 1);

    let vanished = report.file("pkg/vanished.py").expect("reported");
    assert_eq!(vanished.status, FileStatus::IoError);
    assert_eq!(report.failures[0].reason, FailureReason::IoError);
}

#[test]
fn missing_root_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let analyzer = LargeProjectAnalyzer::with_defaults();
    let err = analyzer
        .prime_cache(&PrimeRequest::new("demo", dir.path().join("nope"), "v1"))
        .expect_err("root does not exist");
    assert!(matches!(err, strata_analyzer::AnalyzerError::RootNotFound(_)));
}

#[test]
fn domain_override_and_language_filter() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 3);
    write(dir.path(), "docs/guide.md", "# Guide\n\n## Install\n");
    write(dir.path(), "web/app.ts", "export function main() {\n  return 1;\n}\n");
    let analyzer = LargeProjectAnalyzer::with_defaults();

    let request = PrimeRequest::new("demo", dir.path(), "v1")
        .domain(DomainKind::Docs)
        .language("markdown");
    let report = analyzer.prime_cache(&request).expect("run completes");
    assert_eq!(report.plan.domain, DomainKind::Docs);
    assert_eq!(report.priority, Priority::Low);
    assert_eq!(report.total_files, 1);
    assert_eq!(report.file("docs/guide.md").map(|file| file.symbols), Some(2));
}

#[test]
fn report_serializes_to_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    python_project(dir.path(), 1);
    let analyzer = LargeProjectAnalyzer::with_defaults();
    let report = analyzer
        .prime_cache(&PrimeRequest::new("demo", dir.path(), "v1"))
        .expect("run completes");

    let json = serde_json::to_value(&report).expect("serializable");
    assert_eq!(json["project_id"], "demo");
    assert_eq!(json["plan"]["domain"], "backend");
    assert_eq!(json["files"][0]["status"], "stored");
    assert_eq!(json["files"][0]["strategy"], "full_reparse");
}
