use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use strata_analyzer::{AnalyzerError, FailureReason, FileStatus, LargeProjectAnalyzer, PrimeRequest};
use strata_config::{ByteSize, ConfigError, SamplerKind, StrataConfig};

fn config() -> StrataConfig {
    let mut config = StrataConfig::default();
    config.memory.sampler = SamplerKind::None;
    config
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dirs");
    }
    std::fs::write(path, contents).expect("write file");
}

#[test]
fn guard_refusals_are_reported_as_rejections() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.py", "def a():\n    pass\n");
    write(dir.path(), "b.py", "def b():\n    pass\n");

    let mut config = config();
    config.memory.soft_limit = Some(ByteSize(32));
    config.memory.hard_limit = Some(ByteSize(64));
    let analyzer = LargeProjectAnalyzer::from_config(&config).expect("valid config");

    let report = analyzer
        .prime_cache(&PrimeRequest::new("tiny", dir.path(), "v1"))
        .expect("run completes");
    assert_eq!(report.rejected, 2);
    assert_eq!(report.stored, 0);
    assert_eq!(report.cache_misses, 2);
    assert!(report
        .failures
        .iter()
        .all(|failure| failure.reason == FailureReason::CacheRejection));
    assert_eq!(report.file("a.py").map(|file| file.status), Some(FileStatus::Rejected));
    assert_eq!(report.cache_stats.entries, 0);
    assert_eq!(analyzer.kernels().guard().get_stats().tracked_entries, 0);
}

#[test]
fn failure_ring_is_bounded_by_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in ["x.py", "y.py", "z.py"] {
        write(dir.path(), name, "class Broken(\n");
    }
    let mut config = config();
    config.cache.failure_capacity = 2;
    let analyzer = LargeProjectAnalyzer::from_config(&config).expect("valid config");

    let report = analyzer
        .prime_cache(&PrimeRequest::new("ring", dir.path(), "v1"))
        .expect("run completes");
    assert_eq!(report.failures.len(), 3);

    let recorded = analyzer.kernels().get_failure_report(None);
    let files: Vec<&str> = recorded.iter().map(|record| record.file_path.as_str()).collect();
    assert_eq!(files, ["y.py", "z.py"]);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = config();
    config.cache.ast_cache_entries = 0;
    config.analyzer.max_parallel_parse_tasks = 0;

    match LargeProjectAnalyzer::from_config(&config) {
        Err(AnalyzerError::Config(ConfigError::Invalid(errors))) => assert_eq!(errors.len(), 2),
        other => panic!("expected invalid config, got {other:?}"),
    }
}

#[test]
fn apply_config_updates_components_atomically() {
    let dir = tempfile::tempdir().expect("tempdir");
    for index in 0..4 {
        write(dir.path(), &format!("m{index}.py"), "x = 1\n");
    }
    write(dir.path(), "vendor/lib.py", "y = 2\n");
    let analyzer = LargeProjectAnalyzer::from_config(&config()).expect("valid config");

    let mut broken = config();
    broken.incremental.delta_change_ratio_threshold = 1.5;
    assert!(analyzer.apply_config(&broken).is_err());
    assert_eq!(analyzer.incremental().config().delta_change_ratio_threshold, 0.15);

    let mut updated = config();
    updated.cache.ast_cache_entries = 3;
    updated.cache.ast_cache_max_mb = 64;
    updated.incremental.delta_change_ratio_threshold = 0.5;
    updated.analyzer.max_files = Some(2);
    updated.analyzer.ignore_dirs.push("vendor".to_owned());
    analyzer.apply_config(&updated).expect("valid config");

    let stats = analyzer.kernels().cache().stats();
    assert_eq!(stats.max_entries, 3);
    assert_eq!(stats.max_bytes, 64 * strata_memory::MB);
    assert_eq!(analyzer.incremental().config().delta_change_ratio_threshold, 0.5);

    let report = analyzer
        .prime_cache(&PrimeRequest::new("cfg", dir.path(), "v1"))
        .expect("run completes");
    assert_eq!(report.total_files, 2);
    assert!(report.file("vendor/lib.py").is_none());

    let report = analyzer
        .prime_cache(&PrimeRequest::new("cfg", dir.path(), "v1").max_files(10))
        .expect("run completes");
    assert_eq!(report.total_files, 4);
}

#[test]
fn plan_for_root_does_not_touch_the_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "index.tsx", "export function App() {\n  return null;\n}\n");
    let analyzer = LargeProjectAnalyzer::with_defaults();
    let before = analyzer.kernels().cache().stats();

    let plan = analyzer.plan_for_root(dir.path(), None).expect("plan");
    assert_eq!(plan.domain, strata_domain::DomainKind::Frontend);
    assert_eq!(analyzer.kernels().cache().stats(), before);
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn configured_analyzer_logs_parse_hotspots() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a.py", "def a():\n    pass\n");
    let analyzer = LargeProjectAnalyzer::from_config(&config()).expect("valid config");

    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        analyzer
            .prime_cache(&PrimeRequest::new("hot", dir.path(), "v1"))
            .expect("run completes");
    });

    let output = String::from_utf8(captured.0.lock().expect("log buffer").clone()).expect("utf-8 logs");
    let hotspot = output
        .lines()
        .find(|line| line.contains("strata.telemetry"))
        .expect("hotspot event");
    assert!(hotspot.contains("analyzer.full_parse"));
}
