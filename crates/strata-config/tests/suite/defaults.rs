use strata_config::{SamplerKind, StrataConfig};
use strata_memory::MB;

#[test]
fn empty_file_yields_defaults() {
    let (config, diagnostics) = StrataConfig::load_from_str_with_diagnostics("").expect("parse");
    assert_eq!(config, StrataConfig::default());
    assert!(diagnostics.is_empty(), "{diagnostics:?}");

    assert_eq!(config.cache.ast_cache_entries, 2_048);
    assert_eq!(config.cache.max_bytes(), 512 * MB);
    assert_eq!(config.cache.ast_cache_ttl_seconds, 3_600);
    assert_eq!(config.cache.failure_capacity, 5_000);
    assert_eq!(config.memory.soft_bytes(), 1_536 * MB);
    assert_eq!(config.memory.hard_bytes(), 2_048 * MB);
    assert_eq!(config.memory.sampler, SamplerKind::System);
    assert_eq!(config.incremental.delta_change_ratio_threshold, 0.15);
    assert_eq!(config.incremental.diff_sample_window, 512);
    assert_eq!(config.analyzer.max_parallel_parse_tasks, 8);
    assert!(config.analyzer.ignore_dirs.iter().any(|dir| dir == "node_modules"));
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.stderr);
}

#[test]
fn partial_tables_keep_remaining_defaults() {
    let text = r#"
[cache]
ast_cache_entries = 10

[memory]
sampler = "none"
"#;
    let (config, diagnostics) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");
    assert!(diagnostics.is_ok());
    assert_eq!(config.cache.ast_cache_entries, 10);
    assert_eq!(config.cache.ast_cache_ttl_seconds, 3_600);
    assert_eq!(config.memory.sampler, SamplerKind::None);
    assert_eq!(config.memory.pressure_threshold, 0.85);
}

#[test]
fn conversions_feed_the_runtime_types() {
    let text = r#"
[cache]
ast_cache_entries = 64
ast_cache_max_mb = 8
ast_cache_ttl_seconds = 0

[memory]
soft_limit_mb = 100
hard_limit_mb = 200
pressure_threshold = 0.5

[incremental]
delta_change_ratio_threshold = 0.3
diff_sample_window = 4
"#;
    let (config, _) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");

    let cache = config.cache_config();
    assert_eq!(cache.max_entries, 64);
    assert_eq!(cache.max_bytes, 8 * MB);
    assert_eq!(cache.ttl_seconds, 0);
    assert!(cache.validate().is_ok());

    let limits = config.guard_limits();
    assert_eq!(limits.soft_bytes, 100 * MB);
    assert_eq!(limits.hard_bytes, 200 * MB);
    assert_eq!(limits.pressure_threshold, 0.5);
    assert!(limits.validate().is_ok());

    let incremental = config.incremental_config();
    assert_eq!(incremental.delta_change_ratio_threshold, 0.3);
    assert_eq!(incremental.diff_sample_window, 4);
    assert!(incremental.validate().is_ok());
}

#[test]
fn loads_from_a_file_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("strata.toml");
    std::fs::write(&path, "[analyzer]\nmax_files = 3\n").expect("write config");

    let config = StrataConfig::load_from_path(&path).expect("load");
    assert_eq!(config.analyzer.max_files, Some(3));

    let (explicit, _) = StrataConfig::discover(Some(&path)).expect("discover");
    assert_eq!(explicit, config);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = StrataConfig::load_from_path(dir.path().join("absent.toml"))
        .expect_err("missing file must fail");
    assert!(matches!(err, strata_config::ConfigError::Io { .. }), "{err}");
}
