use strata_config::{ConfigError, ConfigValidationError, ConfigWarning, StrataConfig};

#[test]
fn unknown_keys_are_reported_with_full_paths() {
    let text = r#"
colour = "blue"

[cache]
ast_cache_entires = 10
"#;
    let (config, diagnostics) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");
    assert_eq!(diagnostics.unknown_keys, vec!["cache.ast_cache_entires", "colour"]);
    assert!(diagnostics.is_ok());
    assert_eq!(config.cache.ast_cache_entries, 2_048);
}

#[test]
fn inverted_limits_are_errors() {
    let text = r#"
[memory]
soft_limit_mb = 512
hard_limit_mb = 256
"#;
    let (config, diagnostics) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");
    assert!(!diagnostics.is_ok());
    assert_eq!(diagnostics.errors.len(), 1);
    assert_eq!(diagnostics.errors[0].toml_path(), "memory.soft_limit_mb");

    let err = config.ensure_valid().expect_err("inverted limits");
    assert!(matches!(err, ConfigError::Invalid(ref errors) if errors.len() == 1));
}

#[test]
fn every_problem_is_reported_in_one_pass() {
    let text = r#"
[cache]
ast_cache_entries = 0

[memory]
pressure_threshold = 1.5

[incremental]
delta_change_ratio_threshold = -0.1
diff_sample_window = 0

[analyzer]
max_parallel_parse_tasks = 0
"#;
    let (_, diagnostics) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");
    let paths: Vec<&str> = diagnostics
        .errors
        .iter()
        .map(ConfigValidationError::toml_path)
        .collect();
    assert_eq!(
        paths,
        vec![
            "cache.ast_cache_entries",
            "memory.pressure_threshold",
            "incremental.delta_change_ratio_threshold",
            "incremental.diff_sample_window",
            "analyzer.max_parallel_parse_tasks",
        ]
    );
}

#[test]
fn recoverable_values_are_warnings() {
    let text = r#"
[cache]
failure_capacity = 0

[analyzer]
max_files = 0

[logging]
level = "strata.cache=loud"
"#;
    let (_, diagnostics) = StrataConfig::load_from_str_with_diagnostics(text).expect("parse");
    assert!(diagnostics.is_ok());
    assert_eq!(diagnostics.warnings.len(), 3);
    assert!(diagnostics
        .warnings
        .iter()
        .any(|warning| matches!(warning, ConfigWarning::LoggingLevelInvalid { .. })));
}

#[test]
fn malformed_toml_is_a_hard_error() {
    let err = StrataConfig::load_from_str_with_diagnostics("[cache\n").expect_err("malformed");
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn unknown_sampler_is_rejected_at_parse_time() {
    let err = StrataConfig::load_from_str_with_diagnostics("[memory]\nsampler = \"psychic\"\n")
        .expect_err("unknown sampler");
    assert!(matches!(err, ConfigError::Toml(_)));
}
