use crate::diagnostics::{ConfigDiagnostics, ConfigValidationError, ConfigWarning};
use crate::{LoggingConfig, StrataConfig};

impl StrataConfig {
    /// Check semantic invariants, reporting every problem found in one pass.
    ///
    /// The returned diagnostics never contain unknown keys; those are only
    /// known while parsing.
    #[must_use]
    pub fn validate(&self) -> ConfigDiagnostics {
        let mut out = ConfigDiagnostics::default();

        validate_cache(self, &mut out);
        validate_memory(self, &mut out);
        validate_incremental(self, &mut out);
        validate_analyzer(self, &mut out);
        validate_logging(self, &mut out);

        out
    }
}

fn validate_cache(config: &StrataConfig, out: &mut ConfigDiagnostics) {
    if config.cache.ast_cache_entries == 0 {
        out.errors.push(ConfigValidationError::invalid(
            "cache.ast_cache_entries",
            "must be at least 1",
        ));
    }
    if config.cache.max_bytes() == 0 {
        let path = if config.cache.ast_cache_max_bytes.is_some() {
            "cache.ast_cache_max_bytes"
        } else {
            "cache.ast_cache_max_mb"
        };
        out.errors
            .push(ConfigValidationError::invalid(path, "must be at least 1"));
    }
    if config.cache.failure_capacity == 0 {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "cache.failure_capacity".to_owned(),
            message: "parse failures will not be retained for reports".to_owned(),
        });
    }
}

fn validate_memory(config: &StrataConfig, out: &mut ConfigDiagnostics) {
    let limits = config.guard_limits();
    if let Err(err) = limits.validate() {
        let path = if limits.soft_bytes > 0
            && limits.hard_bytes > 0
            && limits.soft_bytes <= limits.hard_bytes
        {
            "memory.pressure_threshold"
        } else {
            "memory.soft_limit_mb"
        };
        out.errors.push(ConfigValidationError::invalid(path, err));
    }
    if config.memory.sample_interval_ms == 0 {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "memory.sample_interval_ms".to_owned(),
            message: "system memory will be sampled on every cache admission".to_owned(),
        });
    }
}

fn validate_incremental(config: &StrataConfig, out: &mut ConfigDiagnostics) {
    let threshold = config.incremental.delta_change_ratio_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        out.errors.push(ConfigValidationError::invalid(
            "incremental.delta_change_ratio_threshold",
            format!("must be within [0, 1], got {threshold}"),
        ));
    }
    if config.incremental.diff_sample_window == 0 {
        out.errors.push(ConfigValidationError::invalid(
            "incremental.diff_sample_window",
            "must be at least 1",
        ));
    }
}

fn validate_analyzer(config: &StrataConfig, out: &mut ConfigDiagnostics) {
    if config.analyzer.max_parallel_parse_tasks == 0 {
        out.errors.push(ConfigValidationError::invalid(
            "analyzer.max_parallel_parse_tasks",
            "must be at least 1",
        ));
    }
    if config.analyzer.max_files == Some(0) {
        out.warnings.push(ConfigWarning::InvalidValue {
            toml_path: "analyzer.max_files".to_owned(),
            message: "no files will be analyzed".to_owned(),
        });
    }
}

fn validate_logging(config: &StrataConfig, out: &mut ConfigDiagnostics) {
    let normalized = LoggingConfig::canonical_directives(&config.logging.level);
    if config.logging.level.trim().is_empty() {
        return;
    }
    if let Err(err) = tracing_subscriber::EnvFilter::try_new(normalized) {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            level: config.logging.level.clone(),
            message: err.to_string(),
        });
    }
}
