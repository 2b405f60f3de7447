//! TOML configuration and logging setup for Strata.
//!
//! Every table is optional and every key has a default, so an empty file (or
//! no file at all) yields [`StrataConfig::default`]. Loading reports unknown
//! keys and semantic problems as [`ConfigDiagnostics`] instead of failing; only
//! unreadable files and malformed TOML are hard errors.
//!
//! ```toml
//! [cache]
//! ast_cache_entries = 4096
//! ast_cache_max_bytes = "1GiB"
//!
//! [memory]
//! soft_limit_mb = 1024
//! hard_limit = "2GB"
//! sampler = "none"
//!
//! [logging]
//! level = "strata.cache=debug,info"
//! ```

mod diagnostics;
mod logging;
mod validation;

pub use diagnostics::{ConfigDiagnostics, ConfigValidationError, ConfigWarning};
pub use logging::{init_tracing, LoggingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strata_cache::AstCacheConfig;
use strata_incremental::IncrementalConfig;
use strata_memory::{
    GuardLimits, NoSystemSampler, PolledSampler, SysinfoSampler, SystemMemorySampler, MB,
};
use thiserror::Error;

/// Environment variable naming a config file to load when none is passed
/// explicitly.
pub const CONFIG_PATH_ENV: &str = "STRATA_CONFIG_PATH";

/// A byte size which accepts both raw byte counts and human-friendly strings
/// (`"512MiB"`, `"2GB"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Human(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bytes(value) => Ok(ByteSize(value)),
            Repr::Human(value) => strata_memory::parse_byte_size(&value)
                .map(ByteSize)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// `[cache]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ast_cache_entries: usize,
    pub ast_cache_max_mb: u64,
    /// Takes precedence over `ast_cache_max_mb` when set.
    pub ast_cache_max_bytes: Option<ByteSize>,
    /// `0` disables expiry.
    pub ast_cache_ttl_seconds: u64,
    /// Number of parse failures retained for reports.
    pub failure_capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ast_cache_entries: 2_048,
            ast_cache_max_mb: 512,
            ast_cache_max_bytes: None,
            ast_cache_ttl_seconds: 3_600,
            failure_capacity: strata_cache::DEFAULT_FAILURE_CAPACITY,
        }
    }
}

impl CacheSection {
    pub fn max_bytes(&self) -> u64 {
        match self.ast_cache_max_bytes {
            Some(ByteSize(bytes)) => bytes,
            None => self.ast_cache_max_mb.saturating_mul(MB),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    /// Host memory usage via `sysinfo`, polled at `sample_interval_ms`.
    #[default]
    System,
    /// No system signal; only the guard's own ledger counts.
    None,
}

/// `[memory]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub soft_limit_mb: u64,
    pub hard_limit_mb: u64,
    /// Takes precedence over `soft_limit_mb` when set.
    pub soft_limit: Option<ByteSize>,
    /// Takes precedence over `hard_limit_mb` when set.
    pub hard_limit: Option<ByteSize>,
    pub pressure_threshold: f64,
    pub sampler: SamplerKind,
    pub sample_interval_ms: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            soft_limit_mb: 1_536,
            hard_limit_mb: 2_048,
            soft_limit: None,
            hard_limit: None,
            pressure_threshold: 0.85,
            sampler: SamplerKind::System,
            sample_interval_ms: 1_000,
        }
    }
}

impl MemorySection {
    pub fn soft_bytes(&self) -> u64 {
        match self.soft_limit {
            Some(ByteSize(bytes)) => bytes,
            None => self.soft_limit_mb.saturating_mul(MB),
        }
    }

    pub fn hard_bytes(&self) -> u64 {
        match self.hard_limit {
            Some(ByteSize(bytes)) => bytes,
            None => self.hard_limit_mb.saturating_mul(MB),
        }
    }

    pub fn guard_limits(&self) -> GuardLimits {
        GuardLimits {
            soft_bytes: self.soft_bytes(),
            hard_bytes: self.hard_bytes(),
            pressure_threshold: self.pressure_threshold,
        }
    }

    pub fn sampler(&self) -> Arc<dyn SystemMemorySampler> {
        match self.sampler {
            SamplerKind::System => Arc::new(PolledSampler::new(
                SysinfoSampler::new(),
                Duration::from_millis(self.sample_interval_ms),
            )),
            SamplerKind::None => Arc::new(NoSystemSampler),
        }
    }
}

/// `[incremental]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalSection {
    pub delta_change_ratio_threshold: f64,
    pub diff_sample_window: usize,
}

impl Default for IncrementalSection {
    fn default() -> Self {
        let defaults = IncrementalConfig::default();
        Self {
            delta_change_ratio_threshold: defaults.delta_change_ratio_threshold,
            diff_sample_window: defaults.diff_sample_window,
        }
    }
}

/// `[analyzer]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSection {
    /// Upper bound on the worker count a specialization plan may request.
    pub max_parallel_parse_tasks: usize,
    /// Stop enumerating after this many files.
    pub max_files: Option<usize>,
    /// Directory names skipped at any depth during enumeration.
    pub ignore_dirs: Vec<String>,
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            max_parallel_parse_tasks: 8,
            max_files: None,
            ignore_dirs: [
                ".git",
                "node_modules",
                "target",
                "__pycache__",
                ".venv",
                "dist",
                "build",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub cache: CacheSection,
    pub memory: MemorySection,
    pub incremental: IncrementalSection,
    pub analyzer: AnalyzerSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn join_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` embeds a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl StrataConfig {
    /// Load a config file without diagnostics. Unknown keys are ignored.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = read_config(path.as_ref())?;
        Ok(toml::from_str(&text)?)
    }

    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let text = read_config(path.as_ref())?;
        Self::load_from_str_with_diagnostics(&text)
    }

    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<StrataConfig>(text)?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.merge(config.validate());
        if !diagnostics.unknown_keys.is_empty() {
            tracing::warn!(
                target: "strata.config",
                keys = ?diagnostics.unknown_keys,
                "ignoring unknown config keys"
            );
        }

        Ok((config, diagnostics))
    }

    /// Resolve the config to use: `explicit` when given, otherwise the file
    /// named by `STRATA_CONFIG_PATH`, otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                tracing::debug!(target: "strata.config", path = %path.display(), "loading config");
                Self::load_from_path_with_diagnostics(path)
            }
            None => Ok((Self::default(), ConfigDiagnostics::default())),
        }
    }

    /// Fails with every validation error when the config cannot be applied.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let diagnostics = self.validate();
        if diagnostics.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(diagnostics.errors))
        }
    }

    pub fn guard_limits(&self) -> GuardLimits {
        self.memory.guard_limits()
    }

    pub fn cache_config(&self) -> AstCacheConfig {
        AstCacheConfig {
            max_entries: self.cache.ast_cache_entries,
            max_bytes: self.cache.max_bytes(),
            ttl_seconds: self.cache.ast_cache_ttl_seconds,
        }
    }

    pub fn incremental_config(&self) -> IncrementalConfig {
        IncrementalConfig {
            delta_change_ratio_threshold: self.incremental.delta_change_ratio_threshold,
            diff_sample_window: self.incremental.diff_sample_window,
        }
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
