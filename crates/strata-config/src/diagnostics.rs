use serde::de::DeserializeOwned;
use std::fmt;

/// Combined diagnostics produced while loading and validating a Strata config.
///
/// Loading is best effort: callers always get a `StrataConfig` when the TOML
/// deserializes, plus whatever problems were found along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    /// Keys present in the input that the schema does not know about, as
    /// dotted paths (`cache.ast_cache_entires`).
    pub unknown_keys: Vec<String>,
    /// Recoverable issues; the config still applies.
    pub warnings: Vec<ConfigWarning>,
    /// Values that would make the caches refuse to start.
    pub errors: Vec<ConfigValidationError>,
}

impl ConfigDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_keys.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ConfigDiagnostics) {
        self.unknown_keys.extend(other.unknown_keys);
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    InvalidValue { toml_path: String, message: String },
    LoggingLevelInvalid { level: String, message: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::InvalidValue { toml_path, message } => {
                write!(f, "{toml_path}: {message}")
            }
            ConfigWarning::LoggingLevelInvalid { level, message } => {
                write!(f, "logging.level `{level}` is not a valid filter: {message}")
            }
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    InvalidValue { toml_path: String, message: String },
}

impl ConfigValidationError {
    pub(crate) fn invalid(toml_path: &str, message: impl fmt::Display) -> Self {
        ConfigValidationError::InvalidValue {
            toml_path: toml_path.to_owned(),
            message: message.to_string(),
        }
    }

    pub fn toml_path(&self) -> &str {
        match self {
            ConfigValidationError::InvalidValue { toml_path, .. } => toml_path,
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValidationError::InvalidValue { toml_path, message } => {
                write!(f, "{toml_path}: {message}")
            }
        }
    }
}

pub(crate) fn deserialize_toml_with_unknown_keys<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut unknown = Vec::<String>::new();
    let deserializer = toml::de::Deserializer::new(text);
    let value = serde_ignored::deserialize(deserializer, |path| {
        unknown.push(normalize_serde_ignored_path(path));
    })?;
    unknown.sort();
    unknown.dedup();
    Ok((value, unknown))
}

fn normalize_serde_ignored_path(path: serde_ignored::Path) -> String {
    // serde_ignored renders a leading `.` and sequence indices as `.0`.
    let raw = path.to_string();
    let raw = raw.trim_start_matches('.');
    raw.split('.')
        .enumerate()
        .fold(String::new(), |mut out, (idx, segment)| {
            let is_index =
                idx > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
            if is_index {
                out.push('[');
                out.push_str(segment);
                out.push(']');
                return out;
            }
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
            out
        })
}
