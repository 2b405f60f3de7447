use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// `[logging]` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A simple level (`info`, `debug`, ...) or a full `EnvFilter` directive
    /// string such as `strata.cache=debug,info`.
    pub level: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    pub stderr: bool,
    /// Append events to this file in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    /// Plain level names are lowercased and `warning` becomes `warn`. Any
    /// other text is taken to be a directive list and only trimmed.
    pub(crate) fn canonical_directives(input: &str) -> String {
        let level = input.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        let lower = level.to_ascii_lowercase();
        match lower.as_str() {
            "warning" => "warn".to_owned(),
            "trace" | "debug" | "info" | "warn" | "error" => lower,
            _ => level.to_owned(),
        }
    }

    /// Filter from `level` alone, or `info` when it does not parse.
    fn level_filter(&self) -> EnvFilter {
        EnvFilter::try_new(Self::canonical_directives(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Filter used by [`init_tracing`].
    ///
    /// `RUST_LOG` is appended to the configured directives so its entries win
    /// on conflict. If the merged list is rejected, `RUST_LOG` is tried on its
    /// own before settling for [`Self::level_filter`].
    pub fn env_filter(&self) -> EnvFilter {
        let Some(from_env) = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
        else {
            return self.level_filter();
        };
        let from_env = from_env.trim();
        let configured = Self::canonical_directives(&self.level);
        EnvFilter::try_new(format!("{configured},{from_env}"))
            .or_else(|_| EnvFilter::try_new(from_env))
            .unwrap_or_else(|_| self.level_filter())
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber described by `config`.
///
/// Only the first call in a process has an effect; later calls (and calls made
/// after some other subscriber was installed) return `false`.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;

    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        let mut file_open_error = None;
        let file = config.file.as_ref().and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| file_open_error = Some((path.clone(), err)))
                .ok()
        });

        let mut make_writer = BoxMakeWriter::new(std::io::sink);
        if config.stderr {
            // Test harness capture only sees writes routed through `TestWriter`.
            if cfg!(debug_assertions) {
                make_writer = BoxMakeWriter::new(
                    make_writer.and(tracing_subscriber::fmt::writer::TestWriter::with_stderr),
                );
            } else {
                make_writer = BoxMakeWriter::new(make_writer.and(std::io::stderr));
            }
        }
        if let Some(file) = file {
            make_writer = BoxMakeWriter::new(make_writer.and(Mutex::new(file)));
        }

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.json {
            tracing::subscriber::set_global_default(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(make_writer)
                        .with_ansi(false),
                ),
            )
        } else {
            tracing::subscriber::set_global_default(
                registry.with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(make_writer)
                        .with_ansi(false),
                ),
            )
        };
        installed = result.is_ok();

        if let (true, Some((path, err))) = (installed, file_open_error) {
            tracing::warn!(
                target: "strata.config",
                path = %path.display(),
                error = %err,
                "failed to open log file; logging to remaining sinks only"
            );
        }
    });

    installed
}
