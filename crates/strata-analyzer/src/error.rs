use std::path::PathBuf;
use strata_cache::CacheError;
use strata_config::ConfigError;
use strata_incremental::IncrementalError;

/// Errors that abort a whole analyzer call.
///
/// Per-file problems never surface here; they are reported inside the
/// [`AnalyzerReport`](crate::AnalyzerReport).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{language} parse error in {}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        language: String,
        message: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Incremental(#[from] IncrementalError),

    #[error("project root {} does not exist or is not a directory", .0.display())]
    RootNotFound(PathBuf),
}
