use strata_memory::GuardError;

/// Errors raised synchronously when configuring a cache.
///
/// Admission refusals are not errors; stores report them through their return
/// value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache configuration for `{field}`: {message}")]
    InvalidConfiguration { field: &'static str, message: String },

    #[error(transparent)]
    Guard(#[from] GuardError),
}
