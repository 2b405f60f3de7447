#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IncrementalError {
    #[error("delta change ratio threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("diff sample window must hold at least one file")]
    InvalidWindow,
}
