/// Configuration errors raised synchronously by [`MemoryGuard`](crate::MemoryGuard).
///
/// Admission refusals are not errors; they are reported as `false` from
/// [`MemoryGuard::reserve_allocation`](crate::MemoryGuard::reserve_allocation).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuardError {
    #[error("invalid memory limits: soft={soft} hard={hard} (both must be > 0 and soft <= hard)")]
    InvalidLimits { soft: u64, hard: u64 },

    #[error("memory pressure threshold must be in (0, 1], got {0}")]
    InvalidPressureThreshold(f64),
}
