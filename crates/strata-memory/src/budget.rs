use crate::error::GuardError;
use serde::{Deserialize, Serialize};

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;
pub const GB: u64 = 1024 * MB;

/// Base limits for a [`MemoryGuard`](crate::MemoryGuard), before any
/// per-request context scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardLimits {
    /// Usage above this triggers reclaim.
    pub soft_bytes: u64,
    /// Usage may never exceed this.
    pub hard_bytes: u64,
    /// Fraction of system memory in use at which reclaim is forced even below
    /// the soft limit.
    pub pressure_threshold: f64,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            soft_bytes: 1_536 * MB,
            hard_bytes: 2_048 * MB,
            pressure_threshold: 0.85,
        }
    }
}

impl GuardLimits {
    pub fn from_mb(soft_mb: u64, hard_mb: u64) -> Self {
        Self {
            soft_bytes: soft_mb.saturating_mul(MB),
            hard_bytes: hard_mb.saturating_mul(MB),
            ..Self::default()
        }
    }

    pub fn with_pressure_threshold(mut self, threshold: f64) -> Self {
        self.pressure_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        if self.soft_bytes == 0 || self.hard_bytes == 0 || self.soft_bytes > self.hard_bytes {
            return Err(GuardError::InvalidLimits {
                soft: self.soft_bytes,
                hard: self.hard_bytes,
            });
        }
        if !self.pressure_threshold.is_finite()
            || self.pressure_threshold <= 0.0
            || self.pressure_threshold > 1.0
        {
            return Err(GuardError::InvalidPressureThreshold(self.pressure_threshold));
        }
        Ok(())
    }
}

/// Parse a human-friendly byte size such as `512MiB`, `2GB`, `1.5g` or `4096`.
///
/// Decimal and binary suffixes are both treated as powers of 1024.
pub fn parse_byte_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("byte size must not be empty".to_owned());
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid byte size `{trimmed}`"))?;

    let multiplier = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => KB,
        "m" | "mb" | "mib" => MB,
        "g" | "gb" | "gib" => GB,
        "t" | "tb" | "tib" => GB * 1024,
        other => return Err(format!("unknown byte size suffix `{other}`")),
    };

    let bytes = number * multiplier as f64;
    if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
        return Err(format!("byte size `{trimmed}` is out of range"));
    }
    Ok(bytes.round() as u64)
}
