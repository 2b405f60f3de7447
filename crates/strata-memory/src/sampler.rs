use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Source of the host-wide memory usage signal.
///
/// Implementations must be cheap enough to call on every cache admission, or be
/// wrapped in a [`PolledSampler`]. They cannot fail: a sampler that has no data
/// reports `0.0` ("no pressure").
pub trait SystemMemorySampler: Send + Sync {
    /// Fraction of system memory currently in use, in `[0, 1]`.
    fn current_system_memory_fraction(&self) -> f64;
}

/// Sampler used when no system signal is available. Always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSystemSampler;

impl SystemMemorySampler for NoSystemSampler {
    fn current_system_memory_fraction(&self) -> f64 {
        0.0
    }
}

/// Sampler with a caller-controlled value, for tests and embedding hosts that
/// already track memory usage themselves.
#[derive(Debug, Default)]
pub struct ManualSampler {
    bits: AtomicU64,
}

impl ManualSampler {
    pub fn new(fraction: f64) -> Self {
        Self {
            bits: AtomicU64::new(fraction.to_bits()),
        }
    }

    pub fn set(&self, fraction: f64) {
        self.bits.store(fraction.to_bits(), Ordering::Relaxed);
    }
}

impl SystemMemorySampler for ManualSampler {
    fn current_system_memory_fraction(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Reads `used / total` memory from the operating system via `sysinfo`.
pub struct SysinfoSampler {
    system: Mutex<sysinfo::System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSampler").finish_non_exhaustive()
    }
}

impl SystemMemorySampler for SysinfoSampler {
    fn current_system_memory_fraction(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        system.used_memory() as f64 / total as f64
    }
}

/// Rate-limits an inner sampler: at most one real sample per `interval`, with
/// the last value served in between.
pub struct PolledSampler<S> {
    inner: S,
    interval: Duration,
    last: Mutex<Option<(Instant, f64)>>,
}

impl<S: SystemMemorySampler> PolledSampler<S> {
    pub fn new(inner: S, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }
}

impl<S: SystemMemorySampler> SystemMemorySampler for PolledSampler<S> {
    fn current_system_memory_fraction(&self) -> f64 {
        let mut last = self.last.lock();
        if let Some((at, value)) = *last {
            if at.elapsed() < self.interval {
                return value;
            }
        }
        let value = self.inner.current_system_memory_fraction();
        *last = Some((Instant::now(), value));
        value
    }
}

impl<S> std::fmt::Debug for PolledSampler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = *self.last.lock();
        f.debug_struct("PolledSampler")
            .field("interval", &self.interval)
            .field("last", &last.map(|(_, value)| value))
            .finish_non_exhaustive()
    }
}

/// Clamp a sampler reading into `[0, 1]`; non-finite readings degrade to zero.
pub(crate) fn sanitize_fraction(raw: f64) -> f64 {
    if raw.is_finite() {
        return raw.clamp(0.0, 1.0);
    }
    static REPORTED: OnceLock<()> = OnceLock::new();
    if REPORTED.set(()).is_ok() {
        tracing::warn!(
            target: "strata.memory",
            value = raw,
            "system memory sampler returned a non-finite value; treating as no pressure"
        );
    }
    0.0
}
