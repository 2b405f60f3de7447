use crate::budget::{GuardLimits, GB};
use crate::context::{MemoryGuardContext, Priority};
use crate::error::GuardError;
use crate::pressure::{MemoryPressure, MemoryPressureThresholds};
use crate::sampler::{sanitize_fraction, NoSystemSampler, SystemMemorySampler};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Projects this large (or larger) get the full soft-limit boost.
const LARGE_PROJECT_BYTES: u64 = 8 * GB;
/// Maximum soft-limit boost from project size (+100%).
const MAX_PROJECT_BOOST: f64 = 1.0;
const LOW_PRIORITY_FACTOR: f64 = 0.85;
const HIGH_PRIORITY_FACTOR: f64 = 1.15;
/// High priority may never push the soft limit above this fraction of the hard limit.
const HIGH_PRIORITY_CEILING: f64 = 0.98;
/// Under system pressure at least this fraction of the soft limit is reclaimed.
const PRESSURE_RECLAIM_FLOOR: f64 = 0.10;

/// Point-in-time view of the guard's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuardStats {
    pub tracked_entries: usize,
    pub allocated_bytes: u64,
    pub soft_limit: u64,
    pub hard_limit: u64,
    pub system_pressure: f64,
    pub pressure: MemoryPressure,
}

#[derive(Debug, Default)]
struct Ledger {
    allocations: HashMap<String, u64>,
    allocated_bytes: u64,
}

impl Ledger {
    fn baseline_excluding(&self, key: Option<&str>) -> u64 {
        let prior = key
            .and_then(|key| self.allocations.get(key))
            .copied()
            .unwrap_or(0);
        self.allocated_bytes.saturating_sub(prior)
    }
}

struct Inner {
    limits: RwLock<GuardLimits>,
    thresholds: MemoryPressureThresholds,
    ledger: Mutex<Ledger>,
    sampler: Arc<dyn SystemMemorySampler>,
}

/// Admission control for named, sized allocations.
///
/// Cloning is cheap and every clone shares the same ledger, so one guard can
/// back several caches. All ledger mutations are serialized by a single lock;
/// a refused reservation leaves the ledger untouched.
///
/// The system sampler is consulted *before* the ledger lock is taken, so a
/// slow sampler never stalls other callers.
#[derive(Clone)]
pub struct MemoryGuard {
    inner: Arc<Inner>,
}

impl MemoryGuard {
    pub fn new(limits: GuardLimits) -> Result<Self, GuardError> {
        Self::with_sampler(limits, Arc::new(NoSystemSampler))
    }

    pub fn with_sampler(
        limits: GuardLimits,
        sampler: Arc<dyn SystemMemorySampler>,
    ) -> Result<Self, GuardError> {
        limits.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                limits: RwLock::new(limits),
                thresholds: MemoryPressureThresholds::default(),
                ledger: Mutex::new(Ledger::default()),
                sampler,
            }),
        })
    }

    /// Base (unscaled) limits.
    pub fn limits(&self) -> GuardLimits {
        *self.inner.limits.read()
    }

    /// Replace the base limits. Invalid limits are rejected and the previous
    /// limits stay in effect. Existing allocations are kept even if they now
    /// exceed the new limits; subsequent reservations will demand reclaim.
    pub fn reconfigure(&self, limits: GuardLimits) -> Result<(), GuardError> {
        limits.validate()?;
        *self.inner.limits.write() = limits;
        tracing::info!(
            target: "strata.memory",
            soft_bytes = limits.soft_bytes,
            hard_bytes = limits.hard_bytes,
            pressure_threshold = limits.pressure_threshold,
            "memory guard reconfigured"
        );
        Ok(())
    }

    /// Effective `(soft, hard)` limits for a request context.
    pub fn get_limits(&self, context: Option<&MemoryGuardContext>) -> (u64, u64) {
        scaled_limits(&self.limits(), context)
    }

    /// Current sanitized system memory fraction.
    pub fn system_pressure(&self) -> f64 {
        sanitize_fraction(self.inner.sampler.current_system_memory_fraction())
    }

    /// Bytes that must be released before `bytes_needed` more can be admitted.
    pub fn required_reclaim(&self, bytes_needed: u64, context: Option<&MemoryGuardContext>) -> u64 {
        let system_pressure = self.system_pressure();
        self.required_reclaim_with_pressure(None, bytes_needed, context, system_pressure)
    }

    /// Like [`MemoryGuard::required_reclaim`], with an already-sampled system
    /// pressure. When `key` is given, its current allocation is treated as
    /// replaced (not added to) by the new request.
    pub fn required_reclaim_with_pressure(
        &self,
        key: Option<&str>,
        bytes_needed: u64,
        context: Option<&MemoryGuardContext>,
        system_pressure: f64,
    ) -> u64 {
        let limits = self.limits();
        let baseline = self.inner.ledger.lock().baseline_excluding(key);
        reclaim_for(baseline, bytes_needed, &limits, context, system_pressure)
    }

    /// Reserve `bytes` under `key`, replacing any previous allocation for that key.
    ///
    /// Returns `false` without touching the ledger when any reclaim would be
    /// required first.
    pub fn reserve_allocation(
        &self,
        key: &str,
        bytes: u64,
        context: Option<&MemoryGuardContext>,
    ) -> bool {
        let system_pressure = self.system_pressure();
        self.reserve_allocation_with_pressure(key, bytes, context, system_pressure)
    }

    pub fn reserve_allocation_with_pressure(
        &self,
        key: &str,
        bytes: u64,
        context: Option<&MemoryGuardContext>,
        system_pressure: f64,
    ) -> bool {
        let limits = self.limits();
        let mut ledger = self.inner.ledger.lock();
        let baseline = ledger.baseline_excluding(Some(key));
        let reclaim = reclaim_for(baseline, bytes, &limits, context, system_pressure);
        if reclaim > 0 {
            drop(ledger);
            tracing::debug!(
                target: "strata.memory",
                key,
                bytes,
                reclaim,
                system_pressure,
                "allocation refused"
            );
            return false;
        }

        let prior = ledger.allocations.insert(key.to_owned(), bytes).unwrap_or(0);
        ledger.allocated_bytes = ledger.allocated_bytes.saturating_sub(prior).saturating_add(bytes);
        true
    }

    /// Put back an allocation that was released as part of an operation that
    /// is being rolled back. Bypasses admission control.
    pub fn reinstate_allocation(&self, key: &str, bytes: u64) {
        let mut ledger = self.inner.ledger.lock();
        let prior = ledger.allocations.insert(key.to_owned(), bytes).unwrap_or(0);
        ledger.allocated_bytes = ledger.allocated_bytes.saturating_sub(prior).saturating_add(bytes);
    }

    /// Release the allocation under `key`, returning its size. Unknown keys are a no-op.
    pub fn release_allocation(&self, key: &str) -> u64 {
        let mut ledger = self.inner.ledger.lock();
        let Some(bytes) = ledger.allocations.remove(key) else {
            return 0;
        };
        ledger.allocated_bytes = ledger.allocated_bytes.saturating_sub(bytes);
        bytes
    }

    pub fn allocation(&self, key: &str) -> Option<u64> {
        self.inner.ledger.lock().allocations.get(key).copied()
    }

    pub fn get_stats(&self) -> GuardStats {
        let system_pressure = self.system_pressure();
        let limits = self.limits();
        let (tracked_entries, allocated_bytes) = {
            let ledger = self.inner.ledger.lock();
            (ledger.allocations.len(), ledger.allocated_bytes)
        };
        GuardStats {
            tracked_entries,
            allocated_bytes,
            soft_limit: limits.soft_bytes,
            hard_limit: limits.hard_bytes,
            system_pressure,
            pressure: self
                .inner
                .thresholds
                .level_for_usage(allocated_bytes, limits.hard_bytes),
        }
    }
}

impl Default for MemoryGuard {
    /// Default limits with no system pressure signal.
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                limits: RwLock::new(GuardLimits::default()),
                thresholds: MemoryPressureThresholds::default(),
                ledger: Mutex::new(Ledger::default()),
                sampler: Arc::new(NoSystemSampler),
            }),
        }
    }
}

impl std::fmt::Debug for MemoryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.inner.ledger.lock();
        f.debug_struct("MemoryGuard")
            .field("limits", &*self.inner.limits.read())
            .field("tracked_entries", &ledger.allocations.len())
            .field("allocated_bytes", &ledger.allocated_bytes)
            .finish()
    }
}

fn scaled_limits(limits: &GuardLimits, context: Option<&MemoryGuardContext>) -> (u64, u64) {
    let hard = limits.hard_bytes;
    let mut soft = limits.soft_bytes as f64;

    if let Some(context) = context {
        if let Some(size) = context.project_size_bytes {
            let boost = (size as f64 / LARGE_PROJECT_BYTES as f64).min(1.0) * MAX_PROJECT_BOOST;
            soft *= 1.0 + boost;
        }
        match context.priority {
            Priority::Low => soft *= LOW_PRIORITY_FACTOR,
            Priority::Normal => {}
            Priority::High => {
                soft = (soft * HIGH_PRIORITY_FACTOR).min(hard as f64 * HIGH_PRIORITY_CEILING);
            }
        }
    }

    ((soft.round() as u64).min(hard), hard)
}

fn reclaim_for(
    baseline: u64,
    bytes_needed: u64,
    limits: &GuardLimits,
    context: Option<&MemoryGuardContext>,
    system_pressure: f64,
) -> u64 {
    let (soft, hard) = scaled_limits(limits, context);
    let projected = baseline.saturating_add(bytes_needed);
    let pressured = system_pressure >= limits.pressure_threshold;

    if projected <= soft && !pressured {
        return 0;
    }
    if projected > hard {
        return projected - hard;
    }

    let overshoot = projected.saturating_sub(soft);
    if pressured {
        overshoot.max((soft as f64 * PRESSURE_RECLAIM_FLOOR) as u64)
    } else {
        overshoot
    }
}
