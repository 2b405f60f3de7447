//! Memory admission control for Strata's parse caches.
//!
//! The central type is [`MemoryGuard`]: a shared ledger of named, sized
//! allocations checked against soft and hard byte limits. Limits adapt to the
//! [`MemoryGuardContext`] supplied with each request (project size and
//! [`Priority`]), and to an optional [`SystemMemorySampler`] reporting how much
//! of the host's memory is already in use.
//!
//! The guard is pure accounting. It never frees anything itself; callers (the
//! AST cache) evict their own entries until the guard reports that no further
//! reclaim is required.
//!
//! Diagnostics collaborators live here as well: [`TelemetrySink`] receives
//! hotspot samples and [`HotspotProfiler`] produces them around parse work.

mod budget;
mod context;
mod error;
mod guard;
mod pressure;
mod process;
mod profiler;
mod sampler;
mod telemetry;

pub use budget::{parse_byte_size, GuardLimits, GB, KB, MB};
pub use context::{MemoryGuardContext, Priority};
pub use error::GuardError;
pub use guard::{GuardStats, MemoryGuard};
pub use pressure::{MemoryPressure, MemoryPressureThresholds};
pub use process::current_rss_bytes;
pub use profiler::HotspotProfiler;
pub use sampler::{
    ManualSampler, NoSystemSampler, PolledSampler, SysinfoSampler, SystemMemorySampler,
};
pub use telemetry::{Hotspot, NoopTelemetry, RecordingTelemetry, TelemetrySink, TracingTelemetry};
