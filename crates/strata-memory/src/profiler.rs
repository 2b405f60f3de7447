use crate::process::current_rss_bytes;
use crate::telemetry::{NoopTelemetry, TelemetrySink};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Wraps units of work to measure elapsed time and process RSS growth, then
/// reports the sample to a [`TelemetrySink`].
///
/// The closure's return value is passed through untouched, `Err` included, and
/// panics unwind through the profiler without a sample being recorded.
#[derive(Clone)]
pub struct HotspotProfiler {
    sink: Arc<dyn TelemetrySink>,
}

impl HotspotProfiler {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopTelemetry))
    }

    pub fn measure<R>(
        &self,
        label: &str,
        metadata: &BTreeMap<String, String>,
        work: impl FnOnce() -> R,
    ) -> R {
        let rss_before = current_rss_bytes();
        let started = Instant::now();

        let out = work();

        let duration_ms = started.elapsed().as_secs_f64() * 1_000.0;
        let delta_bytes = match (rss_before, current_rss_bytes()) {
            (Some(before), Some(after)) => after as i64 - before as i64,
            _ => 0,
        };
        self.sink
            .record_hotspot(label, delta_bytes, duration_ms, metadata);
        out
    }
}

impl Default for HotspotProfiler {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for HotspotProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotspotProfiler").finish_non_exhaustive()
    }
}
