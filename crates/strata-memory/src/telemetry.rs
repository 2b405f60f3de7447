use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

/// A single profiling sample forwarded to a [`TelemetrySink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotspot {
    pub label: String,
    pub delta_bytes: i64,
    pub duration_ms: f64,
    pub metadata: BTreeMap<String, String>,
}

/// Fire-and-forget receiver for hotspot samples.
///
/// Implementations must not block and have no way to report failure; anything
/// that can go wrong inside a sink is the sink's own business.
pub trait TelemetrySink: Send + Sync {
    fn record_hotspot(
        &self,
        label: &str,
        delta_bytes: i64,
        duration_ms: f64,
        metadata: &BTreeMap<String, String>,
    );
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_hotspot(&self, _: &str, _: i64, _: f64, _: &BTreeMap<String, String>) {}
}

/// Emits every hotspot as a `debug` event on the `strata.telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_hotspot(
        &self,
        label: &str,
        delta_bytes: i64,
        duration_ms: f64,
        metadata: &BTreeMap<String, String>,
    ) {
        tracing::debug!(
            target: "strata.telemetry",
            label,
            delta_bytes,
            duration_ms,
            metadata = ?metadata,
            "hotspot"
        );
    }
}

/// Keeps every hotspot in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    hotspots: Mutex<Vec<Hotspot>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hotspots(&self) -> Vec<Hotspot> {
        self.hotspots.lock().clone()
    }

    pub fn clear(&self) {
        self.hotspots.lock().clear();
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_hotspot(
        &self,
        label: &str,
        delta_bytes: i64,
        duration_ms: f64,
        metadata: &BTreeMap<String, String>,
    ) {
        self.hotspots.lock().push(Hotspot {
            label: label.to_owned(),
            delta_bytes,
            duration_ms,
            metadata: metadata.clone(),
        });
    }
}
