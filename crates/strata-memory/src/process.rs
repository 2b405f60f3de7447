use std::sync::OnceLock;

/// Resident set size of the current process, when the platform exposes it.
///
/// Only Linux is supported (via `/proc/self/status`); other platforms return
/// `None`, which profilers treat as "no delta available".
pub fn current_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string("/proc/self/status") {
            Ok(status) => parse_vm_rss(&status),
            Err(err) => {
                static REPORTED: OnceLock<()> = OnceLock::new();
                if err.kind() != std::io::ErrorKind::NotFound && REPORTED.set(()).is_ok() {
                    tracing::debug!(
                        target: "strata.memory",
                        error = %err,
                        "failed to read /proc/self/status; rss sampling disabled"
                    );
                }
                None
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Extract `VmRSS` (reported in kB) from `/proc/<pid>/status` contents.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with("VmRSS:"))?;
    let value = line.trim_start_matches("VmRSS:").split_whitespace().next()?;
    match value.parse::<u64>() {
        Ok(kb) => Some(kb.saturating_mul(1024)),
        Err(err) => {
            static REPORTED: OnceLock<()> = OnceLock::new();
            if REPORTED.set(()).is_ok() {
                tracing::debug!(
                    target: "strata.memory",
                    value,
                    error = %err,
                    "unparseable VmRSS value"
                );
            }
            None
        }
    }
}
