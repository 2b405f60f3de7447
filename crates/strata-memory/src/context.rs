use serde::{Deserialize, Serialize};

/// Relative importance of a workload when computing its soft limit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Per-request context used to scale guard limits.
///
/// Contexts are ephemeral: they are passed with each operation and never
/// retained by the guard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryGuardContext {
    pub project_id: String,
    pub project_size_bytes: Option<u64>,
    pub domain: Option<String>,
    pub priority: Priority,
}

impl MemoryGuardContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Self::default()
        }
    }

    pub fn with_project_size(mut self, bytes: Option<u64>) -> Self {
        self.project_size_bytes = bytes;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
