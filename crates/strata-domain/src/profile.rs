use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strata_memory::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Frontend,
    Backend,
    Data,
    Docs,
    General,
}

impl DomainKind {
    pub const ALL: [DomainKind; 5] = [
        DomainKind::Frontend,
        DomainKind::Backend,
        DomainKind::Data,
        DomainKind::Docs,
        DomainKind::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DomainKind::Frontend => "frontend",
            DomainKind::Backend => "backend",
            DomainKind::Data => "data",
            DomainKind::Docs => "docs",
            DomainKind::General => "general",
        }
    }

    pub fn profile(self) -> &'static DomainProfile {
        match self {
            DomainKind::Frontend => &PROFILES[0],
            DomainKind::Backend => &PROFILES[1],
            DomainKind::Data => &PROFILES[2],
            DomainKind::Docs => &PROFILES[3],
            DomainKind::General => &PROFILES[4],
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain `{0}` (expected one of: frontend, backend, data, docs, general)")]
pub struct UnknownDomain(pub String);

impl FromStr for DomainKind {
    type Err = UnknownDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        DomainKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| UnknownDomain(s.to_owned()))
    }
}

/// Static sizing defaults for one kind of project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainProfile {
    pub kind: DomainKind,
    /// Lowercase file extensions without the leading dot.
    pub extensions: &'static [&'static str],
    pub cache_entries: usize,
    pub ttl_seconds: u64,
    pub priority: Priority,
    pub base_workers: usize,
    pub memory_multiplier: f64,
    pub agent_roles: &'static [&'static str],
}

/// Profiles in precedence order; `general` is the fallback and claims no
/// extensions.
pub static PROFILES: [DomainProfile; 5] = [
    DomainProfile {
        kind: DomainKind::Frontend,
        extensions: &[
            "js", "jsx", "ts", "tsx", "vue", "svelte", "css", "scss", "html",
        ],
        cache_entries: 3_000,
        ttl_seconds: 1_800,
        priority: Priority::Normal,
        base_workers: 4,
        memory_multiplier: 1.2,
        agent_roles: &["ui_analyst", "component_mapper"],
    },
    DomainProfile {
        kind: DomainKind::Backend,
        extensions: &[
            "py", "java", "go", "rs", "rb", "php", "cs", "kt", "scala", "c", "cpp", "h",
        ],
        cache_entries: 4_000,
        ttl_seconds: 3_600,
        priority: Priority::High,
        base_workers: 6,
        memory_multiplier: 1.5,
        agent_roles: &["api_mapper", "dependency_auditor"],
    },
    DomainProfile {
        kind: DomainKind::Data,
        extensions: &["ipynb", "sql", "r", "csv", "parquet", "avro"],
        cache_entries: 2_000,
        ttl_seconds: 7_200,
        priority: Priority::High,
        base_workers: 4,
        memory_multiplier: 2.0,
        agent_roles: &["pipeline_tracer", "schema_profiler"],
    },
    DomainProfile {
        kind: DomainKind::Docs,
        extensions: &["md", "rst", "txt", "adoc"],
        cache_entries: 1_000,
        ttl_seconds: 14_400,
        priority: Priority::Low,
        base_workers: 2,
        memory_multiplier: 0.8,
        agent_roles: &["doc_summarizer"],
    },
    DomainProfile {
        kind: DomainKind::General,
        extensions: &[],
        cache_entries: 2_048,
        ttl_seconds: 3_600,
        priority: Priority::Normal,
        base_workers: 4,
        memory_multiplier: 1.0,
        agent_roles: &["generalist"],
    },
];
