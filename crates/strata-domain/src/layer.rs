use crate::allocator::{PatternResourceAllocator, ResourceBudget};
use crate::profile::{DomainKind, PROFILES};
use serde::Serialize;
use std::collections::BTreeMap;
use strata_memory::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheOverrides {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

/// Per-run cache and worker settings derived from a project's file mix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecializationPlan {
    pub domain: DomainKind,
    pub memory_priority: Priority,
    pub cache_overrides: CacheOverrides,
    pub agent_roles: Vec<String>,
    pub resource_budget: ResourceBudget,
}

#[derive(Debug, Clone, Default)]
pub struct DomainSpecializationLayer {
    allocator: PatternResourceAllocator,
}

impl DomainSpecializationLayer {
    pub fn new(allocator: PatternResourceAllocator) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &PatternResourceAllocator {
        &self.allocator
    }

    /// Domain of the profile claiming the most frequent extension.
    ///
    /// When several extensions tie for most frequent, the first profile in
    /// table order claiming any of them wins.
    pub fn infer_domain(&self, file_stats: &BTreeMap<String, u64>) -> DomainKind {
        let Some(top) = file_stats.values().copied().max().filter(|count| *count > 0) else {
            return DomainKind::General;
        };
        let leaders: Vec<String> = file_stats
            .iter()
            .filter(|(_, count)| **count == top)
            .map(|(ext, _)| normalize_extension(ext))
            .collect();

        PROFILES
            .iter()
            .find(|profile| {
                leaders
                    .iter()
                    .any(|ext| profile.extensions.contains(&ext.as_str()))
            })
            .map_or(DomainKind::General, |profile| profile.kind)
    }

    /// Pure function of its arguments.
    pub fn plan_for_project(
        &self,
        file_stats: &BTreeMap<String, u64>,
        project_size_bytes: u64,
        domain_override: Option<DomainKind>,
    ) -> SpecializationPlan {
        let domain = domain_override.unwrap_or_else(|| self.infer_domain(file_stats));
        let profile = domain.profile();
        let budget = self.allocator.compute(profile, file_stats, project_size_bytes);
        let max_entries =
            ((profile.cache_entries as f64 * budget.memory_multiplier).floor() as usize).max(1);

        tracing::debug!(
            target: "strata.domain",
            domain = %domain,
            overridden = domain_override.is_some(),
            max_entries,
            parallel_workers = budget.parallel_workers,
            memory_multiplier = budget.memory_multiplier,
            "specialization plan computed"
        );

        SpecializationPlan {
            domain,
            memory_priority: profile.priority,
            cache_overrides: CacheOverrides {
                max_entries,
                ttl_seconds: profile.ttl_seconds,
            },
            agent_roles: profile.agent_roles.iter().map(|role| (*role).to_owned()).collect(),
            resource_budget: budget,
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
