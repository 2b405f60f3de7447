use crate::profile::DomainProfile;
use serde::Serialize;
use std::collections::BTreeMap;
use strata_memory::GB;

const MAX_SCALE: f64 = 3.0;
const MAX_MEMORY_MULTIPLIER: f64 = 3.0;
const FILES_PER_SCALE_STEP: f64 = 2_000.0;
const SCALE_PER_GB: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceBudget {
    pub parallel_workers: usize,
    pub memory_multiplier: f64,
    pub size_gb: f64,
    pub total_files: u64,
}

/// Scales a profile's base resources by project size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternResourceAllocator {
    max_parallel_workers: usize,
}

impl PatternResourceAllocator {
    pub fn new(max_parallel_workers: usize) -> Self {
        Self {
            max_parallel_workers: max_parallel_workers.max(1),
        }
    }

    pub fn max_parallel_workers(&self) -> usize {
        self.max_parallel_workers
    }

    pub fn compute(
        &self,
        profile: &DomainProfile,
        file_stats: &BTreeMap<String, u64>,
        project_size_bytes: u64,
    ) -> ResourceBudget {
        let total_files: u64 = file_stats.values().sum();
        let size_gb = project_size_bytes as f64 / GB as f64;
        let scale = (1.0 + total_files as f64 / FILES_PER_SCALE_STEP + size_gb * SCALE_PER_GB)
            .min(MAX_SCALE);

        let workers = (profile.base_workers as f64 * scale).floor() as usize;
        ResourceBudget {
            parallel_workers: workers.max(1).min(self.max_parallel_workers),
            memory_multiplier: (profile.memory_multiplier * scale).min(MAX_MEMORY_MULTIPLIER),
            size_gb,
            total_files,
        }
    }
}

impl Default for PatternResourceAllocator {
    fn default() -> Self {
        Self::new(8)
    }
}
