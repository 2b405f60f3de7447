//! Domain-aware defaults for cache sizing and parallelism.
//!
//! A project's extension histogram selects one of five static
//! [`DomainProfile`]s; [`PatternResourceAllocator`] scales that profile by
//! project size, and [`DomainSpecializationLayer::plan_for_project`] turns the
//! result into a [`SpecializationPlan`] the analyzer applies for one run.

mod allocator;
mod layer;
mod profile;

pub use allocator::{PatternResourceAllocator, ResourceBudget};
pub use layer::{CacheOverrides, DomainSpecializationLayer, SpecializationPlan};
pub use profile::{DomainKind, DomainProfile, UnknownDomain, PROFILES};
