use std::collections::BTreeMap;
use strata_domain::{DomainKind, DomainSpecializationLayer, PatternResourceAllocator};
use strata_memory::{Priority, GB};

fn stats(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(ext, n)| ((*ext).to_owned(), *n)).collect()
}

#[test]
fn most_frequent_extension_selects_the_domain() {
    let layer = DomainSpecializationLayer::default();
    assert_eq!(
        layer.infer_domain(&stats(&[("py", 40), ("md", 3), ("ts", 10)])),
        DomainKind::Backend
    );
    assert_eq!(
        layer.infer_domain(&stats(&[("sql", 9), ("py", 2)])),
        DomainKind::Data
    );
    assert_eq!(
        layer.infer_domain(&stats(&[("xyz", 9), ("py", 2)])),
        DomainKind::General
    );
    assert_eq!(layer.infer_domain(&BTreeMap::new()), DomainKind::General);
}

#[test]
fn ties_go_to_the_first_profile_in_table_order() {
    let layer = DomainSpecializationLayer::default();
    // `md` (docs) and `ts` (frontend) tie; frontend precedes docs.
    assert_eq!(
        layer.infer_domain(&stats(&[("md", 5), ("ts", 5)])),
        DomainKind::Frontend
    );
    // `csv` (data) and `go` (backend) tie; backend precedes data.
    assert_eq!(
        layer.infer_domain(&stats(&[("csv", 2), ("go", 2)])),
        DomainKind::Backend
    );
}

#[test]
fn mid_sized_backend_project_plan() {
    let layer = DomainSpecializationLayer::new(PatternResourceAllocator::new(16));
    let plan = layer.plan_for_project(&stats(&[("py", 1_000)]), 0, None);

    // scale = 1 + 1000/2000 = 1.5
    assert_eq!(plan.domain, DomainKind::Backend);
    assert_eq!(plan.memory_priority, Priority::High);
    assert_eq!(plan.resource_budget.parallel_workers, 9);
    assert_eq!(plan.resource_budget.memory_multiplier, 2.25);
    assert_eq!(plan.cache_overrides.max_entries, 9_000);
    assert_eq!(plan.cache_overrides.ttl_seconds, 3_600);
    assert_eq!(plan.agent_roles, ["api_mapper", "dependency_auditor"]);
    assert_eq!(plan.resource_budget.total_files, 1_000);
}

#[test]
fn resources_are_capped_on_huge_projects() {
    let layer = DomainSpecializationLayer::new(PatternResourceAllocator::new(8));
    let plan = layer.plan_for_project(&stats(&[("sql", 1_000_000)]), 500 * GB, None);

    assert_eq!(plan.domain, DomainKind::Data);
    assert_eq!(plan.resource_budget.parallel_workers, 8);
    assert_eq!(plan.resource_budget.memory_multiplier, 3.0);
    assert_eq!(plan.cache_overrides.max_entries, 6_000);
    assert_eq!(plan.cache_overrides.ttl_seconds, 7_200);
}

#[test]
fn worker_count_never_drops_below_one() {
    let layer = DomainSpecializationLayer::new(PatternResourceAllocator::new(0));
    let plan = layer.plan_for_project(&stats(&[("md", 1)]), 0, None);
    assert_eq!(plan.resource_budget.parallel_workers, 1);
}

#[test]
fn override_beats_inference() {
    let layer = DomainSpecializationLayer::default();
    let plan = layer.plan_for_project(&stats(&[("py", 500)]), 0, Some(DomainKind::Docs));
    assert_eq!(plan.domain, DomainKind::Docs);
    assert_eq!(plan.memory_priority, Priority::Low);
    // Docs: 1000 entries * 0.8 * 1.25
    assert_eq!(plan.cache_overrides.max_entries, 1_000);
}

#[test]
fn planning_is_deterministic() {
    let layer = DomainSpecializationLayer::default();
    let input = stats(&[("ts", 1_234), ("css", 400), ("md", 12)]);

    let first = layer.plan_for_project(&input, 3 * GB / 2, None);
    let second = layer.plan_for_project(&input, 3 * GB / 2, None);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("serializable"),
        serde_json::to_string(&second).expect("serializable")
    );
}
