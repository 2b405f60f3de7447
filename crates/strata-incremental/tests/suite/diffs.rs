use strata_incremental::{IncrementalConfig, IncrementalError, IncrementalParseSystem};

fn system() -> IncrementalParseSystem {
    IncrementalParseSystem::new(IncrementalConfig::default()).expect("valid config")
}

const SOURCE: &str = "def a():\n    return 1\n\ndef b():\n    return 2\n";

#[test]
fn identical_text_has_zero_ratio_and_is_whitespace_only() {
    let system = system();
    system.update_context("p:a.py", "h1", "v1", "python", SOURCE);

    let (summary, previous) = system.compute_diff("p:a.py", SOURCE, "v1", "python");
    assert!(previous.is_some());
    assert!(summary.baseline_available);
    assert_eq!(summary.change_ratio, 0.0);
    assert!(summary.whitespace_only);
    assert!(summary.changed_lines.is_empty());
}

#[test]
fn rewriting_every_line_gives_ratio_one() {
    let system = system();
    system.update_context("k", "h1", "v1", "python", "a = 1\nb = 2\nc = 3\n");

    let (summary, _) = system.compute_diff("k", "x = 9\ny = 8\nz = 7\n", "v1", "python");
    assert_eq!(summary.change_ratio, 1.0);
    assert_eq!(summary.changed_lines, [1, 2, 3]);
    assert!(!summary.whitespace_only);
}

#[test]
fn appending_blank_lines_counts_only_additions() {
    let system = system();
    let original = "a = 1\nb = 2\nc = 3\n";
    system.update_context("k", "h1", "v1", "python", original);

    let appended = format!("{original}\n\n\n");
    let (summary, _) = system.compute_diff("k", &appended, "v1", "python");
    assert_eq!(summary.additions, 3);
    assert_eq!(summary.deletions, 0);
    assert_eq!(summary.total_lines, 6);
    assert!(summary.whitespace_only);
}

#[test]
fn reindented_and_commented_code_is_whitespace_only() {
    let system = system();
    system.update_context("k", "h1", "v1", "python", "x = 1\ny = 2\n");

    let edited = "# header comment\n  x = 1\n\ny = 2   \n";
    let (summary, _) = system.compute_diff("k", edited, "v1", "python");
    assert!(summary.whitespace_only);
    assert!(summary.change_ratio > 0.0);
}

#[test]
fn inner_whitespace_edits_are_real_changes() {
    let system = system();
    system.update_context("k", "h1", "v1", "python", "greeting = \"hello   world\"\n");

    let (summary, _) = system.compute_diff("k", "greeting = \"hello world\"\n", "v1", "python");
    assert!(!summary.whitespace_only);
    assert_eq!(summary.changed_lines, [1]);

    let decision = system.evaluate_delta(true, &summary);
    assert!(!decision.reuse_ast());
}

#[test]
fn no_baseline_is_reported() {
    let system = system();
    let (summary, previous) = system.compute_diff("new", SOURCE, "v1", "python");
    assert!(previous.is_none());
    assert!(!summary.baseline_available);
    assert!(!summary.whitespace_only);
    assert_eq!(summary.additions, 5);
}

#[test]
fn compute_diff_does_not_replace_the_baseline() {
    let system = system();
    system.update_context("k", "h1", "v1", "python", "a\n");
    system.compute_diff("k", "b\n", "v2", "python");

    let context = system.context("k").expect("baseline");
    assert_eq!(context.lines, ["a"]);
    assert_eq!(context.content_hash, "h1");

    system.update_context("k", "h2", "v2", "python", "b\n");
    let (summary, previous) = system.compute_diff("k", "b\n", "v2", "python");
    assert_eq!(previous.expect("baseline").content_hash, "h2");
    assert!(summary.is_unchanged());
}

#[test]
fn baselines_are_bounded_by_the_window() {
    let system = IncrementalParseSystem::new(IncrementalConfig {
        diff_sample_window: 2,
        ..IncrementalConfig::default()
    })
    .expect("valid config");

    system.update_context("a", "h", "v", "python", "1\n");
    system.update_context("b", "h", "v", "python", "2\n");
    // Touch `a` so `b` is evicted next.
    system.compute_diff("a", "1\n", "v", "python");
    system.update_context("c", "h", "v", "python", "3\n");

    assert_eq!(system.tracked_files(), 2);
    assert!(system.context("a").is_some());
    assert!(system.context("b").is_none());

    system
        .reconfigure(IncrementalConfig {
            diff_sample_window: 1,
            ..IncrementalConfig::default()
        })
        .expect("valid config");
    assert_eq!(system.tracked_files(), 1);
}

#[test]
fn invalid_configuration_is_rejected() {
    assert_eq!(
        IncrementalParseSystem::new(IncrementalConfig {
            delta_change_ratio_threshold: 1.5,
            ..IncrementalConfig::default()
        })
        .unwrap_err(),
        IncrementalError::InvalidThreshold(1.5)
    );

    let system = system();
    assert_eq!(
        system
            .reconfigure(IncrementalConfig {
                diff_sample_window: 0,
                ..IncrementalConfig::default()
            })
            .unwrap_err(),
        IncrementalError::InvalidWindow
    );
    assert_eq!(system.config(), IncrementalConfig::default());
}
