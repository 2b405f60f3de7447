use crate::normalize::significant_lines;
use serde::Serialize;
use similar::{capture_diff_slices, Algorithm, DiffTag};

/// Last recorded snapshot of a file, used as the baseline for the next diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffContext {
    pub content_hash: String,
    pub version: String,
    pub language: String,
    pub lines: Vec<String>,
    pub updated_at: u64,
}

/// Line-level change summary between a baseline and new content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffSummary {
    /// 1-based line numbers on the new side that were inserted or replaced,
    /// plus the position of any pure deletion.
    pub changed_lines: Vec<usize>,
    pub additions: usize,
    pub deletions: usize,
    /// `max(old lines, new lines)`.
    pub total_lines: usize,
    /// Equal after trimming lines and dropping blank/comment-only ones.
    pub whitespace_only: bool,
    pub change_ratio: f64,
    pub baseline_available: bool,
}

impl DiffSummary {
    pub fn is_unchanged(&self) -> bool {
        self.additions == 0 && self.deletions == 0
    }
}

pub(crate) fn summarize(
    baseline: Option<&[String]>,
    new_lines: &[&str],
    language: &str,
) -> DiffSummary {
    let old_lines: Vec<&str> = baseline
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();

    let mut changed_lines = Vec::new();
    let mut additions = 0;
    let mut deletions = 0;
    let mut changed = 0;

    for op in capture_diff_slices(Algorithm::Myers, &old_lines, new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => continue,
            DiffTag::Insert | DiffTag::Replace => {
                changed_lines.extend(new_range.clone().map(|idx| idx + 1));
            }
            DiffTag::Delete => {
                let at = (new_range.start + 1).min(new_lines.len().max(1));
                if changed_lines.last() != Some(&at) {
                    changed_lines.push(at);
                }
            }
        }
        additions += new_range.len();
        deletions += old_range.len();
        changed += old_range.len().max(new_range.len());
    }
    changed_lines.dedup();

    let total_lines = old_lines.len().max(new_lines.len());
    let baseline_available = baseline.is_some();
    let whitespace_only = baseline_available
        && significant_lines(old_lines.iter().copied(), language)
            == significant_lines(new_lines.iter().copied(), language);

    DiffSummary {
        changed_lines,
        additions,
        deletions,
        total_lines,
        whitespace_only,
        change_ratio: (changed as f64 / total_lines.max(1) as f64).min(1.0),
        baseline_available,
    }
}
