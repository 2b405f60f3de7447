//! Diff-based reparse classification.
//!
//! [`IncrementalParseSystem`] keeps the last seen lines of each file and, for
//! new content, produces a [`DiffSummary`] and a [`DeltaParseDecision`]:
//!
//! | previous AST | summary                  | decision                          |
//! |--------------|--------------------------|-----------------------------------|
//! | no           | any                      | full parse (`no_baseline`)        |
//! | yes          | whitespace only          | reuse (`whitespace_only_change`)  |
//! | yes          | ratio <= threshold       | partial (`limited_change`)        |
//! | yes          | otherwise                | full parse (`full_reparse`)       |
//!
//! "Whitespace only" compares the files after trimming lines and dropping
//! blank or comment-only lines. Comment edits therefore count as
//! whitespace-only changes; inner whitespace edits do not.

mod compare;
mod decision;
mod diff;
mod error;
mod normalize;
mod system;

pub use compare::AstComparison;
pub use decision::{DecisionReason, DeltaParseDecision, ParseStrategy};
pub use diff::{DiffContext, DiffSummary};
pub use error::IncrementalError;
pub use normalize::normalize_line;
pub use system::{IncrementalConfig, IncrementalParseSystem};
