use crate::diff::DiffSummary;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NoBaseline,
    WhitespaceOnlyChange,
    LimitedChange,
    FullReparse,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::NoBaseline => "no_baseline",
            DecisionReason::WhitespaceOnlyChange => "whitespace_only_change",
            DecisionReason::LimitedChange => "limited_change",
            DecisionReason::FullReparse => "full_reparse",
        }
    }
}

/// What the caller should do with a changed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    ReuseAst,
    PartialReparse,
    FullReparse,
}

impl ParseStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStrategy::ReuseAst => "reuse_ast",
            ParseStrategy::PartialReparse => "partial_reparse",
            ParseStrategy::FullReparse => "full_reparse",
        }
    }
}

/// Outcome of delta evaluation. `reuse_ast` and `partial_reparse` are never
/// both set; neither set means a full reparse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeltaParseDecision {
    reuse_ast: bool,
    partial_reparse: bool,
    reason: DecisionReason,
}

impl DeltaParseDecision {
    pub fn reuse(reason: DecisionReason) -> Self {
        Self {
            reuse_ast: true,
            partial_reparse: false,
            reason,
        }
    }

    pub fn partial(reason: DecisionReason) -> Self {
        Self {
            reuse_ast: false,
            partial_reparse: true,
            reason,
        }
    }

    pub fn full(reason: DecisionReason) -> Self {
        Self {
            reuse_ast: false,
            partial_reparse: false,
            reason,
        }
    }

    pub fn reuse_ast(&self) -> bool {
        self.reuse_ast
    }

    pub fn partial_reparse(&self) -> bool {
        self.partial_reparse
    }

    pub fn reason(&self) -> DecisionReason {
        self.reason
    }

    pub fn strategy(&self) -> ParseStrategy {
        if self.reuse_ast {
            ParseStrategy::ReuseAst
        } else if self.partial_reparse {
            ParseStrategy::PartialReparse
        } else {
            ParseStrategy::FullReparse
        }
    }
}

pub(crate) fn evaluate(
    threshold: f64,
    has_previous_ast: bool,
    summary: &DiffSummary,
) -> DeltaParseDecision {
    if !has_previous_ast {
        DeltaParseDecision::full(DecisionReason::NoBaseline)
    } else if summary.whitespace_only {
        DeltaParseDecision::reuse(DecisionReason::WhitespaceOnlyChange)
    } else if summary.change_ratio <= threshold {
        DeltaParseDecision::partial(DecisionReason::LimitedChange)
    } else {
        DeltaParseDecision::full(DecisionReason::FullReparse)
    }
}
