use serde::Serialize;
use similar::TextDiff;

/// Best-effort structural similarity between two ASTs, for telemetry only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AstComparison {
    pub comparable: bool,
    pub similarity: Option<f64>,
    pub delta_ratio: Option<f64>,
}

impl AstComparison {
    pub fn incomparable() -> Self {
        Self {
            comparable: false,
            similarity: None,
            delta_ratio: None,
        }
    }
}

/// Line-sequence similarity of the two values' pretty-printed JSON forms.
pub(crate) fn compare_serialized<T: Serialize + ?Sized>(old: &T, new: &T) -> AstComparison {
    let (old, new) = match (serde_json::to_string_pretty(old), serde_json::to_string_pretty(new)) {
        (Ok(old), Ok(new)) => (old, new),
        (Err(err), _) | (_, Err(err)) => {
            tracing::debug!(
                target: "strata.incremental",
                error = %err,
                "ast comparison skipped: payload not serializable"
            );
            return AstComparison::incomparable();
        }
    };

    let similarity = f64::from(TextDiff::from_lines(&old, &new).ratio());
    AstComparison {
        comparable: true,
        similarity: Some(similarity),
        delta_ratio: Some(1.0 - similarity),
    }
}
