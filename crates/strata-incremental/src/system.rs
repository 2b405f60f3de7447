use crate::compare::{compare_serialized, AstComparison};
use crate::decision::{evaluate, DeltaParseDecision};
use crate::diff::{summarize, DiffContext, DiffSummary};
use crate::error::IncrementalError;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncrementalConfig {
    /// Change ratios at or below this license a partial reparse.
    pub delta_change_ratio_threshold: f64,
    /// Number of per-file baselines retained.
    pub diff_sample_window: usize,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            delta_change_ratio_threshold: 0.15,
            diff_sample_window: 512,
        }
    }
}

impl IncrementalConfig {
    pub fn validate(&self) -> Result<(), IncrementalError> {
        let threshold = self.delta_change_ratio_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(IncrementalError::InvalidThreshold(threshold));
        }
        if self.diff_sample_window == 0 {
            return Err(IncrementalError::InvalidWindow);
        }
        Ok(())
    }

    fn window(&self) -> Result<NonZeroUsize, IncrementalError> {
        NonZeroUsize::new(self.diff_sample_window).ok_or(IncrementalError::InvalidWindow)
    }
}

/// Tracks the last seen content of each file and classifies how much
/// reparse work a new version needs.
///
/// Baselines live in a bounded LRU private to this instance.
pub struct IncrementalParseSystem {
    config: RwLock<IncrementalConfig>,
    contexts: Mutex<LruCache<String, Arc<DiffContext>>>,
}

impl IncrementalParseSystem {
    pub fn new(config: IncrementalConfig) -> Result<Self, IncrementalError> {
        config.validate()?;
        Ok(Self {
            contexts: Mutex::new(LruCache::new(config.window()?)),
            config: RwLock::new(config),
        })
    }

    pub fn config(&self) -> IncrementalConfig {
        *self.config.read()
    }

    /// Apply a new threshold and window; shrinking the window drops the
    /// least recently used baselines.
    pub fn reconfigure(&self, config: IncrementalConfig) -> Result<(), IncrementalError> {
        config.validate()?;
        let window = config.window()?;
        self.contexts.lock().resize(window);
        *self.config.write() = config;
        Ok(())
    }

    /// Diff `content` against the baseline recorded for `key`, if any.
    ///
    /// The baseline is not replaced; call
    /// [`IncrementalParseSystem::update_context`] once the new content has been
    /// parsed or reused.
    pub fn compute_diff(
        &self,
        key: &str,
        content: &str,
        version: &str,
        language: &str,
    ) -> (DiffSummary, Option<Arc<DiffContext>>) {
        let previous = self.contexts.lock().get(key).cloned();
        let new_lines: Vec<&str> = content.lines().collect();
        let summary = summarize(
            previous.as_deref().map(|ctx| ctx.lines.as_slice()),
            &new_lines,
            language,
        );

        tracing::debug!(
            target: "strata.incremental",
            key,
            version,
            additions = summary.additions,
            deletions = summary.deletions,
            change_ratio = summary.change_ratio,
            whitespace_only = summary.whitespace_only,
            baseline_available = summary.baseline_available,
            "computed diff"
        );
        (summary, previous)
    }

    pub fn evaluate_delta(&self, has_previous_ast: bool, summary: &DiffSummary) -> DeltaParseDecision {
        let threshold = self.config.read().delta_change_ratio_threshold;
        evaluate(threshold, has_previous_ast, summary)
    }

    /// Replace the baseline for `key`.
    pub fn update_context(
        &self,
        key: &str,
        content_hash: &str,
        version: &str,
        language: &str,
        content: &str,
    ) {
        let context = DiffContext {
            content_hash: content_hash.to_owned(),
            version: version.to_owned(),
            language: language.to_owned(),
            lines: content.lines().map(str::to_owned).collect(),
            updated_at: now_millis(),
        };
        self.contexts.lock().put(key.to_owned(), Arc::new(context));
    }

    pub fn context(&self, key: &str) -> Option<Arc<DiffContext>> {
        self.contexts.lock().peek(key).cloned()
    }

    pub fn tracked_files(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Never fails: unserializable payloads are reported as not comparable.
    pub fn compare_ast_versions<T: Serialize + ?Sized>(&self, old: &T, new: &T) -> AstComparison {
        compare_serialized(old, new)
    }
}

impl Default for IncrementalParseSystem {
    fn default() -> Self {
        let config = IncrementalConfig::default();
        Self {
            contexts: Mutex::new(LruCache::new(
                NonZeroUsize::new(config.diff_sample_window).unwrap_or(NonZeroUsize::MIN),
            )),
            config: RwLock::new(config),
        }
    }
}

impl std::fmt::Debug for IncrementalParseSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalParseSystem")
            .field("config", &*self.config.read())
            .field("tracked_files", &self.contexts.lock().len())
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
