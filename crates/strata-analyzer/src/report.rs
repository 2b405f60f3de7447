use crate::outline::BuildMode;
use serde::Serialize;
use std::path::PathBuf;
use strata_cache::CacheStats;
use strata_domain::SpecializationPlan;
use strata_incremental::{AstComparison, DecisionReason, DiffSummary, ParseStrategy};
use strata_memory::Priority;

/// Terminal state of one file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    CacheHit,
    Stored,
    Rejected,
    IoError,
    ParseError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    IoError,
    ParseError,
    CacheRejection,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::IoError => "io_error",
            FailureReason::ParseError => "parse_error",
            FailureReason::CacheRejection => "cache_rejection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAnalysisResult {
    pub file_path: String,
    pub language: String,
    pub status: FileStatus,
    pub content_hash: Option<String>,
    /// Absent on cache hits and read failures.
    pub strategy: Option<ParseStrategy>,
    pub reason: Option<DecisionReason>,
    /// Absent when the previous outline was reused.
    pub build_mode: Option<BuildMode>,
    pub diff: Option<DiffSummary>,
    pub similarity: Option<AstComparison>,
    pub symbols: usize,
    pub size_bytes: Option<u64>,
    pub error: Option<String>,
    pub duration_ms: f64,
}

impl FileAnalysisResult {
    pub(crate) fn new(file_path: &str, language: &str, status: FileStatus) -> Self {
        Self {
            file_path: file_path.to_owned(),
            language: language.to_owned(),
            status,
            content_hash: None,
            strategy: None,
            reason: None,
            build_mode: None,
            diff: None,
            similarity: None,
            symbols: 0,
            size_bytes: None,
            error: None,
            duration_ms: 0.0,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self.status {
            FileStatus::IoError => Some(FailureReason::IoError),
            FileStatus::ParseError => Some(FailureReason::ParseError),
            FileStatus::Rejected => Some(FailureReason::CacheRejection),
            FileStatus::CacheHit | FileStatus::Stored => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisFailure {
    pub file_path: String,
    pub reason: FailureReason,
    pub error: String,
}

/// Outcome of one [`LargeProjectAnalyzer::prime_cache`](crate::LargeProjectAnalyzer::prime_cache)
/// call. Covers every enumerated file, failed ones included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzerReport {
    pub project_id: String,
    pub root: PathBuf,
    pub version: String,
    pub plan: SpecializationPlan,
    /// Effective priority for the run, after large-project escalation.
    pub priority: Priority,
    pub total_files: usize,
    pub processed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub reused: usize,
    pub partial_reparses: usize,
    pub full_parses: usize,
    pub stored: usize,
    pub rejected: usize,
    pub failures: Vec<AnalysisFailure>,
    pub files: Vec<FileAnalysisResult>,
    pub cache_stats: CacheStats,
    pub duration_ms: f64,
}

impl AnalyzerReport {
    pub(crate) fn record(&mut self, result: FileAnalysisResult) {
        self.processed += 1;
        match result.status {
            FileStatus::CacheHit => self.cache_hits += 1,
            FileStatus::IoError => {}
            FileStatus::Stored | FileStatus::Rejected | FileStatus::ParseError => {
                self.cache_misses += 1
            }
        }
        match result.strategy {
            Some(ParseStrategy::ReuseAst) => self.reused += 1,
            Some(ParseStrategy::PartialReparse) => self.partial_reparses += 1,
            Some(ParseStrategy::FullReparse) => self.full_parses += 1,
            None => {}
        }
        match result.status {
            FileStatus::Stored => self.stored += 1,
            FileStatus::Rejected => self.rejected += 1,
            _ => {}
        }
        if let Some(reason) = result.failure_reason() {
            self.failures.push(AnalysisFailure {
                file_path: result.file_path.clone(),
                reason,
                error: result.error.clone().unwrap_or_else(|| reason.as_str().to_owned()),
            });
        }
        self.files.push(result);
    }

    pub fn file(&self, file_path: &str) -> Option<&FileAnalysisResult> {
        self.files.iter().find(|file| file.file_path == file_path)
    }
}
