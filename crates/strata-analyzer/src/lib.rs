//! Project-wide cache priming for Strata.
//!
//! [`LargeProjectAnalyzer::prime_cache`] walks a project, picks a
//! specialization plan for it, and fills a [`KernelCache`] with one
//! [`StructuralOutline`] per file. Unchanged files are cache hits; changed
//! ones go through the incremental engine, which decides between reusing the
//! previous outline, patching it, or rebuilding it.
//!
//! ```no_run
//! use strata_analyzer::{LargeProjectAnalyzer, PrimeRequest};
//!
//! let analyzer = LargeProjectAnalyzer::with_defaults();
//! let report = analyzer.prime_cache(&PrimeRequest::new("demo", "./demo", "v1"))?;
//! println!("{} hits, {} misses", report.cache_hits, report.cache_misses);
//! # Ok::<(), strata_analyzer::AnalyzerError>(())
//! ```

mod analyzer;
mod builder;
mod enumerate;
mod error;
mod language;
mod outline;
mod report;
mod scan;

pub use analyzer::{KernelCache, LargeProjectAnalyzer, PrimeRequest};
pub use builder::{
    builder_for, BraceOutlineBuilder, IndentOutlineBuilder, LineOutlineBuilder, StructuralBuilder,
};
pub use error::AnalyzerError;
pub use language::{detect_language, extension_of, language_for_extension};
pub use outline::{BuildError, BuildMode, OutlineSymbol, StructuralOutline, SymbolKind};
pub use report::{AnalysisFailure, AnalyzerReport, FailureReason, FileAnalysisResult, FileStatus};
