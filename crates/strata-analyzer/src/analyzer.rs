use crate::builder::builder_for;
use crate::enumerate::{enumerate, file_stats, ProjectFile, Selection};
use crate::error::AnalyzerError;
use crate::outline::{BuildError, BuildMode, StructuralOutline};
use crate::report::{AnalyzerReport, FailureReason, FileAnalysisResult, FileStatus};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use strata_cache::{AstCache, CacheError, Fingerprint, KernelCacheManager, KernelStoreRequest};
use strata_config::{AnalyzerSection, StrataConfig};
use strata_domain::{
    DomainKind, DomainSpecializationLayer, PatternResourceAllocator, SpecializationPlan,
};
use strata_incremental::{IncrementalParseSystem, ParseStrategy};
use strata_memory::{HotspotProfiler, MemoryGuard, Priority, TracingTelemetry, GB};

/// Runs above either bound are analyzed at [`Priority::High`] whatever the
/// plan says.
const ESCALATION_FILE_COUNT: usize = 2_000;
const ESCALATION_PROJECT_BYTES: u64 = 2 * GB;

const REJECTION_MESSAGE: &str = "memory guard refused to admit the kernel";

/// The kernel cache the analyzer populates.
pub type KernelCache = KernelCacheManager<StructuralOutline>;

/// Arguments of [`LargeProjectAnalyzer::prime_cache`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrimeRequest {
    pub project_id: String,
    pub root: PathBuf,
    pub version: String,
    /// Skip domain inference and use this profile.
    pub domain: Option<DomainKind>,
    /// Analyze only these files (relative to `root` or absolute).
    pub files: Option<Vec<PathBuf>>,
    /// Analyze only files detected as this language.
    pub language: Option<String>,
    /// Overrides the configured `max_files` for this run.
    pub max_files: Option<usize>,
}

impl PrimeRequest {
    pub fn new(
        project_id: impl Into<String>,
        root: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            root: root.into(),
            version: version.into(),
            domain: None,
            files: None,
            language: None,
            max_files: None,
        }
    }

    pub fn domain(mut self, domain: DomainKind) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = Some(max_files);
        self
    }
}

#[derive(Debug, Clone)]
struct Settings {
    ignore_dirs: Vec<String>,
    max_files: Option<usize>,
}

impl From<&AnalyzerSection> for Settings {
    fn from(section: &AnalyzerSection) -> Self {
        Self {
            ignore_dirs: section.ignore_dirs.clone(),
            max_files: section.max_files,
        }
    }
}

struct Run<'a> {
    project_id: &'a str,
    version: &'a str,
    priority: Priority,
    project_size_bytes: u64,
}

/// Primes a [`KernelCache`] with structural outlines of a project's files,
/// reusing or patching previous outlines where the incremental engine allows.
///
/// The kernel cache may be shared between analyzers; the diff baselines are
/// private to each analyzer. Files are processed sequentially in sorted
/// order, and no per-file failure aborts a run.
pub struct LargeProjectAnalyzer {
    kernels: Arc<KernelCache>,
    incremental: IncrementalParseSystem,
    specialization: RwLock<DomainSpecializationLayer>,
    settings: RwLock<Settings>,
    profiler: HotspotProfiler,
}

impl LargeProjectAnalyzer {
    pub fn new(kernels: Arc<KernelCache>, incremental: IncrementalParseSystem) -> Self {
        let analyzer = AnalyzerSection::default();
        Self {
            kernels,
            incremental,
            specialization: RwLock::new(DomainSpecializationLayer::new(
                PatternResourceAllocator::new(analyzer.max_parallel_parse_tasks),
            )),
            settings: RwLock::new(Settings::from(&analyzer)),
            profiler: HotspotProfiler::disabled(),
        }
    }

    /// Analyzer over a private cache with default limits and no system
    /// memory sampling.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(KernelCacheManager::with_defaults()),
            IncrementalParseSystem::default(),
        )
    }

    /// Build every component from `config`. Fails without side effects when
    /// the config has validation errors. Parse hotspots go to `tracing`.
    pub fn from_config(config: &StrataConfig) -> Result<Self, AnalyzerError> {
        config.ensure_valid()?;
        let guard = MemoryGuard::with_sampler(config.guard_limits(), config.memory.sampler())
            .map_err(CacheError::from)?;
        let cache = AstCache::new(config.cache_config(), guard)?;
        let kernels = KernelCacheManager::new(Arc::new(cache))
            .with_failure_capacity(config.cache.failure_capacity);
        let incremental = IncrementalParseSystem::new(config.incremental_config())?;

        let analyzer = Self::new(Arc::new(kernels), incremental)
            .with_profiler(HotspotProfiler::new(Arc::new(TracingTelemetry)));
        *analyzer.specialization.write() = DomainSpecializationLayer::new(
            PatternResourceAllocator::new(config.analyzer.max_parallel_parse_tasks),
        );
        *analyzer.settings.write() = Settings::from(&config.analyzer);
        Ok(analyzer)
    }

    pub fn with_profiler(mut self, profiler: HotspotProfiler) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn kernels(&self) -> &Arc<KernelCache> {
        &self.kernels
    }

    pub fn incremental(&self) -> &IncrementalParseSystem {
        &self.incremental
    }

    /// Apply a new configuration at runtime.
    ///
    /// The whole config is validated first, so an invalid one changes
    /// nothing. The system sampler and failure capacity are fixed at
    /// construction and are not affected.
    pub fn apply_config(&self, config: &StrataConfig) -> Result<(), AnalyzerError> {
        config.ensure_valid()?;

        self.kernels
            .guard()
            .reconfigure(config.guard_limits())
            .map_err(CacheError::from)?;
        let cache = config.cache_config();
        self.kernels.apply_cache_overrides(
            Some(cache.max_entries),
            Some(cache.max_bytes),
            Some(cache.ttl_seconds),
        )?;
        self.incremental.reconfigure(config.incremental_config())?;
        *self.specialization.write() = DomainSpecializationLayer::new(
            PatternResourceAllocator::new(config.analyzer.max_parallel_parse_tasks),
        );
        *self.settings.write() = Settings::from(&config.analyzer);

        tracing::info!(
            target: "strata.analyzer",
            max_entries = cache.max_entries,
            max_bytes = cache.max_bytes,
            ttl_seconds = cache.ttl_seconds,
            "analyzer configuration applied"
        );
        Ok(())
    }

    /// The plan `prime_cache` would apply to `root`, without applying it.
    pub fn plan_for_root(
        &self,
        root: &Path,
        domain: Option<DomainKind>,
    ) -> Result<SpecializationPlan, AnalyzerError> {
        if !root.is_dir() {
            return Err(AnalyzerError::RootNotFound(root.to_path_buf()));
        }
        let settings = self.settings.read().clone();
        let files = enumerate(
            root,
            &Selection {
                ignore_dirs: &settings.ignore_dirs,
                max_files: settings.max_files,
                ..Selection::default()
            },
        );
        let (stats, project_size_bytes) = file_stats(&files);
        Ok(self
            .specialization
            .read()
            .plan_for_project(&stats, project_size_bytes, domain))
    }

    pub fn prime_cache(&self, request: &PrimeRequest) -> Result<AnalyzerReport, AnalyzerError> {
        let started = Instant::now();
        if !request.root.is_dir() {
            return Err(AnalyzerError::RootNotFound(request.root.clone()));
        }

        let settings = self.settings.read().clone();
        let files = enumerate(
            &request.root,
            &Selection {
                ignore_dirs: &settings.ignore_dirs,
                files: request.files.as_deref(),
                language: request.language.as_deref(),
                max_files: request.max_files.or(settings.max_files),
            },
        );
        let (stats, project_size_bytes) = file_stats(&files);

        let plan = self
            .specialization
            .read()
            .plan_for_project(&stats, project_size_bytes, request.domain);
        self.kernels.apply_cache_overrides(
            Some(plan.cache_overrides.max_entries),
            None,
            Some(plan.cache_overrides.ttl_seconds),
        )?;
        let priority = effective_priority(plan.memory_priority, files.len(), project_size_bytes);

        tracing::info!(
            target: "strata.analyzer",
            project_id = %request.project_id,
            version = %request.version,
            files = files.len(),
            project_size_bytes,
            domain = %plan.domain,
            priority = priority.as_str(),
            max_entries = plan.cache_overrides.max_entries,
            "specialization plan applied"
        );

        let run = Run {
            project_id: &request.project_id,
            version: &request.version,
            priority,
            project_size_bytes,
        };
        let mut report = AnalyzerReport {
            project_id: request.project_id.clone(),
            root: request.root.clone(),
            version: request.version.clone(),
            plan,
            priority,
            total_files: files.len(),
            processed: 0,
            cache_hits: 0,
            cache_misses: 0,
            reused: 0,
            partial_reparses: 0,
            full_parses: 0,
            stored: 0,
            rejected: 0,
            failures: Vec::new(),
            files: Vec::with_capacity(files.len()),
            cache_stats: self.kernels.cache().stats(),
            duration_ms: 0.0,
        };

        for file in &files {
            report.record(self.analyze_file(&run, file));
        }

        report.cache_stats = self.kernels.cache().stats();
        report.duration_ms = started.elapsed().as_secs_f64() * 1_000.0;

        tracing::info!(
            target: "strata.analyzer",
            project_id = %report.project_id,
            processed = report.processed,
            cache_hits = report.cache_hits,
            cache_misses = report.cache_misses,
            reused = report.reused,
            partial_reparses = report.partial_reparses,
            full_parses = report.full_parses,
            rejected = report.rejected,
            failures = report.failures.len(),
            duration_ms = report.duration_ms,
            "analysis run finished"
        );
        Ok(report)
    }

    fn analyze_file(&self, run: &Run<'_>, file: &ProjectFile) -> FileAnalysisResult {
        let started = Instant::now();
        let mut result = match self.process_file(run, file) {
            Ok(result) => result,
            Err(err) => self.file_failed(run, file, err),
        };
        result.duration_ms = started.elapsed().as_secs_f64() * 1_000.0;
        result
    }

    fn process_file(
        &self,
        run: &Run<'_>,
        file: &ProjectFile,
    ) -> Result<FileAnalysisResult, AnalyzerError> {
        let bytes = std::fs::read(&file.path).map_err(|source| AnalyzerError::Io {
            path: file.path.clone(),
            source,
        })?;
        // Keyed on the raw bytes; the lossy text only feeds diffing and building.
        let content_hash = Fingerprint::from_bytes(&bytes).into_string();
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let context_key = format!("{}:{}", run.project_id, file.relative);

        let mut result = FileAnalysisResult::new(&file.relative, file.language, FileStatus::Stored);
        result.content_hash = Some(content_hash.clone());

        if let Some(hit) = self.kernels.get_kernel(
            run.project_id,
            &file.relative,
            Some(&content_hash),
            Some(run.version),
        ) {
            self.incremental.update_context(
                &context_key,
                &content_hash,
                run.version,
                file.language,
                &content,
            );
            result.status = FileStatus::CacheHit;
            result.symbols = hit.ast().symbols.len();
            result.size_bytes = Some(hit.entry.size_bytes);
            return Ok(result);
        }

        let (summary, baseline) =
            self.incremental
                .compute_diff(&context_key, &content, run.version, file.language);
        // A previous kernel is only a valid base when it was built from the
        // content the diff was taken against.
        let previous = self
            .kernels
            .peek_kernel(run.project_id, &file.relative)
            .filter(|prev| {
                baseline
                    .as_ref()
                    .is_some_and(|ctx| ctx.content_hash == prev.entry.content_hash)
            });
        let decision = self.incremental.evaluate_delta(previous.is_some(), &summary);
        let builder = builder_for(file.language);

        let mut metadata = BTreeMap::new();
        metadata.insert("file".to_owned(), file.relative.clone());
        metadata.insert("language".to_owned(), file.language.to_owned());
        metadata.insert("strategy".to_owned(), decision.strategy().as_str().to_owned());

        let (outline, build_mode) = match (decision.strategy(), previous.as_ref()) {
            (ParseStrategy::ReuseAst, Some(prev)) => (Arc::clone(prev.ast()), None),
            (ParseStrategy::PartialReparse, Some(prev)) => {
                let (outline, mode) = self
                    .profiler
                    .measure("analyzer.partial_reparse", &metadata, || {
                        builder.rebuild(file.language, &content, prev.ast(), &summary.changed_lines)
                    })
                    .map_err(|err| parse_error(file, err))?;
                (Arc::new(outline), Some(mode))
            }
            _ => {
                let outline = self
                    .profiler
                    .measure("analyzer.full_parse", &metadata, || {
                        builder.build(file.language, &content)
                    })
                    .map_err(|err| parse_error(file, err))?;
                (Arc::new(outline), Some(BuildMode::Full))
            }
        };

        result.similarity = previous
            .as_ref()
            .map(|prev| self.incremental.compare_ast_versions(prev.ast().as_ref(), outline.as_ref()));

        metadata.insert("reason".to_owned(), decision.reason().as_str().to_owned());
        let stored = self.kernels.store_kernel(
            KernelStoreRequest::new(run.project_id, &file.relative, Arc::clone(&outline), &content)
                .content_hash(&content_hash)
                .version(run.version)
                .language(file.language)
                .parser(builder.parser())
                .project_size_bytes(Some(run.project_size_bytes))
                .priority(run.priority)
                .metadata(metadata),
        );
        self.incremental.update_context(
            &context_key,
            &content_hash,
            run.version,
            file.language,
            &content,
        );

        result.strategy = Some(decision.strategy());
        result.reason = Some(decision.reason());
        result.build_mode = build_mode;
        result.symbols = outline.symbols.len();

        tracing::debug!(
            target: "strata.analyzer",
            file = %file.relative,
            strategy = decision.strategy().as_str(),
            reason = decision.reason().as_str(),
            change_ratio = summary.change_ratio,
            stored = stored.is_some(),
            "kernel processed"
        );
        result.diff = Some(summary);

        match stored {
            Some(artifact) => {
                result.size_bytes = Some(artifact.size_bytes);
            }
            None => {
                result.status = FileStatus::Rejected;
                result.error = Some(REJECTION_MESSAGE.to_owned());
                self.record_failure(run, file, FailureReason::CacheRejection, REJECTION_MESSAGE);
            }
        }
        Ok(result)
    }

    fn file_failed(
        &self,
        run: &Run<'_>,
        file: &ProjectFile,
        err: AnalyzerError,
    ) -> FileAnalysisResult {
        let (status, reason) = match &err {
            AnalyzerError::Io { .. } => (FileStatus::IoError, FailureReason::IoError),
            _ => (FileStatus::ParseError, FailureReason::ParseError),
        };
        let message = err.to_string();
        self.record_failure(run, file, reason, &message);

        let mut result = FileAnalysisResult::new(&file.relative, file.language, status);
        result.error = Some(message);
        result
    }

    fn record_failure(&self, run: &Run<'_>, file: &ProjectFile, reason: FailureReason, error: &str) {
        tracing::warn!(
            target: "strata.analyzer",
            project_id = run.project_id,
            file = %file.relative,
            reason = reason.as_str(),
            error,
            "file analysis failed"
        );
        let mut metadata = BTreeMap::new();
        metadata.insert("reason".to_owned(), reason.as_str().to_owned());
        metadata.insert("language".to_owned(), file.language.to_owned());
        metadata.insert("version".to_owned(), run.version.to_owned());
        self.kernels
            .record_failure(run.project_id, &file.relative, error, metadata);
    }
}

impl Default for LargeProjectAnalyzer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for LargeProjectAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeProjectAnalyzer")
            .field("cache", &self.kernels.cache().stats())
            .field("incremental", &self.incremental)
            .finish_non_exhaustive()
    }
}

fn parse_error(file: &ProjectFile, err: BuildError) -> AnalyzerError {
    AnalyzerError::Parse {
        path: file.path.clone(),
        language: file.language.to_owned(),
        message: err.to_string(),
    }
}

fn effective_priority(planned: Priority, file_count: usize, project_size_bytes: u64) -> Priority {
    if file_count > ESCALATION_FILE_COUNT || project_size_bytes > ESCALATION_PROJECT_BYTES {
        Priority::High
    } else {
        planned
    }
}
