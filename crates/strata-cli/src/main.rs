use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use strata_analyzer::{AnalyzerReport, LargeProjectAnalyzer, PrimeRequest};
use strata_cache::{KernelFailureRecord, KernelStats};
use strata_config::{init_tracing, ConfigDiagnostics, StrataConfig};
use strata_domain::{DomainKind, SpecializationPlan};

#[derive(Parser)]
#[command(name = "strata", version, about = "Strata CLI (cache priming, planning, config)")]
struct Cli {
    /// Config file (defaults to `$STRATA_CONFIG_PATH`, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prime the parse cache for a project and report what happened
    Analyze(AnalyzeArgs),
    /// Print the specialization plan a project would get
    Plan(PlanArgs),
    /// Print the effective configuration and its diagnostics
    Config(ConfigArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Project root directory
    root: PathBuf,
    /// Cache namespace (defaults to the root directory name)
    #[arg(long)]
    project_id: Option<String>,
    /// Version tag stored with every kernel
    #[arg(long, default_value = "workspace")]
    version: String,
    /// Skip domain inference
    #[arg(long)]
    domain: Option<DomainKind>,
    /// Analyze at most this many files
    #[arg(long)]
    max_files: Option<usize>,
    /// Only analyze files of this language
    #[arg(long)]
    language: Option<String>,
    /// Prime the same cache this many times (later runs show cache hits)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PlanArgs {
    /// Project root directory
    root: PathBuf,
    /// Skip domain inference
    #[arg(long)]
    domain: Option<DomainKind>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Emit JSON instead of TOML
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let (config, diagnostics) =
        StrataConfig::discover(cli.config.as_deref()).context("failed to load config")?;
    init_tracing(&config.logging);
    log_diagnostics(&diagnostics);

    match cli.command {
        Command::Analyze(args) => analyze(&config, args),
        Command::Plan(args) => {
            let analyzer = LargeProjectAnalyzer::from_config(&config)?;
            let plan = analyzer.plan_for_root(&args.root, args.domain)?;
            if args.json {
                print_json(&plan)?;
            } else {
                print_plan(&plan);
            }
            Ok(0)
        }
        Command::Config(args) => {
            if args.json {
                print_json(&ConfigEnvelope {
                    config: &config,
                    unknown_keys: &diagnostics.unknown_keys,
                    warnings: diagnostics.warnings.iter().map(ToString::to_string).collect(),
                    errors: diagnostics.errors.iter().map(ToString::to_string).collect(),
                })?;
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(if diagnostics.errors.is_empty() { 0 } else { 1 })
        }
    }
}

#[derive(Serialize)]
struct ConfigEnvelope<'a> {
    config: &'a StrataConfig,
    unknown_keys: &'a [String],
    warnings: Vec<String>,
    errors: Vec<String>,
}

#[derive(Serialize)]
struct AnalyzeEnvelope {
    runs: Vec<AnalyzerReport>,
    kernels: KernelStats,
    recent_failures: Vec<KernelFailureRecord>,
}

const RECENT_FAILURES: usize = 20;

fn analyze(config: &StrataConfig, args: AnalyzeArgs) -> Result<i32> {
    let analyzer = LargeProjectAnalyzer::from_config(config)?;
    let mut request = PrimeRequest::new(project_id(&args), &args.root, &args.version);
    request.domain = args.domain;
    request.language = args.language;
    request.max_files = args.max_files;

    let mut runs = Vec::with_capacity(args.runs as usize);
    for run in 1..=args.runs {
        let report = analyzer.prime_cache(&request)?;
        if !args.json {
            print_report(&report, run, args.runs);
        }
        runs.push(report);
    }

    let failed = runs.last().is_some_and(|report| !report.failures.is_empty());
    if args.json {
        print_json(&AnalyzeEnvelope {
            runs,
            kernels: analyzer.kernels().stats(),
            recent_failures: analyzer.kernels().get_failure_report(Some(RECENT_FAILURES)),
        })?;
    }
    Ok(if failed { 1 } else { 0 })
}

fn project_id(args: &AnalyzeArgs) -> String {
    args.project_id.clone().unwrap_or_else(|| {
        std::fs::canonicalize(&args.root)
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_owned())
    })
}

fn log_diagnostics(diagnostics: &ConfigDiagnostics) {
    if !diagnostics.unknown_keys.is_empty() {
        tracing::warn!(
            target: "strata.cli",
            keys = ?diagnostics.unknown_keys,
            "ignoring unknown config keys"
        );
    }
    for warning in &diagnostics.warnings {
        tracing::warn!(target: "strata.cli", "{warning}");
    }
    for error in &diagnostics.errors {
        tracing::error!(target: "strata.cli", "{error}");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_plan(plan: &SpecializationPlan) {
    println!("plan:");
    println!("  domain: {}", plan.domain);
    println!("  memory_priority: {}", plan.memory_priority.as_str());
    println!("  max_entries: {}", plan.cache_overrides.max_entries);
    println!("  ttl_seconds: {}", plan.cache_overrides.ttl_seconds);
    println!("  agent_roles: {}", plan.agent_roles.join(", "));
    println!("  parallel_workers: {}", plan.resource_budget.parallel_workers);
    println!("  memory_multiplier: {:.2}", plan.resource_budget.memory_multiplier);
}

fn print_report(report: &AnalyzerReport, run: u32, runs: u32) {
    println!("analyzed: {} (run {run}/{runs})", report.root.display());
    println!("  project: {} @ {}", report.project_id, report.version);
    println!(
        "  domain: {} (priority {})",
        report.plan.domain,
        report.priority.as_str()
    );
    println!("  files: {} processed of {}", report.processed, report.total_files);
    println!(
        "  cache: {} hits, {} misses",
        report.cache_hits, report.cache_misses
    );
    println!(
        "  parses: {} reused, {} partial, {} full",
        report.reused, report.partial_reparses, report.full_parses
    );
    println!("  stored: {}, rejected: {}", report.stored, report.rejected);
    println!(
        "  cache_entries: {} ({} bytes)",
        report.cache_stats.entries, report.cache_stats.bytes
    );
    println!("  elapsed_ms: {:.1}", report.duration_ms);
    if !report.failures.is_empty() {
        println!("  failures: {}", report.failures.len());
        for failure in &report.failures {
            println!(
                "    {} [{}] {}",
                failure.file_path,
                failure.reason.as_str(),
                failure.error
            );
        }
    }
}
