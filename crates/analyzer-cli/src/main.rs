//! CLI entry point (§4.9): wires the ruleset loader, scope layer, provider
//! registry and scheduler together and renders the resulting report.

mod config;
mod loader;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use analyzer_domain::error::Result;
use analyzer_domain::ports::{CompositeScope, Scope};
use analyzer_engine::evaluator::ProviderRegistry;
use analyzer_engine::scheduler::{RuleScheduler, SchedulerOptions};
use analyzer_engine::scope::{ExcludedPathScope, IncludedPathScope};
use analyzer_engine::violation_builder::BuilderOptions;
use analyzer_providers::KeywordProvider;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "analyzer", version, about = "Rule-based static source analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one or more rulesets against a source tree.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// A rule YAML file, or a directory of them.
    #[arg(long)]
    rules: PathBuf,
    /// Root of the source tree to analyze.
    #[arg(long)]
    source: PathBuf,
    /// Optional TOML file layered under environment overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output format, overriding the configured default.
    #[arg(long)]
    format: Option<String>,
    /// A rule-label selector expression, overriding the configured default.
    #[arg(long)]
    selector: Option<String>,
    /// Basename to narrow every rule to; repeatable. Merged with the
    /// configured `included_paths` (empty = pass all, §4.3).
    #[arg(long = "include")]
    include: Vec<String>,
    /// Regex pattern excluding matching basenames from every rule;
    /// repeatable. Merged with the configured `excluded_paths`.
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Command::Run(args) = cli.command;

    let mut app_config = AppConfig::load(args.config.as_deref())?;
    if let Some(format) = args.format {
        app_config.format = format;
    }
    if let Some(selector) = args.selector {
        app_config.rule_selector = Some(selector);
    }
    app_config.included_paths.extend(args.include);
    app_config.excluded_paths.extend(args.exclude);

    init_tracing(&app_config.log_level);

    let rulesets = loader::load_path(&args.rules)?;
    tracing::info!(count = rulesets.len(), "loaded rulesets");

    let mut scopes: Vec<Box<dyn Scope>> = vec![Box::new(IncludedPathScope::new(app_config.included_paths.clone()))];
    if !app_config.excluded_paths.is_empty() {
        scopes.push(Box::new(ExcludedPathScope::new(&app_config.excluded_paths)?));
    }
    let scope: Arc<dyn Scope> = Arc::new(CompositeScope::new(scopes));

    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(KeywordProvider::new(args.source.clone())));

    let scheduler_options = SchedulerOptions {
        workers: app_config.workers.max(1),
        rule_selector: app_config.rule_selector.clone(),
        builder: BuilderOptions {
            incident_limit: app_config.incident_limit,
            code_snip_limit: app_config.code_snip_limit,
            context_lines: app_config.context_lines,
            location_prefixes: app_config.location_prefixes.clone(),
            incident_selector: None,
        },
    };

    let cancel = CancellationToken::new();
    let scheduler = RuleScheduler::new(providers, scope, scheduler_options, None);

    let mut results = Vec::with_capacity(rulesets.len());
    let mut has_violations = false;
    for ruleset in &rulesets {
        let result = scheduler.run(ruleset, &cancel).await?;
        has_violations |= !result.violations.is_empty();
        results.push(result);
    }

    let rendered = report::render(&results, &app_config.format)?;
    println!("{rendered}");

    Ok(if has_violations {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_owned()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
