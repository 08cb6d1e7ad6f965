//! Convert command implementation

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sp_convert::{discover_units, write_units, BatchRunner, Orchestrator};
use sp_core::{ConversionOutcome, ConversionReport};
use sp_sql::{RewriteEngine, RuleCatalog, SourceUnit};
use sp_warehouse::{AiConverter, OfflineValidator, SyntaxValidator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cli::{ConvertArgs, GlobalArgs, OutputFormat};
use crate::commands::common::{self, ExitCode, RunReport, REPORT_FILE};

/// Execute the convert command
pub(crate) async fn execute(args: &ConvertArgs, global: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let mut ctx = common::load_project(global)?;

    if let Some(workers) = args.workers {
        ctx.config.workers = workers;
    }
    if let Some(max_passes) = args.max_passes {
        ctx.config.rewrite.max_passes = max_passes;
    }
    if args.no_ai {
        ctx.config.escalation.enabled = false;
    }
    ctx.config.validate().context("Invalid configuration")?;
    let config = &ctx.config;

    let dialect = common::parse_dialect(args.dialect.as_deref())?;
    let source_dir = common::resolve_dir(&ctx.root, args.source_dir.as_deref(), &config.source_dir);
    let output_dir = common::resolve_dir(&ctx.root, args.output_dir.as_deref(), &config.output_dir);

    let units = discover_units(config, &source_dir, dialect)
        .with_context(|| format!("Failed to read sources from {}", source_dir.display()))?;
    let total: usize = units.iter().map(SourceUnit::statement_count).sum();

    // nothing can be trusted without the catalog
    let catalog = Arc::new(RuleCatalog::builtin().context("Failed to load rule catalog")?);
    let engine = RewriteEngine::new(catalog, config.rewrite.max_passes)
        .context("Failed to build rewrite engine")?;
    let orchestrator = build_orchestrator(engine, args, global, config);

    let text_mode = args.output == OutputFormat::Text;
    if text_mode && !global.quiet {
        println!(
            "Converting {} statements from {} source units ({} workers)",
            total,
            units.len(),
            config.workers
        );
    }

    let progress = if text_mode && !global.quiet {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(Arc::new(pb))
    } else {
        None
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted: finishing statements in flight, skipping the rest");
                cancel.store(true, Ordering::SeqCst);
            }
        })
    };

    let mut runner =
        BatchRunner::new(Arc::new(orchestrator), config.workers).with_cancel(Arc::clone(&cancel));
    if let Some(pb) = &progress {
        let pb = Arc::clone(pb);
        runner = runner.with_progress(Arc::new(move |outcome: &ConversionOutcome| {
            pb.set_message(format!("{}#{}", outcome.unit, outcome.index + 1));
            pb.inc(1);
        }));
    }

    let outcomes = runner.run(&units).await;
    watcher.abort();
    if let Some(pb) = progress {
        pb.finish_with_message("Complete");
    }

    write_units(&output_dir, &outcomes)
        .with_context(|| format!("Failed to write output to {}", output_dir.display()))?;
    let report = ConversionReport::from_outcomes(outcomes);
    let run = RunReport::new("convert", start_time.elapsed().as_secs_f64(), &report);
    let report_path = output_dir.join(REPORT_FILE);
    common::write_json_results(&report_path, &run)?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&run).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!();
            common::print_summary(&report);
            if !global.quiet {
                common::print_attention(&report);
            }
            println!("\nOutput written to {}", output_dir.display());
            if global.verbose {
                eprintln!("[verbose] Report: {}", report_path.display());
            }
        }
    }

    if cancel.load(Ordering::SeqCst) || report.has_failures() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

/// Wire the capabilities selected by flags and configuration
fn build_orchestrator(
    engine: RewriteEngine,
    args: &ConvertArgs,
    global: &GlobalArgs,
    config: &sp_core::Config,
) -> Orchestrator {
    let mut orchestrator =
        Orchestrator::new(engine).with_policy(common::retry_policy(config));

    let client = if args.offline {
        None
    } else {
        common::warehouse_client(config, global)
    };

    let validator: Arc<dyn SyntaxValidator> = match &client {
        Some(client) => client.clone(),
        None => {
            if !args.offline && !global.quiet {
                eprintln!("SQL warehouse not configured; validating with the offline parser");
            }
            Arc::new(OfflineValidator::new())
        }
    };
    if global.verbose {
        eprintln!("[verbose] Syntax validator: {}", validator.name());
    }
    orchestrator = orchestrator.with_validator(validator);

    if config.escalation.enabled {
        if let Some(client) = client {
            let ai: Arc<dyn AiConverter> = client;
            orchestrator = orchestrator.with_ai(ai);
        } else if global.verbose {
            eprintln!("[verbose] AI escalation unavailable without a SQL warehouse");
        }
    }
    orchestrator
}
