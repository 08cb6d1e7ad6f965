//! Integrate command implementation

use anyhow::{Context, Result};
use sp_convert::{read_outcomes, write_units, IntegrationPass};
use sp_core::{ConversionReport, ExecutionVerdict};
use sp_warehouse::QueryExecutor;
use std::sync::Arc;
use std::time::Instant;

use crate::cli::{GlobalArgs, IntegrateArgs, OutputFormat};
use crate::commands::common::{self, ExitCode, RunReport, REPORT_FILE};

/// Execute the integrate command
pub(crate) async fn execute(args: &IntegrateArgs, global: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let ctx = common::load_project(global)?;
    let config = &ctx.config;
    let output_dir = common::resolve_dir(&ctx.root, args.output_dir.as_deref(), &config.output_dir);

    let outcomes = read_outcomes(&output_dir).with_context(|| {
        format!(
            "Failed to read outcome records from {} (run `sparkport convert` first)",
            output_dir.display()
        )
    })?;
    if outcomes.is_empty() {
        println!("No outcome records found in {}", output_dir.display());
        return Ok(());
    }

    let Some(client) = common::warehouse_client(config, global) else {
        anyhow::bail!(
            "SQL warehouse not configured: set {} and {}, and warehouse.warehouse_id or DATABRICKS_WAREHOUSE_ID",
            config.warehouse.host_env,
            config.warehouse.token_env
        );
    };
    let executor: Arc<dyn QueryExecutor> = client;

    let executable = outcomes.iter().filter(|o| o.kind.is_executable()).count();
    if args.output == OutputFormat::Text && !global.quiet {
        println!(
            "Executing {} of {} statements{}",
            executable,
            outcomes.len(),
            if args.cleanup { " (dropping created tables afterwards)" } else { "" }
        );
    }

    let pass = IntegrationPass::new(executor)
        .with_policy(common::retry_policy(config))
        .with_workers(args.workers.unwrap_or(config.workers))
        .with_cleanup(args.cleanup);
    let outcomes = pass.run(outcomes).await;

    write_units(&output_dir, &outcomes)
        .with_context(|| format!("Failed to update outcome records in {}", output_dir.display()))?;
    let report = ConversionReport::from_outcomes(outcomes);
    let run = RunReport::new("integrate", start_time.elapsed().as_secs_f64(), &report);
    common::write_json_results(&output_dir.join(REPORT_FILE), &run)?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&run).context("Failed to serialize report")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for outcome in &report.outcomes {
                if let ExecutionVerdict::Fail { message } = &outcome.verdict {
                    println!(
                        "  FAIL {}#{} {}: {}",
                        outcome.unit,
                        outcome.index + 1,
                        outcome.name,
                        message.lines().next().unwrap_or_default()
                    );
                }
            }
            println!(
                "\nExecution: {} passed, {} failed, {} not checked",
                report.execution.passed, report.execution.failed, report.execution.unknown
            );
            println!();
            common::print_summary(&report);
        }
    }

    if report.execution.failed > 0 {
        return Err(ExitCode(1).into());
    }
    Ok(())
}
