//! Rules command implementation

use anyhow::{Context, Result};
use serde::Serialize;
use sp_sql::RuleCatalog;

use crate::cli::{GlobalArgs, OutputFormat, RulesArgs};
use crate::commands::common::{self, print_table};

/// One catalog entry as listed by the command
#[derive(Debug, Serialize)]
struct RuleEntry {
    order: usize,
    name: &'static str,
    dialects: Vec<&'static str>,
    priority: u32,
    after: Vec<&'static str>,
    rationale: &'static str,
}

/// Execute the rules command
pub(crate) async fn execute(args: &RulesArgs, global: &GlobalArgs) -> Result<()> {
    let dialect = common::parse_dialect(args.dialect.as_deref())?;
    let catalog = RuleCatalog::builtin().context("Failed to load rule catalog")?;

    let entries: Vec<RuleEntry> = catalog
        .rules()
        .iter()
        .enumerate()
        .filter(|(_, rule)| dialect.is_none_or(|d| rule.applies_to(d)))
        .map(|(i, rule)| RuleEntry {
            order: i + 1,
            name: rule.name,
            dialects: rule.dialects.iter().map(|d| d.as_str()).collect(),
            priority: rule.priority,
            after: rule.after.to_vec(),
            rationale: rule.rationale,
        })
        .collect();

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&entries).context("Failed to serialize rules")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = entries
                .iter()
                .map(|e| {
                    vec![
                        e.order.to_string(),
                        e.name.to_string(),
                        e.dialects.join(","),
                        e.rationale.to_string(),
                    ]
                })
                .collect();
            print_table(&["#", "RULE", "DIALECTS", "RATIONALE"], &rows);
            if global.verbose {
                eprintln!("[verbose] {} of {} rules listed", entries.len(), catalog.len());
            }
        }
    }
    Ok(())
}
