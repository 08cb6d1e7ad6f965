//! Execution pass: runs converted statements against the warehouse.
//!
//! Verdicts and root causes are added to the outcomes; the outcome kind
//! assigned during conversion never changes. Statements of one unit run in
//! order because later statements usually read tables created by earlier
//! ones; units run concurrently.

use crate::classify::classify_message;
use sp_core::{ConversionOutcome, ExecutionVerdict, RootCause, Stage};
use sp_sql::lexer::tokenize_target;
use sp_sql::matcher::is_create_table;
use sp_sql::splitter::statement_name;
use sp_warehouse::traits::QUERY_EXECUTOR;
use sp_warehouse::{with_retry, QueryExecutor, RetryPolicy};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

const FAILED_NOTE: &str = "execution failed: ";
const UNCHECKED_NOTE: &str = "execution not checked: ";

/// Runs every executable outcome through a [`QueryExecutor`]
pub struct IntegrationPass {
    executor: Arc<dyn QueryExecutor>,
    policy: RetryPolicy,
    workers: usize,
    cleanup: bool,
}

impl IntegrationPass {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self {
            executor,
            policy: RetryPolicy::default(),
            workers: 1,
            cleanup: false,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of units executed concurrently
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Drop the tables each unit created once the unit has run
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Execute `outcomes` and return them, sorted by `(unit, index)`
    pub async fn run(&self, outcomes: Vec<ConversionOutcome>) -> Vec<ConversionOutcome> {
        let mut units: BTreeMap<String, Vec<ConversionOutcome>> = BTreeMap::new();
        for outcome in outcomes {
            units.entry(outcome.unit.clone()).or_default().push(outcome);
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();
        for (unit, mut list) in units {
            list.sort_by_key(|o| o.index);
            let fallback = list.clone();
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&self.executor);
            let policy = self.policy;
            let cleanup = self.cleanup;

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                run_unit(executor.as_ref(), &policy, cleanup, list).await
            });
            handles.push((unit, handle, fallback));
        }

        let mut all = Vec::new();
        for (unit, handle, fallback) in handles {
            match handle.await {
                Ok(mut list) => all.append(&mut list),
                Err(e) => {
                    log::warn!("{}: execution task failed: {}", unit, e);
                    all.extend(fallback);
                }
            }
        }
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }
}

async fn run_unit(
    executor: &dyn QueryExecutor,
    policy: &RetryPolicy,
    cleanup: bool,
    mut list: Vec<ConversionOutcome>,
) -> Vec<ConversionOutcome> {
    let mut created = Vec::new();

    for outcome in list.iter_mut() {
        if !outcome.kind.is_executable() || outcome.final_sql.trim().is_empty() {
            continue;
        }
        execute_one(executor, policy, outcome).await;
        if outcome.verdict == ExecutionVerdict::Pass {
            if let Some(table) = created_table(&outcome.final_sql) {
                created.push(table);
            }
        }
    }

    if cleanup {
        for table in created.iter().rev() {
            let sql = format!("DROP TABLE IF EXISTS {}", table);
            match with_retry(policy, QUERY_EXECUTOR, || executor.execute(&sql)).await {
                Ok(ExecutionVerdict::Pass) => log::debug!("dropped {}", table),
                Ok(verdict) => log::warn!("could not drop {}: {:?}", table, verdict),
                Err(e) => log::warn!("could not drop {}: {}", table, e),
            }
        }
    }
    list
}

/// Execute one statement and record the verdict on its outcome
pub async fn execute_one(
    executor: &dyn QueryExecutor,
    policy: &RetryPolicy,
    outcome: &mut ConversionOutcome,
) {
    clear_execution(outcome);

    let sql = outcome.final_sql.trim().to_string();
    match with_retry(policy, QUERY_EXECUTOR, || executor.execute(&sql)).await {
        Ok(ExecutionVerdict::Fail { message }) => {
            log::warn!("{}: execution failed: {}", outcome.name, message);
            add_execution_cause(outcome, classify_message(&message));
            outcome.notes.push(format!("{}{}", FAILED_NOTE, message));
            outcome.verdict = ExecutionVerdict::Fail { message };
        }
        Ok(verdict) => outcome.verdict = verdict,
        Err(e) => {
            log::warn!("{}: {}", outcome.name, e);
            add_execution_cause(outcome, RootCause::ExternalServiceError);
            outcome.notes.push(format!("{}{}", UNCHECKED_NOTE, e));
            outcome.verdict = ExecutionVerdict::Unknown;
        }
    }
    outcome.stages.push(Stage::ExecutionChecked);
    outcome.stages.push(Stage::Done);
}

/// Drop what a previous execution recorded; conversion tags stay
fn clear_execution(outcome: &mut ConversionOutcome) {
    outcome
        .stages
        .retain(|s| !matches!(s, Stage::ExecutionChecked | Stage::Done));
    for cause in std::mem::take(&mut outcome.execution_causes) {
        outcome.root_causes.remove(&cause);
    }
    outcome
        .notes
        .retain(|n| !n.starts_with(FAILED_NOTE) && !n.starts_with(UNCHECKED_NOTE));
    outcome.verdict = ExecutionVerdict::Unknown;
}

fn add_execution_cause(outcome: &mut ConversionOutcome, cause: RootCause) {
    if outcome.root_causes.insert(cause) {
        outcome.execution_causes.insert(cause);
    }
}

/// Name of the table a `CREATE TABLE` statement creates
pub fn created_table(sql: &str) -> Option<String> {
    let tokens = tokenize_target(sql);
    if !is_create_table(&tokens) {
        return None;
    }
    statement_name(&tokens)
}

#[cfg(test)]
#[path = "integrate_test.rs"]
mod tests;
