//! Batch runner: converts every statement of a set of source units on a
//! bounded worker pool

use crate::orchestrator::{not_processed, Orchestrator};
use sp_core::{ConversionOutcome, FailureReason};
use sp_sql::udf::declared_temporary_functions;
use sp_sql::{SourceUnit, Statement};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Called once per finished statement, from the worker that finished it
pub type ProgressFn = Arc<dyn Fn(&ConversionOutcome) + Send + Sync>;

/// Runs the orchestrator over whole source units
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    workers: usize,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressFn>,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, workers: usize) -> Self {
        Self {
            orchestrator,
            workers: workers.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Share a cancellation flag; once set, no new statement is dispatched
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Convert every statement of `units`.
    ///
    /// Returns exactly one outcome per statement, sorted by `(unit, index)`.
    /// Statements not yet started when the run is cancelled end `Failed`
    /// with reason `Cancelled`; statements already in flight finish normally.
    pub async fn run(&self, units: &[SourceUnit]) -> Vec<ConversionOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::new();

        for unit in units {
            let declared = Arc::new(declared_temporary_functions(unit.statements()));
            if !declared.is_empty() {
                log::debug!(
                    "{}: temporary functions {}",
                    unit.name,
                    declared.iter().cloned().collect::<Vec<_>>().join(", ")
                );
            }

            for statement in unit.statements() {
                let statement = statement.clone();
                let fallback = statement.clone();
                let declared = Arc::clone(&declared);
                let orchestrator = Arc::clone(&self.orchestrator);
                let semaphore = Arc::clone(&semaphore);
                let cancel = Arc::clone(&self.cancel);
                let progress = self.progress.clone();

                let handle = tokio::spawn(async move {
                    let outcome = match semaphore.acquire().await {
                        Ok(_permit) if !cancel.load(Ordering::SeqCst) => {
                            convert_one(&orchestrator, &statement, &declared).await
                        }
                        // closed semaphore or cancelled run
                        _ => not_processed(&statement, FailureReason::Cancelled),
                    };
                    if let Some(ref progress) = progress {
                        progress(&outcome);
                    }
                    outcome
                });
                handles.push((handle, fallback));
            }
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (handle, statement) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    log::warn!("{}: worker task failed: {}", statement.display_name(), e);
                    let outcome = not_processed(
                        &statement,
                        FailureReason::Internal {
                            message: e.to_string(),
                        },
                    );
                    if let Some(ref progress) = self.progress {
                        progress(&outcome);
                    }
                    outcomes.push(outcome);
                }
            }
        }

        outcomes.sort_by(|a, b| a.key().cmp(&b.key()));
        outcomes
    }
}

async fn convert_one(
    orchestrator: &Orchestrator,
    statement: &Statement,
    declared: &BTreeSet<String>,
) -> ConversionOutcome {
    let outcome = orchestrator.convert(statement, declared).await;
    log::debug!(
        "{}#{} {}: {}",
        outcome.unit,
        outcome.index,
        outcome.name,
        outcome.kind
    );
    outcome
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod tests;
