use super::*;
use async_trait::async_trait;
use sp_core::{OutcomeKind, SourceDialect};
use sp_sql::{split, RewriteEngine, RuleCatalog, DEFAULT_MAX_PASSES};
use sp_warehouse::{CapabilityResult, SyntaxValidator, SyntaxVerdict};
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

/// Accepts everything slowly while tracking peak concurrency
#[derive(Default)]
struct SlowValidator {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl SyntaxValidator for SlowValidator {
    async fn validate(&self, _sql: &str) -> CapabilityResult<SyntaxVerdict> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(SyntaxVerdict::Valid)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

fn orchestrator() -> Orchestrator {
    let catalog = Arc::new(RuleCatalog::builtin().unwrap());
    Orchestrator::new(RewriteEngine::new(catalog, DEFAULT_MAX_PASSES).unwrap())
}

fn units() -> Vec<SourceUnit> {
    vec![
        split(
            "orders",
            "SELECT cardinality(items) FROM orders;\nSELECT 'open;' FROM orders;\n",
            SourceDialect::Trino,
        ),
        split(
            "daily",
            "SET hive.exec.parallel=true;\n\
             CREATE TEMPORARY FUNCTION clean_text AS 'com.acme.CleanText';\n\
             SELECT clean_text(name) FROM people;\n\
             SELECT 'unterminated FROM t",
            SourceDialect::Hive,
        ),
    ]
}

#[tokio::test]
async fn test_every_statement_has_one_outcome() {
    let units = units();
    let expected: usize = units.iter().map(SourceUnit::statement_count).sum();
    assert_eq!(expected, 6);

    let outcomes = BatchRunner::new(Arc::new(orchestrator()), 3).run(&units).await;
    assert_eq!(outcomes.len(), expected);

    let keys: Vec<(&str, usize)> = outcomes.iter().map(|o| o.key()).collect();
    assert_eq!(
        keys,
        vec![
            ("daily", 0),
            ("daily", 1),
            ("daily", 2),
            ("daily", 3),
            ("orders", 0),
            ("orders", 1)
        ]
    );
}

#[tokio::test]
async fn test_unit_functions_reach_every_statement() {
    let outcomes = BatchRunner::new(Arc::new(orchestrator()), 2)
        .run(&units())
        .await;
    let call = outcomes.iter().find(|o| o.key() == ("daily", 2)).unwrap();
    assert!(call
        .root_causes
        .contains(&sp_core::RootCause::UdfDependencyUnresolved));
    let broken = outcomes.iter().find(|o| o.key() == ("daily", 3)).unwrap();
    assert_eq!(broken.kind, OutcomeKind::Failed);
    // one bad statement does not stop the rest of its unit
    assert_eq!(
        outcomes.iter().filter(|o| o.kind == OutcomeKind::Failed).count(),
        1
    );
}

#[tokio::test]
async fn test_cancelled_run_still_reports_every_statement() {
    let runner = BatchRunner::new(Arc::new(orchestrator()), 2);
    runner.cancel_flag().store(true, Ordering::SeqCst);

    let outcomes = runner.run(&units()).await;
    assert_eq!(outcomes.len(), 6);
    assert!(outcomes
        .iter()
        .all(|o| o.failure == Some(FailureReason::Cancelled)));
}

#[tokio::test]
async fn test_progress_called_once_per_statement() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let runner = BatchRunner::new(Arc::new(orchestrator()), 4).with_progress(Arc::new(
        move |_outcome: &ConversionOutcome| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    ));

    runner.run(&units()).await;
    assert_eq!(seen.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_worker_pool_bounds_concurrency() {
    let validator = Arc::new(SlowValidator::default());
    let orch = orchestrator().with_validator(validator.clone());
    let unit = split(
        "many",
        &(0..8)
            .map(|i| format!("SELECT {} FROM t", i))
            .collect::<Vec<_>>()
            .join(";\n"),
        SourceDialect::Trino,
    );

    let outcomes = BatchRunner::new(Arc::new(orch), 2).run(&[unit]).await;
    assert_eq!(outcomes.len(), 8);
    assert!(outcomes.iter().all(|o| o.kind == OutcomeKind::AutoFixed));
    let peak = validator.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak concurrency {}", peak);
}

#[tokio::test]
async fn test_empty_input() {
    let outcomes = BatchRunner::new(Arc::new(orchestrator()), 0).run(&[]).await;
    assert!(outcomes.is_empty());
}
