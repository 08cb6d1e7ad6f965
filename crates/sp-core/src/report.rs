//! Run-level aggregation of conversion outcomes

use crate::outcome::{ConversionOutcome, ExecutionVerdict, OutcomeKind, RootCause};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts derived from a set of outcomes.
///
/// Built by a pure reduction that does not depend on input order: maps are
/// ordered and the outcome list is sorted by `(unit, index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub total: usize,
    pub by_outcome: BTreeMap<OutcomeKind, usize>,
    pub by_root_cause: BTreeMap<RootCause, usize>,
    pub execution: ExecutionSummary,
    pub outcomes: Vec<ConversionOutcome>,
}

/// Tally of execution verdicts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub passed: usize,
    pub failed: usize,
    pub unknown: usize,
}

impl ConversionReport {
    /// Reduce a set of outcomes into a report
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ConversionOutcome>) -> Self {
        let mut outcomes: Vec<ConversionOutcome> = outcomes.into_iter().collect();
        outcomes.sort_by(|a, b| a.key().cmp(&b.key()));

        let mut by_outcome: BTreeMap<OutcomeKind, usize> =
            OutcomeKind::ALL.iter().map(|k| (*k, 0)).collect();
        let mut by_root_cause: BTreeMap<RootCause, usize> =
            RootCause::ALL.iter().map(|c| (*c, 0)).collect();
        let mut execution = ExecutionSummary::default();

        for outcome in &outcomes {
            *by_outcome.entry(outcome.kind).or_default() += 1;
            for cause in &outcome.root_causes {
                *by_root_cause.entry(*cause).or_default() += 1;
            }
            match outcome.verdict {
                ExecutionVerdict::Pass => execution.passed += 1,
                ExecutionVerdict::Fail { .. } => execution.failed += 1,
                ExecutionVerdict::Unknown => execution.unknown += 1,
            }
        }

        Self {
            total: outcomes.len(),
            by_outcome,
            by_root_cause,
            execution,
            outcomes,
        }
    }

    /// Number of outcomes of a given kind
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.by_outcome.get(&kind).copied().unwrap_or(0)
    }

    /// Number of outcomes tagged with a root cause
    pub fn root_cause_count(&self, cause: RootCause) -> usize {
        self.by_root_cause.get(&cause).copied().unwrap_or(0)
    }

    /// Share of statements converted without human help, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let converted = self.count(OutcomeKind::AutoFixed) + self.count(OutcomeKind::AiConverted);
        converted as f64 * 100.0 / self.total as f64
    }

    pub fn has_failures(&self) -> bool {
        self.count(OutcomeKind::Failed) > 0
    }

    /// Outcomes that need a human to look at them
    pub fn needing_attention(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| o.needs_attention())
    }
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
