//! Root-cause classification of validator and warehouse messages

use sp_core::RootCause;

/// Markers checked in order; the first hit wins
const MARKERS: &[(&[&str], RootCause)] = &[
    (
        &["duplicated_map_key", "duplicate map key"],
        RootCause::DataQualityIssue,
    ),
    (
        &[
            "datatype_mismatch",
            "cast_invalid_input",
            "cannot be cast",
            "type mismatch",
        ],
        RootCause::TypeMismatch,
    ),
    (
        &["unresolved_routine", "undefined function"],
        RootCause::UdfDependencyUnresolved,
    ),
    (
        &["window function", "missing_group_by", "missing_aggregation"],
        RootCause::SemanticallyInvalidPattern,
    ),
];

/// Root cause for a syntax or execution rejection message
pub fn classify_message(message: &str) -> RootCause {
    let lower = message.to_lowercase();
    for (markers, cause) in MARKERS {
        if markers.iter().any(|m| lower.contains(m)) {
            return *cause;
        }
    }
    if lower.contains("is not allowed") && lower.contains("aggregate") {
        return RootCause::SemanticallyInvalidPattern;
    }
    RootCause::SyntaxUnsupportedConstruct
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
