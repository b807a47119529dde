//! Constraint evaluation
//!
//! Post-filters applied after semantic scoring, in declining priority:
//! uniqueness policies, text proximity, and deterministic positional
//! tiebreaks.

use crate::types::{Constraint, ConstraintKind, ElementSemantics, PositionStrategy, UniquenessMode};
use scraper::ElementRef;
use tracing::debug;

/// A scored candidate flowing through the resolver pipeline.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// The matched element.
    pub element: ElementRef<'a>,
    /// Extracted identity semantics.
    pub semantics: ElementSemantics,
    /// Semantic similarity against the recorded target.
    pub score: f64,
    /// Document-order rank among the phase-1 matches.
    pub order: usize,
}

/// Result of a constraint pass.
#[derive(Debug)]
pub struct ConstraintOutcome<'a> {
    /// Surviving candidates, best first.
    pub candidates: Vec<Candidate<'a>>,
    /// Set when a strict uniqueness constraint failed outright.
    pub failed: bool,
}

/// Apply the EID's constraints in declining priority order.
pub fn apply_constraints<'a>(
    mut candidates: Vec<Candidate<'a>>,
    constraints: &[Constraint],
    warnings: &mut Vec<String>,
) -> ConstraintOutcome<'a> {
    let mut ordered: Vec<&Constraint> = constraints.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    for constraint in ordered {
        if candidates.is_empty() {
            break;
        }
        match &constraint.kind {
            ConstraintKind::Uniqueness { mode } => match mode {
                UniquenessMode::Strict => {
                    if candidates.len() > 1 {
                        debug!(count = candidates.len(), "strict uniqueness failed");
                        warnings.push(format!(
                            "strict uniqueness constraint failed: {} candidates",
                            candidates.len()
                        ));
                        return ConstraintOutcome {
                            candidates: Vec::new(),
                            failed: true,
                        };
                    }
                }
                UniquenessMode::BestScore => {
                    if candidates.len() > 1 {
                        candidates = vec![take_best(candidates)];
                    }
                }
                UniquenessMode::AllowMultiple => {}
            },
            ConstraintKind::TextProximity {
                reference,
                max_distance,
            } => {
                candidates.retain(|c| {
                    let text = c
                        .semantics
                        .text
                        .as_ref()
                        .map(|t| t.normalized.as_str())
                        .unwrap_or("");
                    strsim::levenshtein(reference, text) as u32 <= *max_distance
                });
            }
            ConstraintKind::Position { strategy } => {
                if candidates.len() > 1 {
                    if !matches!(strategy, PositionStrategy::FirstInDom) {
                        warnings.push(format!(
                            "position strategy {:?} requires layout; using first-in-dom",
                            strategy
                        ));
                    }
                    let first = candidates
                        .into_iter()
                        .min_by_key(|c| c.order)
                        .expect("non-empty candidate list");
                    candidates = vec![first];
                }
            }
        }
    }

    ConstraintOutcome {
        candidates,
        failed: false,
    }
}

/// Highest score wins; document order breaks ties.
pub fn take_best(candidates: Vec<Candidate<'_>>) -> Candidate<'_> {
    candidates
        .into_iter()
        .min_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.order.cmp(&b.order))
        })
        .expect("non-empty candidate list")
}
