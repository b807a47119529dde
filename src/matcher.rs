//! Semantic matching
//!
//! Scores a candidate element's extracted semantics against the semantics
//! recorded in an EID node. Components are weighted (text 0.30, attributes
//! 0.30, classes 0.20, role 0.10, id 0.10) and weights of components the
//! recorded node never captured are redistributed, so a sparse node is not
//! penalized for what it could not store.

use crate::types::ElementSemantics;
use crate::urlnorm::{canonicalize_url, URL_ATTRIBUTES};
use std::collections::HashSet;
use url::Url;

/// Candidates below this score are discarded by the primary filter.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Relaxed threshold used by the degraded fallback pass.
pub const FALLBACK_THRESHOLD: f64 = 0.3;

const TEXT_WEIGHT: f64 = 0.30;
const ATTRIBUTE_WEIGHT: f64 = 0.30;
const CLASS_WEIGHT: f64 = 0.20;
const ROLE_WEIGHT: f64 = 0.10;
const ID_WEIGHT: f64 = 0.10;

/// Weighted similarity between a recorded node and a candidate, in `[0, 1]`.
///
/// `base` is the resolution base URL used to normalize URL-bearing attribute
/// values on both sides before comparison.
pub fn similarity(
    recorded: &ElementSemantics,
    candidate: &ElementSemantics,
    base: Option<&Url>,
) -> f64 {
    let mut total_weight = 0.0;
    let mut score = 0.0;

    if let Some(recorded_text) = &recorded.text {
        total_weight += TEXT_WEIGHT;
        let candidate_text = candidate
            .text
            .as_ref()
            .map(|t| t.normalized.as_str())
            .unwrap_or("");
        score += TEXT_WEIGHT * text_similarity(&recorded_text.normalized, candidate_text);
    }

    if !recorded.attributes.is_empty() {
        total_weight += ATTRIBUTE_WEIGHT;
        score += ATTRIBUTE_WEIGHT * attribute_similarity(recorded, candidate, base);
    }

    if !recorded.classes.is_empty() {
        total_weight += CLASS_WEIGHT;
        score += CLASS_WEIGHT
            * jaccard(
                recorded.classes.iter().map(String::as_str),
                candidate.classes.iter().map(String::as_str),
            );
    }

    if let Some(recorded_role) = &recorded.role {
        total_weight += ROLE_WEIGHT;
        if candidate.role.as_deref() == Some(recorded_role.as_str()) {
            score += ROLE_WEIGHT;
        }
    }

    if let Some(recorded_id) = &recorded.id {
        total_weight += ID_WEIGHT;
        if candidate.id.as_deref() == Some(recorded_id.as_str()) {
            score += ID_WEIGHT;
        }
    }

    if total_weight == 0.0 {
        // Nothing was recorded; the tag filter already did all it can.
        return MATCH_THRESHOLD;
    }
    (score / total_weight).clamp(0.0, 1.0)
}

/// Exact match scores 1.0; otherwise one minus the length-normalized
/// Levenshtein distance.
fn text_similarity(recorded: &str, candidate: &str) -> f64 {
    if recorded == candidate {
        return 1.0;
    }
    if recorded.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(recorded, candidate).max(0.0)
}

/// Jaccard index over `name=value` pairs, URL values normalized per side.
fn attribute_similarity(
    recorded: &ElementSemantics,
    candidate: &ElementSemantics,
    base: Option<&Url>,
) -> f64 {
    let normalize = |semantics: &ElementSemantics| -> HashSet<String> {
        semantics
            .attributes
            .iter()
            .map(|(name, value)| {
                let value = if URL_ATTRIBUTES.contains(&name.as_str()) {
                    canonicalize_url(value, base)
                } else {
                    value.clone()
                };
                format!("{name}={value}")
            })
            .collect()
    };
    let a = normalize(recorded);
    let b = normalize(candidate);
    jaccard(a.iter().map(String::as_str), b.iter().map(String::as_str))
}

fn jaccard<'a>(
    a: impl Iterator<Item = &'a str>,
    b: impl Iterator<Item = &'a str>,
) -> f64 {
    let a: HashSet<&str> = a.collect();
    let b: HashSet<&str> = b.collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}
