//! Anchor discovery
//!
//! Walks the target's ancestors looking for the closest strong-semantic
//! element to hang the identifier from. Candidates are scored in tiers with
//! a depth penalty; the first Tier-A hit wins outright, otherwise the best
//! candidate seen by the time the walk ends is kept. Reaching `<body>` with
//! nothing to show degrades to the body sentinel.

use crate::cache::EngineCache;
use crate::classify::{stable_id, TEST_MARKER_ATTRIBUTES};
use crate::extract::{document_element, extract_semantics, nth_child};
use crate::types::{AnchorNode, DegradationReason};
use crate::GenerateOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use ego_tree::NodeId;
use scraper::ElementRef;
use tracing::trace;

/// Tags that are strong landmarks on their own.
const TIER_A_TAGS: &[&str] = &[
    "form", "main", "nav", "section", "article", "header", "footer", "aside", "dialog",
];

/// Roles that mark a landmark region.
const TIER_B_ROLES: &[&str] = &[
    "navigation",
    "main",
    "region",
    "dialog",
    "form",
    "banner",
    "contentinfo",
    "complementary",
];

/// Ids that read as application-level mount points.
static APP_LEVEL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(root|app|main|content|page|layout|wrapper)").unwrap());

/// Depth after which the penalty starts accruing.
const DEPTH_PENALTY_THRESHOLD: u32 = 3;
/// Penalty per level beyond the threshold.
const DEPTH_PENALTY_FACTOR: f64 = 0.05;

const TIER_A_BONUS: f64 = 0.60;
const TIER_B_BONUS: f64 = 0.40;
const ARIA_LABEL_BONUS: f64 = 0.15;
const APP_ID_BONUS: f64 = 0.25;
const STABLE_ID_BONUS: f64 = 0.15;
const TEST_MARKER_BONUS: f64 = 0.20;

/// Anchor quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorTier {
    /// Semantic landmark tag.
    A,
    /// Landmark role or accumulated weaker signals.
    B,
    /// Sentinel or low-signal fallback.
    C,
}

/// Result of anchor discovery for one target element.
#[derive(Debug, Clone)]
pub struct AnchorOutcome {
    /// Tree id of the anchor element.
    pub element_id: NodeId,
    /// The recorded anchor node.
    pub node: AnchorNode,
    /// Quality tier of the selection.
    pub tier: AnchorTier,
    /// Set when the anchor was a degraded fallback.
    pub degradation_reason: Option<DegradationReason>,
}

/// Find the anchor for `target`, memoized per element.
pub fn find_anchor(
    target: ElementRef<'_>,
    opts: &GenerateOptions,
    cache: &EngineCache,
) -> AnchorOutcome {
    if let Some(hit) = cache.anchor(target.id()) {
        return hit;
    }
    let outcome = find_anchor_uncached(target, opts, cache);
    cache.store_anchor(target.id(), outcome.clone());
    outcome
}

fn find_anchor_uncached(
    target: ElementRef<'_>,
    opts: &GenerateOptions,
    cache: &EngineCache,
) -> AnchorOutcome {
    let tag = target.value().name().to_lowercase();

    // Root overrides precede the walk: html anchors itself; head, body and
    // anything inside head anchor at the document element.
    if tag == "html" {
        return make_outcome(target, opts, 1.0, AnchorTier::A, false, None);
    }
    if tag == "head" || tag == "body" || is_inside_head(target) {
        let html = document_element(target);
        return make_outcome(html, opts, 1.0, AnchorTier::A, false, None);
    }

    let mut best: Option<(ElementRef<'_>, f64, AnchorTier)> = None;
    let mut body: Option<ElementRef<'_>> = None;
    let mut last_walked: Option<ElementRef<'_>> = None;
    let mut depth = 0u32;

    let mut current = target.parent().and_then(ElementRef::wrap);
    while let Some(ancestor) = current {
        depth += 1;
        if depth > opts.max_path_depth {
            break;
        }
        let ancestor_tag = ancestor.value().name().to_lowercase();
        if ancestor_tag == "body" {
            body = Some(ancestor);
            break;
        }
        if ancestor_tag == "html" {
            break;
        }
        last_walked = Some(ancestor);

        let (raw, tier) = score_candidate(ancestor, &ancestor_tag);
        let score = depth_penalized(raw, depth);
        trace!(tag = %ancestor_tag, depth, raw, score, "anchor candidate");

        if tier == AnchorTier::A {
            // A landmark tag this close is as good as it gets.
            return make_outcome(ancestor, opts, score, AnchorTier::A, false, None);
        }
        if score > 0.0 {
            let better = match &best {
                Some((_, best_score, _)) => score > *best_score,
                None => true,
            };
            if better {
                best = Some((ancestor, score, tier));
            }
        }

        current = ancestor.parent().and_then(ElementRef::wrap);
    }

    if let Some((el, score, tier)) = best {
        return make_outcome(el, opts, score, tier, false, None);
    }

    if opts.fallback_to_body {
        if let Some(body_el) = body.or_else(|| find_body(target)) {
            return make_outcome(
                body_el,
                opts,
                0.2,
                AnchorTier::C,
                true,
                Some(DegradationReason::BodyFallback),
            );
        }
    }

    // No candidate and body fallback unavailable: degrade to the nearest
    // ancestor walked (or the target's parent, or the target itself).
    let nearest = last_walked
        .or_else(|| target.parent().and_then(ElementRef::wrap))
        .unwrap_or(target);
    make_outcome(
        nearest,
        opts,
        0.1,
        AnchorTier::C,
        true,
        Some(DegradationReason::AnchorNotFound),
    )
}

fn make_outcome(
    el: ElementRef<'_>,
    opts: &GenerateOptions,
    score: f64,
    tier: AnchorTier,
    degraded: bool,
    reason: Option<DegradationReason>,
) -> AnchorOutcome {
    AnchorOutcome {
        element_id: el.id(),
        node: AnchorNode {
            tag: el.value().name().to_lowercase(),
            semantics: extract_semantics(el, opts),
            score: score.clamp(0.0, 1.0),
            degraded,
            nth_child: nth_child(el),
        },
        tier,
        degradation_reason: reason,
    }
}

/// Raw tier score for one ancestor.
fn score_candidate(el: ElementRef<'_>, tag: &str) -> (f64, AnchorTier) {
    let element = el.value();
    let mut raw = 0.0;
    let mut tier = AnchorTier::C;

    if TIER_A_TAGS.contains(&tag) {
        raw += TIER_A_BONUS;
        tier = AnchorTier::A;
    } else if element
        .attr("role")
        .map(|r| TIER_B_ROLES.contains(&r))
        .unwrap_or(false)
    {
        raw += TIER_B_BONUS;
        tier = AnchorTier::B;
    }

    if element.attr("aria-label").is_some() || element.attr("aria-labelledby").is_some() {
        raw += ARIA_LABEL_BONUS;
    }

    if let Some(id) = stable_id(element.attr("id")) {
        raw += if APP_LEVEL_ID.is_match(id) {
            APP_ID_BONUS
        } else {
            STABLE_ID_BONUS
        };
    }

    if TEST_MARKER_ATTRIBUTES
        .iter()
        .any(|marker| element.attr(marker).is_some())
    {
        raw += TEST_MARKER_BONUS;
    }

    if tier == AnchorTier::C && raw > 0.0 {
        tier = AnchorTier::B;
    }
    (raw, tier)
}

fn depth_penalized(raw: f64, depth: u32) -> f64 {
    let over = depth.saturating_sub(DEPTH_PENALTY_THRESHOLD) as f64;
    (raw - over * DEPTH_PENALTY_FACTOR).max(0.0)
}

fn is_inside_head(el: ElementRef<'_>) -> bool {
    el.ancestors().any(|node| {
        ElementRef::wrap(node)
            .map(|a| a.value().name().eq_ignore_ascii_case("head"))
            .unwrap_or(false)
    })
}

fn find_body(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    document_element(el)
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name().eq_ignore_ascii_case("body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, sel: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(sel).unwrap()).next().unwrap()
    }

    fn anchor_for<'a>(doc: &'a Html, sel: &str) -> AnchorOutcome {
        let target = first(doc, sel);
        let cache = EngineCache::new();
        cache.touch_document(target);
        find_anchor(target, &GenerateOptions::default(), &cache)
    }

    #[test]
    fn test_tier_a_short_circuits() {
        let doc = Html::parse_document(
            r#"<body><div id="page"><form id="f"><div><input id="q"></div></form></div></body>"#,
        );
        let outcome = anchor_for(&doc, "#q");
        assert_eq!(outcome.node.tag, "form");
        assert_eq!(outcome.tier, AnchorTier::A);
        assert!(!outcome.node.degraded);
    }

    #[test]
    fn test_tier_b_role_anchor() {
        let doc = Html::parse_document(
            r#"<body><div role="navigation" aria-label="Primary"><div><a href="/x" id="lnk">x</a></div></div></body>"#,
        );
        let outcome = anchor_for(&doc, "#lnk");
        assert_eq!(outcome.tier, AnchorTier::B);
        assert_eq!(outcome.node.semantics.role.as_deref(), Some("navigation"));
        // role 0.40 + aria-label 0.15, depth 2 carries no penalty
        assert!((outcome.node.score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_depth_penalty_applies_beyond_threshold() {
        let doc = Html::parse_document(
            r#"<body><div id="wrapper-x"><div><div><div><div><span id="deep">x</span></div></div></div></div></div></body>"#,
        );
        let outcome = anchor_for(&doc, "#deep");
        // wrapper div at depth 5: 0.25 - 2 * 0.05
        assert_eq!(outcome.node.semantics.id.as_deref(), Some("wrapper-x"));
        assert!((outcome.node.score - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_body_fallback_when_nothing_scores() {
        let doc = Html::parse_document(
            r#"<body><div><div><span id="lonely">x</span></div></div></body>"#,
        );
        let outcome = anchor_for(&doc, "#lonely");
        assert_eq!(outcome.node.tag, "body");
        assert_eq!(outcome.tier, AnchorTier::C);
        assert!(outcome.node.degraded);
        assert_eq!(
            outcome.degradation_reason,
            Some(DegradationReason::BodyFallback)
        );
    }

    #[test]
    fn test_no_body_fallback_degrades_to_nearest() {
        let doc = Html::parse_document(
            r#"<body><div><div><span id="lonely">x</span></div></div></body>"#,
        );
        let target = first(&doc, "#lonely");
        let cache = EngineCache::new();
        cache.touch_document(target);
        let opts = GenerateOptions {
            fallback_to_body: false,
            ..Default::default()
        };
        let outcome = find_anchor(target, &opts, &cache);
        assert!(outcome.node.degraded);
        assert_eq!(
            outcome.degradation_reason,
            Some(DegradationReason::AnchorNotFound)
        );
        assert_eq!(outcome.node.tag, "div");
    }

    #[test]
    fn test_html_anchors_itself() {
        let doc = Html::parse_document("<html><body>x</body></html>");
        let outcome = anchor_for(&doc, "html");
        assert_eq!(outcome.node.tag, "html");
        assert!(!outcome.node.degraded);
    }

    #[test]
    fn test_head_and_meta_anchor_at_html() {
        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="x"></head><body></body></html>"#,
        );
        let outcome = anchor_for(&doc, "meta[name=description]");
        assert_eq!(outcome.node.tag, "html");
        let outcome = anchor_for(&doc, "body");
        assert_eq!(outcome.node.tag, "html");
    }

    #[test]
    fn test_test_marker_bonus() {
        let doc = Html::parse_document(
            r#"<body><div data-testid="cart-panel"><div><button id="pay">Pay</button></div></div></body>"#,
        );
        let outcome = anchor_for(&doc, "#pay");
        assert_eq!(
            outcome
                .node
                .semantics
                .attributes
                .get("data-testid")
                .map(String::as_str),
            Some("cart-panel")
        );
        assert!((outcome.node.score - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_is_memoized() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><input id="q"></form></body>"#,
        );
        let target = first(&doc, "#q");
        let cache = EngineCache::new();
        cache.touch_document(target);
        let opts = GenerateOptions::default();
        let a = find_anchor(target, &opts, &cache);
        let b = find_anchor(target, &opts, &cache);
        assert_eq!(a.node, b.node);
        assert_eq!(a.element_id, b.element_id);
    }
}
