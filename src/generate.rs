//! EID generation
//!
//! Orchestrates anchor discovery, path construction and target extraction,
//! aggregates the confidence score, and memoizes the finished descriptor per
//! element.

use crate::anchor::find_anchor;
use crate::cache::{with_process_cache, EngineCache};
use crate::extract::{cached_semantics, nth_child, semantic_score};
use crate::path::build_path;
use crate::types::{
    Eid, EidMeta, FallbackPolicy, TargetNode, EID_VERSION,
};
use crate::GenerateOptions;
use chrono::Utc;
use scraper::ElementRef;
use tracing::debug;

const ANCHOR_WEIGHT: f64 = 0.40;
const PATH_WEIGHT: f64 = 0.20;
const TARGET_WEIGHT: f64 = 0.30;
const DEGRADATION_WEIGHT: f64 = 0.10;

/// Generator identifier stamped into `meta.generator`.
fn generator_tag() -> String {
    format!("seql-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Generate an EID for an element, using the process-default cache.
///
/// Returns `None` when the element is a detached fragment root with no
/// identity to anchor on, or when the caller set a `confidence_threshold`
/// the result falls short of.
pub fn generate_eid(el: ElementRef<'_>, opts: &GenerateOptions) -> Option<Eid> {
    with_process_cache(|cache| generate_eid_with_cache(el, opts, cache))
}

/// Generate an EID using an explicit cache handle.
pub fn generate_eid_with_cache(
    el: ElementRef<'_>,
    opts: &GenerateOptions,
    cache: &EngineCache,
) -> Option<Eid> {
    cache.touch_document(el);

    if let Some(hit) = cache.eid(el.id()) {
        return accept(hit, opts);
    }

    let tag = el.value().name().to_lowercase();
    if el.parent().is_none() && tag != "html" {
        // A parentless non-root element has nothing to anchor on.
        return None;
    }

    let anchor = find_anchor(el, opts, cache);
    let path = build_path(&anchor, el, opts, cache);

    let semantics = cached_semantics(el, opts, cache);
    let target_score = semantic_score(&semantics);
    let target = TargetNode {
        tag,
        semantics,
        score: target_score,
        nth_child: nth_child(el),
    };

    let confidence = confidence_score(
        anchor.node.score,
        path.degraded,
        target_score,
        anchor.node.degraded,
    );

    let degraded = anchor.node.degraded || path.degraded;
    let degradation_reason = path
        .degradation_reason
        .or(anchor.degradation_reason)
        .filter(|_| degraded);

    let eid = Eid {
        version: EID_VERSION.to_string(),
        anchor: anchor.node,
        path: path.path,
        target,
        constraints: Vec::new(),
        fallback: FallbackPolicy::default(),
        meta: EidMeta {
            confidence,
            generated_at: Utc::now().to_rfc3339(),
            generator: generator_tag(),
            source: opts.source.clone(),
            degraded,
            degradation_reason,
        },
    };

    debug!(
        anchor = %eid.anchor.tag,
        path_len = eid.path.len(),
        confidence,
        degraded,
        "generated eid"
    );

    cache.store_eid(el.id(), eid.clone());
    accept(eid, opts)
}

/// Generate EIDs for a batch of elements, sharing one cache pass.
pub fn generate_eid_batch(
    elements: &[ElementRef<'_>],
    opts: &GenerateOptions,
) -> Vec<Option<Eid>> {
    with_process_cache(|cache| {
        elements
            .iter()
            .map(|el| generate_eid_with_cache(*el, opts, cache))
            .collect()
    })
}

/// Weighted aggregation of anchor quality, path health, target richness and
/// overall degradation, clamped to `[0, 1]`.
pub(crate) fn confidence_score(
    anchor_score: f64,
    path_degraded: bool,
    target_score: f64,
    anchor_degraded: bool,
) -> f64 {
    let path_health = if path_degraded { 0.0 } else { 1.0 };
    let anchor_health = if anchor_degraded { 0.0 } else { 1.0 };
    (ANCHOR_WEIGHT * anchor_score
        + PATH_WEIGHT * path_health
        + TARGET_WEIGHT * target_score
        + DEGRADATION_WEIGHT * anchor_health)
        .clamp(0.0, 1.0)
}

fn accept(eid: Eid, opts: &GenerateOptions) -> Option<Eid> {
    if opts.confidence_threshold > 0.0 && eid.meta.confidence < opts.confidence_threshold {
        return None;
    }
    Some(eid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{select_all, select_one};
    use crate::types::DegradationReason;
    use pretty_assertions::assert_eq;
    use scraper::Html;

    const FORM_DOC: &str = r#"<body><form id="f"><div class="glass-card"><input id="firstName" name="firstName" class="flex h-10 w-full file:bg-transparent"></div></form></body>"#;

    #[test]
    fn test_first_name_scenario() {
        let doc = Html::parse_document(FORM_DOC);
        let eid = generate_eid(select_one(&doc, "input"), &GenerateOptions::default()).unwrap();

        assert_eq!(eid.version, EID_VERSION);
        assert_eq!(eid.anchor.tag, "form");
        assert_eq!(eid.target.tag, "input");
        assert_eq!(eid.target.semantics.id.as_deref(), Some("firstName"));
        assert!(eid.target.semantics.classes.is_empty());
        assert_eq!(
            eid.target.semantics.attributes.get("name").map(String::as_str),
            Some("firstName")
        );
        assert!(!eid.meta.degraded);
    }

    #[test]
    fn test_determinism_across_calls() {
        let doc = Html::parse_document(FORM_DOC);
        let el = select_one(&doc, "input");
        let a = generate_eid(el, &GenerateOptions::default()).unwrap();
        let b = generate_eid(el, &GenerateOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_consistency() {
        let doc = Html::parse_document(FORM_DOC);
        let el = select_one(&doc, "input");
        let shared = EngineCache::new();
        let with_shared =
            generate_eid_with_cache(el, &GenerateOptions::default(), &shared).unwrap();
        let fresh =
            generate_eid_with_cache(el, &GenerateOptions::default(), &EngineCache::new())
                .unwrap();
        assert_eq!(with_shared, fresh);
    }

    #[test]
    fn test_state_independence() {
        // Identical buttons whose state attributes and utility classes
        // differ must produce byte-equal descriptors.
        let doc_closed = Html::parse_document(
            r#"<body><nav id="menu"><button aria-expanded="false" data-state="closed" class="btn flex">More</button></nav></body>"#,
        );
        let doc_open = Html::parse_document(
            r#"<body><nav id="menu"><button aria-expanded="true" data-state="open" class="btn hidden">More</button></nav></body>"#,
        );
        let a = generate_eid(select_one(&doc_closed, "button"), &GenerateOptions::default())
            .unwrap();
        let b = generate_eid(select_one(&doc_open, "button"), &GenerateOptions::default())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nth_child_recorded_for_siblings() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><button>Action</button><button>Action</button><button>Action</button></form></body>"#,
        );
        let eid = generate_eid(select_all(&doc, "button")[1], &GenerateOptions::default())
            .unwrap();
        assert_eq!(eid.target.nth_child, Some(2));

        // nth-child correctness: the recorded index points back at the
        // element among its parent's element children.
        let buttons = select_all(&doc, "button");
        assert_eq!(buttons[eid.target.nth_child.unwrap() as usize - 1].id(), buttons[1].id());
    }

    #[test]
    fn test_degraded_body_anchor_lowers_confidence() {
        let doc = Html::parse_document(
            r#"<body><div><div><span id="stray">x</span></div></div></body>"#,
        );
        let eid = generate_eid(select_one(&doc, "#stray"), &GenerateOptions::default())
            .unwrap();
        assert!(eid.meta.degraded);
        assert_eq!(
            eid.meta.degradation_reason,
            Some(DegradationReason::BodyFallback)
        );
        assert!(eid.meta.confidence < 0.8);
    }

    #[test]
    fn test_confidence_threshold_rejects() {
        let doc = Html::parse_document(
            r#"<body><div><div><span id="stray">x</span></div></div></body>"#,
        );
        let opts = GenerateOptions {
            confidence_threshold: 0.95,
            ..Default::default()
        };
        assert_eq!(generate_eid(select_one(&doc, "#stray"), &opts), None);
    }

    #[test]
    fn test_default_threshold_always_yields() {
        let doc = Html::parse_document("<body><div><span>plain</span></div></body>");
        let eid = generate_eid(select_one(&doc, "span"), &GenerateOptions::default());
        assert!(eid.is_some());
    }

    #[test]
    fn test_html_root_eid() {
        let doc = Html::parse_document("<html><body>x</body></html>");
        let eid = generate_eid(select_one(&doc, "html"), &GenerateOptions::default())
            .unwrap();
        assert_eq!(eid.anchor.tag, "html");
        assert_eq!(eid.target.tag, "html");
        assert!(eid.path.is_empty());
    }

    #[test]
    fn test_batch_matches_single() {
        let doc = Html::parse_document(FORM_DOC);
        let input = select_one(&doc, "input");
        let form = select_one(&doc, "form");
        let batch = generate_eid_batch(&[input, form], &GenerateOptions::default());
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch[0].as_ref().unwrap(),
            &generate_eid(input, &GenerateOptions::default()).unwrap()
        );
    }

    #[test]
    fn test_source_tag_carried() {
        let doc = Html::parse_document(FORM_DOC);
        let opts = GenerateOptions {
            source: Some("session-recorder".to_string()),
            ..Default::default()
        };
        let eid = generate_eid_with_cache(
            select_one(&doc, "input"),
            &opts,
            &EngineCache::new(),
        )
        .unwrap();
        assert_eq!(eid.meta.source.as_deref(), Some("session-recorder"));
    }

    #[test]
    fn test_confidence_weights() {
        // Perfect anchor and target, healthy path: full confidence.
        assert!((confidence_score(1.0, false, 1.0, false) - 1.0).abs() < 1e-9);
        // Degraded path costs its whole weight.
        assert!((confidence_score(1.0, true, 1.0, false) - 0.8).abs() < 1e-9);
        // Body-fallback anchor: weak score plus lost degradation weight.
        let degraded = confidence_score(0.2, false, 0.5, true);
        assert!((degraded - (0.08 + 0.2 + 0.15)).abs() < 1e-9);
    }
}
