//! Resolution pipeline
//!
//! Five phases: CSS narrowing, semantic filtering, a uniqueness
//! short-circuit, constraint evaluation, and ambiguity/fallback handling.
//! Statuses are values; nothing here panics across the API boundary.

use crate::cache::EngineCache;
use crate::constraints::{apply_constraints, take_best, Candidate};
use crate::extract::cached_semantics;
use crate::matcher::{similarity, FALLBACK_THRESHOLD, MATCH_THRESHOLD};
use crate::selector::{build_selector_cached, escalate_anchor, query_cached, BuildOptions};
use crate::types::{Eid, OnMissing, UniquenessMode};
use crate::{GenerateOptions, ResolveOptions, ResolveRoot};
use scraper::ElementRef;
use tracing::debug;
use url::Url;

/// Resolution quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    /// Exactly one element matched with full quality.
    Success,
    /// Several candidates survived and the policy allows reporting them all.
    Ambiguous,
    /// A relaxed fallback pass produced the result.
    DegradedFallback,
    /// No acceptable candidate.
    Error,
}

impl ResolveStatus {
    /// Kebab-case status token.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStatus::Success => "success",
            ResolveStatus::Ambiguous => "ambiguous",
            ResolveStatus::DegradedFallback => "degraded-fallback",
            ResolveStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ResolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a resolution call.
#[derive(Debug, Clone)]
pub struct ResolveResult<'a> {
    /// Resolution quality.
    pub status: ResolveStatus,
    /// Matched elements; one for `success`, several for `ambiguous`, empty
    /// for `error`.
    pub elements: Vec<ElementRef<'a>>,
    /// Confidence carried over from generation, scaled down on fallback.
    pub confidence: f64,
    /// Diagnostics accumulated along the pipeline.
    pub warnings: Vec<String>,
}

impl<'a> ResolveResult<'a> {
    fn error(warnings: Vec<String>) -> Self {
        ResolveResult {
            status: ResolveStatus::Error,
            elements: Vec::new(),
            confidence: 0.0,
            warnings,
        }
    }
}

/// Resolve an EID against a root, using the process-default cache.
pub fn resolve<'a>(
    eid: &Eid,
    root: ResolveRoot<'a>,
    opts: &ResolveOptions,
) -> ResolveResult<'a> {
    crate::cache::with_process_cache(|cache| resolve_with_cache(eid, root, opts, cache))
}

/// Resolve an EID against a root, using the supplied cache.
pub fn resolve_with_cache<'a>(
    eid: &Eid,
    root: ResolveRoot<'a>,
    opts: &ResolveOptions,
    cache: &EngineCache,
) -> ResolveResult<'a> {
    if let ResolveRoot::Element(el) = root {
        cache.touch_document(el);
    } else if let ResolveRoot::Document(doc) = root {
        cache.touch_document(doc.root_element());
    }

    let base_url = opts.base_url.clone().or_else(|| discover_base_url(root));
    let extraction = GenerateOptions::default();
    let mut warnings = Vec::new();

    // Phase 1: CSS narrowing.
    let build = build_selector_cached(
        eid,
        &BuildOptions {
            root: Some(root),
            ensure_unique: true,
        },
        Some(cache),
    );
    debug!(selector = %build.selector, unique = build.is_unique, "phase 1: narrowing");
    let mut matches = match query_cached(root, &build.selector, Some(cache)) {
        Ok(matches) => matches,
        Err(err) => {
            warnings.push(err.to_string());
            return ResolveResult::error(warnings);
        }
    };
    if matches.len() > opts.max_candidates {
        warnings.push(format!(
            "candidate set capped at {} (was {})",
            opts.max_candidates,
            matches.len()
        ));
        matches.truncate(opts.max_candidates);
    }

    // Phase 2: semantic filtering.
    let mut candidates: Vec<Candidate<'a>> = matches
        .into_iter()
        .enumerate()
        .filter_map(|(order, element)| {
            let semantics = cached_semantics(element, &extraction, cache);
            let score = similarity(&eid.target.semantics, &semantics, base_url.as_ref());
            (score >= MATCH_THRESHOLD).then_some(Candidate {
                element,
                semantics,
                score,
                order,
            })
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.order.cmp(&b.order))
    });
    debug!(count = candidates.len(), "phase 2: semantic filter");

    // Phase 3: uniqueness short-circuit.
    if candidates.len() == 1 {
        return ResolveResult {
            status: ResolveStatus::Success,
            elements: vec![candidates[0].element],
            confidence: eid.meta.confidence,
            warnings,
        };
    }

    // Phase 4: constraints.
    if !candidates.is_empty() && !eid.constraints.is_empty() {
        let outcome = apply_constraints(candidates, &eid.constraints, &mut warnings);
        if outcome.failed {
            return ResolveResult::error(warnings);
        }
        candidates = outcome.candidates;
        debug!(count = candidates.len(), "phase 4: constraints");
        if candidates.len() == 1 {
            return ResolveResult {
                status: ResolveStatus::Success,
                elements: vec![candidates[0].element],
                confidence: eid.meta.confidence,
                warnings,
            };
        }
    }

    // Phase 5: ambiguity and fallback.
    if candidates.is_empty() {
        if opts.enable_fallback && eid.fallback.on_missing != OnMissing::None {
            let result =
                fallback_resolve(eid, root, opts, cache, base_url.as_ref(), warnings);
            if opts.strict_mode && result.status == ResolveStatus::DegradedFallback {
                let mut warnings = result.warnings;
                warnings.push("strict mode rejected a degraded fallback match".to_string());
                return ResolveResult::error(warnings);
            }
            return result;
        }
        warnings.push("no candidates".to_string());
        return ResolveResult::error(warnings);
    }

    match eid.fallback.on_multiple {
        UniquenessMode::BestScore => {
            warnings.push(format!(
                "{} candidates; best score selected",
                candidates.len()
            ));
            let best = take_best(candidates);
            ResolveResult {
                status: ResolveStatus::Success,
                elements: vec![best.element],
                confidence: eid.meta.confidence,
                warnings,
            }
        }
        UniquenessMode::Strict => {
            warnings.push(format!("{} candidates under strict policy", candidates.len()));
            ResolveResult::error(warnings)
        }
        UniquenessMode::AllowMultiple => {
            if opts.require_uniqueness {
                warnings.push("ambiguous result rejected by require_uniqueness".to_string());
                return ResolveResult::error(warnings);
            }
            ResolveResult {
                status: ResolveStatus::Ambiguous,
                elements: candidates.iter().map(|c| c.element).collect(),
                confidence: eid.meta.confidence,
                warnings,
            }
        }
    }
}

/// Degraded strategy: anchor-only narrowing with a relaxed threshold.
fn fallback_resolve<'a>(
    eid: &Eid,
    root: ResolveRoot<'a>,
    opts: &ResolveOptions,
    cache: &EngineCache,
    base_url: Option<&Url>,
    mut warnings: Vec<String>,
) -> ResolveResult<'a> {
    let anchor_sel = escalate_anchor(&eid.anchor, Some(root), Some(cache)).selector;
    let selector = format!("{anchor_sel} {}", eid.target.tag);
    debug!(selector = %selector, "phase 5: anchor-only fallback");

    let extraction = GenerateOptions::default();
    let matches = match query_cached(root, &selector, Some(cache)) {
        Ok(matches) => matches,
        Err(err) => {
            warnings.push(err.to_string());
            return ResolveResult::error(warnings);
        }
    };

    let candidates: Vec<Candidate<'a>> = matches
        .into_iter()
        .take(opts.max_candidates)
        .enumerate()
        .filter(|(_, element)| {
            within_depth(*element, &eid.anchor.tag, eid.fallback.max_depth)
        })
        .filter_map(|(order, element)| {
            let semantics = cached_semantics(element, &extraction, cache);
            let score = similarity(&eid.target.semantics, &semantics, base_url);
            (score >= FALLBACK_THRESHOLD).then_some(Candidate {
                element,
                semantics,
                score,
                order,
            })
        })
        .collect();

    if candidates.is_empty() {
        warnings.push("no candidates".to_string());
        return ResolveResult::error(warnings);
    }

    let best = take_best(candidates);
    warnings.push("degraded fallback match".to_string());
    ResolveResult {
        status: ResolveStatus::DegradedFallback,
        elements: vec![best.element],
        confidence: (best.score * 0.6).clamp(0.0, 1.0),
        warnings,
    }
}

/// The candidate must sit within `max_depth` levels of an ancestor bearing
/// the anchor's tag.
fn within_depth(el: ElementRef<'_>, anchor_tag: &str, max_depth: u32) -> bool {
    let mut depth = 0u32;
    let mut current = el.parent().and_then(ElementRef::wrap);
    while let Some(ancestor) = current {
        depth += 1;
        if ancestor.value().name().eq_ignore_ascii_case(anchor_tag) {
            return true;
        }
        if depth >= max_depth {
            return false;
        }
        current = ancestor.parent().and_then(ElementRef::wrap);
    }
    false
}

/// Base URL from the document's `<base href>`, when absolute.
fn discover_base_url(root: ResolveRoot<'_>) -> Option<Url> {
    let matches = query_cached(root, "base[href]", None).ok()?;
    let href = matches.first()?.value().attr("href")?;
    Url::parse(href).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_eid, test_support};
    use scraper::Html;

    fn roundtrip(html: &str, target_sel: &str) -> (Html, Eid) {
        let doc = Html::parse_document(html);
        let eid = {
            let target = test_support::select_one(&doc, target_sel);
            generate_eid(target, &GenerateOptions::default()).unwrap()
        };
        (doc, eid)
    }

    #[test]
    fn test_round_trip_success() {
        let (doc, eid) = roundtrip(
            r#"<body><form id="f"><div class="glass-card"><input id="firstName" name="firstName" class="flex h-10 w-full"></div></form></body>"#,
            "#firstName",
        );
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&doc),
            &ResolveOptions::default(),
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::Success);
        assert_eq!(result.elements.len(), 1);
        assert_eq!(result.elements[0].value().attr("id"), Some("firstName"));
        assert!((result.confidence - eid.meta.confidence).abs() < 1e-9);
    }

    #[test]
    fn test_nth_child_separates_siblings() {
        let (doc, eid) = {
            let doc = Html::parse_document(
                r#"<body><form id="f"><button>Action</button><button>Action</button><button>Action</button></form></body>"#,
            );
            let eid = {
                let second = test_support::select_all(&doc, "button")[1];
                generate_eid(second, &GenerateOptions::default()).unwrap()
            };
            (doc, eid)
        };
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&doc),
            &ResolveOptions::default(),
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::Success);
        let buttons = test_support::select_all(&doc, "button");
        assert_eq!(result.elements[0].id(), buttons[1].id());
    }

    #[test]
    fn test_missing_target_without_fallback_errors() {
        let (_, eid) = roundtrip(
            r#"<body><form id="f"><input name="q"></form></body>"#,
            "input",
        );
        let other = Html::parse_document(r#"<body><main><p>nothing here</p></main></body>"#);
        let opts = ResolveOptions {
            enable_fallback: false,
            ..Default::default()
        };
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&other),
            &opts,
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::Error);
        assert!(result.elements.is_empty());
    }

    #[test]
    fn test_fallback_recovers_with_reduced_confidence() {
        // Generation-time markup: the input sits in a classed wrapper.
        let (_, eid) = roundtrip(
            r#"<body><form id="f"><div class="card-grid"><input name="q" class="search-box"></div></form></body>"#,
            "input",
        );
        // The wrapper and the class churned away; anchor-only narrowing
        // still finds the input under the form.
        let mutated = Html::parse_document(
            r#"<body><form id="f"><section><input name="q"></section></form></body>"#,
        );
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&mutated),
            &ResolveOptions::default(),
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::DegradedFallback);
        assert_eq!(result.elements.len(), 1);
        assert!(result.confidence <= 0.6);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_strict_mode_rejects_fallback() {
        let (_, eid) = roundtrip(
            r#"<body><form id="f"><div class="card-grid"><input name="q" class="search-box"></div></form></body>"#,
            "input",
        );
        let mutated = Html::parse_document(
            r#"<body><form id="f"><section><input name="q"></section></form></body>"#,
        );
        let opts = ResolveOptions {
            strict_mode: true,
            ..Default::default()
        };
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&mutated),
            &opts,
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::Error);
    }

    #[test]
    fn test_subtree_root_resolution() {
        let doc = Html::parse_document(
            r#"<body><main id="app"><form id="f"><input name="q"></form></main></body>"#,
        );
        let eid = {
            let target = test_support::select_one(&doc, "input");
            generate_eid(target, &GenerateOptions::default()).unwrap()
        };
        let main = test_support::select_one(&doc, "main");
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Element(main),
            &ResolveOptions::default(),
            &EngineCache::new(),
        );
        assert_eq!(result.status, ResolveStatus::Success);
    }

    #[test]
    fn test_candidate_cap_records_warning() {
        // Each twin is the first child of its own wrapper, so even the
        // nth-child escalation cannot make the selector unique.
        let mut html = String::from(r#"<body><form id="f">"#);
        for _ in 0..5 {
            html.push_str("<div><input name=\"q\"></div>");
        }
        html.push_str("</form></body>");
        let doc = Html::parse_document(&html);
        let eid = {
            let target = test_support::select_one(&doc, "input");
            generate_eid(target, &GenerateOptions::default()).unwrap()
        };
        let opts = ResolveOptions {
            max_candidates: 2,
            ..Default::default()
        };
        let result = resolve_with_cache(
            &eid,
            ResolveRoot::Document(&doc),
            &opts,
            &EngineCache::new(),
        );
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("capped")));
    }
}
