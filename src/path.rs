//! Path construction
//!
//! Collects the ancestor chain strictly between anchor and target, keeps the
//! semantically meaningful links, and reinserts skipped nodes one at a time
//! when the filtered chain is not selective enough on its own.

use crate::anchor::AnchorOutcome;
use crate::cache::EngineCache;
use crate::extract::{cached_semantics, document_element, nth_child, semantic_score};
use crate::selector::{count, escalate_anchor, node_selector};
use crate::types::{DegradationReason, PathBuildResult, PathNode};
use crate::{GenerateOptions, ResolveRoot};
use scraper::ElementRef;
use tracing::{debug, trace};

/// Skipped nodes at or above this score are preferred when disambiguating.
const MIN_CONFIDENCE_FOR_SKIP: f64 = 0.55;

/// Tags kept in the path without further justification.
const SEMANTIC_PATH_TAGS: &[&str] = &[
    "form", "main", "nav", "section", "article", "header", "footer", "aside",
    "dialog", "fieldset", "table", "thead", "tbody", "tfoot", "tr", "ul", "ol",
    "li", "dl", "figure", "details", "summary", "label", "button", "a", "select",
    "svg", "g",
];

/// One link of the raw chain during disambiguation.
struct ChainEntry {
    node: PathNode,
    kept: bool,
}

/// Build the path between an anchor and its target.
pub fn build_path(
    anchor: &AnchorOutcome,
    target: ElementRef<'_>,
    opts: &GenerateOptions,
    cache: &EngineCache,
) -> PathBuildResult {
    let target_tag = target.value().name().to_lowercase();

    // Anchor and target coincide only for the document element.
    if anchor.element_id == target.id() {
        return PathBuildResult {
            path: Vec::new(),
            degraded: false,
            degradation_reason: None,
        };
    }

    // Root overrides: under an html anchor the chain is fixed, not filtered.
    if anchor.node.tag == "html" {
        if target_tag == "head" || target_tag == "body" {
            return PathBuildResult {
                path: Vec::new(),
                degraded: false,
                degradation_reason: None,
            };
        }
        let (chain, met_anchor, _) = collect_chain(anchor, target, u32::MAX);
        if met_anchor {
            let path = chain
                .into_iter()
                .map(|el| make_node(el, opts, cache))
                .collect();
            return PathBuildResult {
                path,
                degraded: false,
                degradation_reason: None,
            };
        }
        return PathBuildResult {
            path: Vec::new(),
            degraded: true,
            degradation_reason: Some(DegradationReason::TargetNotDescendantOfAnchor),
        };
    }

    let (chain, met_anchor, overflowed) =
        collect_chain(anchor, target, opts.max_path_depth);

    if !met_anchor && !overflowed {
        debug!(anchor = %anchor.node.tag, "target is not a descendant of its anchor");
        return PathBuildResult {
            path: Vec::new(),
            degraded: true,
            degradation_reason: Some(DegradationReason::TargetNotDescendantOfAnchor),
        };
    }

    let mut entries: Vec<ChainEntry> = chain
        .into_iter()
        .map(|el| {
            let node = make_node(el, opts, cache);
            let kept = keep_in_path(el, &node);
            ChainEntry { node, kept }
        })
        .collect();

    disambiguate(anchor, target, &mut entries, opts, cache);

    let path: Vec<PathNode> = entries
        .into_iter()
        .filter(|e| e.kept)
        .map(|e| e.node)
        .collect();

    if overflowed {
        return PathBuildResult {
            path,
            degraded: true,
            degradation_reason: Some(DegradationReason::PathDepthOverflow),
        };
    }
    PathBuildResult {
        path,
        degraded: false,
        degradation_reason: None,
    }
}

/// Ancestors strictly between anchor and target, anchor-side first. Returns
/// whether the anchor was met and whether the depth cap was hit first.
fn collect_chain<'a>(
    anchor: &AnchorOutcome,
    target: ElementRef<'a>,
    max_depth: u32,
) -> (Vec<ElementRef<'a>>, bool, bool) {
    let mut chain = Vec::new();
    let mut met_anchor = false;
    let mut overflowed = false;

    let mut current = target.parent().and_then(ElementRef::wrap);
    let mut depth = 0u32;
    while let Some(ancestor) = current {
        if ancestor.id() == anchor.element_id {
            met_anchor = true;
            break;
        }
        depth += 1;
        if depth >= max_depth {
            overflowed = true;
            break;
        }
        chain.push(ancestor);
        current = ancestor.parent().and_then(ElementRef::wrap);
    }

    chain.reverse();
    (chain, met_anchor, overflowed)
}

fn make_node(el: ElementRef<'_>, opts: &GenerateOptions, cache: &EngineCache) -> PathNode {
    let semantics = cached_semantics(el, opts, cache);
    let score = semantic_score(&semantics);
    PathNode {
        tag: el.value().name().to_lowercase(),
        semantics,
        score,
        nth_child: nth_child(el),
    }
}

/// Filter rule: semantic tags pass outright; `div`/`span` pass only with
/// semantic features of their own.
fn keep_in_path(el: ElementRef<'_>, node: &PathNode) -> bool {
    if SEMANTIC_PATH_TAGS.contains(&node.tag.as_str()) {
        return true;
    }
    if node.tag != "div" && node.tag != "span" {
        return false;
    }
    node.semantics.role.is_some()
        || node.semantics.id.is_some()
        || !node.semantics.classes.is_empty()
        || has_aria_or_test_marker(el)
}

fn has_aria_or_test_marker(el: ElementRef<'_>) -> bool {
    el.value().attrs().any(|(name, _)| {
        name.starts_with("aria-")
            || crate::classify::TEST_MARKER_ATTRIBUTES.contains(&name)
    })
}

/// Reinsert skipped chain links while the trial selector stays ambiguous.
/// High-scoring links go first; an insertion survives only when it strictly
/// reduces the match count.
fn disambiguate(
    anchor: &AnchorOutcome,
    target: ElementRef<'_>,
    entries: &mut [ChainEntry],
    opts: &GenerateOptions,
    cache: &EngineCache,
) {
    let root = ResolveRoot::Element(document_element(target));
    let anchor_sel = escalate_anchor(&anchor.node, Some(root), Some(cache)).selector;
    let target_sel = node_selector(
        (&crate::types::TargetNode {
            tag: target.value().name().to_lowercase(),
            semantics: cached_semantics(target, opts, cache),
            score: 0.0,
            nth_child: None,
        })
            .into(),
    );

    let mut current_count = match trial_count(&anchor_sel, entries, &target_sel, root, cache)
    {
        Some(n) => n,
        None => return,
    };
    if current_count <= 1 {
        return;
    }

    let mut order: Vec<usize> = (0..entries.len())
        .filter(|&i| !entries[i].kept && entries[i].node.score >= MIN_CONFIDENCE_FOR_SKIP)
        .collect();
    order.extend(
        (0..entries.len())
            .filter(|&i| !entries[i].kept && entries[i].node.score < MIN_CONFIDENCE_FOR_SKIP),
    );

    for index in order {
        entries[index].kept = true;
        match trial_count(&anchor_sel, entries, &target_sel, root, cache) {
            Some(n) if n < current_count => {
                trace!(tag = %entries[index].node.tag, matches = n, "reinserted path node");
                current_count = n;
            }
            _ => entries[index].kept = false,
        }
        if current_count <= 1 {
            break;
        }
    }
}

fn trial_count(
    anchor_sel: &str,
    entries: &[ChainEntry],
    target_sel: &str,
    root: ResolveRoot<'_>,
    cache: &EngineCache,
) -> Option<usize> {
    let mut selector = anchor_sel.to_string();
    let mut child = false;
    for entry in entries.iter().filter(|e| e.kept) {
        selector.push_str(if child { " > " } else { " " });
        selector.push_str(&node_selector((&entry.node).into()));
        if entry.node.tag == "svg" {
            child = true;
        }
    }
    selector.push_str(if child { " > " } else { " " });
    selector.push_str(target_sel);
    count(root, &selector, Some(cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::find_anchor;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, sel: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(sel).unwrap()).next().unwrap()
    }

    fn path_for(doc: &Html, sel: &str) -> PathBuildResult {
        let target = first(doc, sel);
        let cache = EngineCache::new();
        cache.touch_document(target);
        let opts = GenerateOptions::default();
        let anchor = find_anchor(target, &opts, &cache);
        build_path(&anchor, target, &opts, &cache)
    }

    #[test]
    fn test_noise_divs_are_skipped() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><div><div><input id="q"></div></div></form></body>"#,
        );
        let result = path_for(&doc, "#q");
        assert!(result.path.is_empty());
        assert!(!result.degraded);
    }

    #[test]
    fn test_semantic_div_is_kept() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><div class="glass-card"><input id="q"></div></form></body>"#,
        );
        let result = path_for(&doc, "#q");
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].tag, "div");
        assert_eq!(result.path[0].semantics.classes, vec!["glass-card"]);
        assert_eq!(result.path[0].nth_child, Some(1));
    }

    #[test]
    fn test_utility_only_div_is_skipped() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><div class="flex h-10"><input id="q"></div></form></body>"#,
        );
        let result = path_for(&doc, "#q");
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_semantic_tags_always_kept() {
        let doc = Html::parse_document(
            r#"<body><form id="f"><fieldset><div><input id="q"></div></fieldset></form></body>"#,
        );
        let result = path_for(&doc, "#q");
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].tag, "fieldset");
    }

    #[test]
    fn test_reinsertion_disambiguates() {
        // Two identical buttons under the same form, one nested in a plain
        // div. The div is filtered out at first, leaving an ambiguous trial
        // selector; reinserting it strictly reduces the match count.
        let doc = Html::parse_document(
            r#"<body><form id="f">
                <button name="go">Go</button>
                <div><button name="go">Go</button></div>
            </form></body>"#,
        );
        let target = first(&doc, "div > button");
        let cache = EngineCache::new();
        cache.touch_document(target);
        let opts = GenerateOptions::default();
        let anchor = find_anchor(target, &opts, &cache);
        let result = build_path(&anchor, target, &opts, &cache);
        assert_eq!(result.path.len(), 1, "path: {:?}", result.path);
        assert_eq!(result.path[0].tag, "div");
        assert!(result.path[0].semantics.is_empty());
    }

    #[test]
    fn test_differently_classed_wrappers_separate_twins() {
        let doc = Html::parse_document(
            r#"<body><form id="f">
                <div class="billing-block"><input name="street"></div>
                <div class="shipping-block"><input name="street"></div>
            </form></body>"#,
        );
        let result = path_for(&doc, ".shipping-block input");
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].semantics.classes, vec!["shipping-block"]);
    }

    #[test]
    fn test_depth_overflow_degrades() {
        let mut html = String::from(r#"<body><form id="f">"#);
        for _ in 0..12 {
            html.push_str("<div>");
        }
        html.push_str(r#"<input id="deep">"#);
        for _ in 0..12 {
            html.push_str("</div>");
        }
        html.push_str("</form></body>");
        let doc = Html::parse_document(&html);

        let target = first(&doc, "#deep");
        let cache = EngineCache::new();
        cache.touch_document(target);
        let opts = GenerateOptions::default();
        let anchor = find_anchor(target, &opts, &cache);
        // The anchor walk also overflows before the form; force the form as
        // anchor to exercise the path-side overflow.
        let result = build_path(&anchor, target, &opts, &cache);
        assert!(result.degraded);
    }

    #[test]
    fn test_reinsertion_never_increases_matches() {
        // Tightening a descendant chain with one more link can only shrink
        // the match set, never grow it.
        let doc = Html::parse_document(
            r#"<body><form id="f">
                <button name="go">Go</button>
                <div><button name="go">Go</button></div>
                <div><section><button name="go">Go</button></section></div>
            </form></body>"#,
        );
        let root = crate::ResolveRoot::Document(&doc);
        let loose = crate::selector::count(root, r#"form button[name="go"]"#, None).unwrap();
        let with_div =
            crate::selector::count(root, r#"form div button[name="go"]"#, None).unwrap();
        let with_section = crate::selector::count(
            root,
            r#"form div section button[name="go"]"#,
            None,
        )
        .unwrap();
        assert!(with_div <= loose);
        assert!(with_section <= with_div);
        assert_eq!(with_section, 1);
    }

    #[test]
    fn test_head_chain_is_unfiltered() {
        let doc = Html::parse_document(
            r#"<html><head><meta name="description" content="x"></head><body></body></html>"#,
        );
        let result = path_for(&doc, "meta[name=description]");
        assert_eq!(result.path.len(), 1);
        assert_eq!(result.path[0].tag, "head");
        assert!(!result.degraded);
    }

    #[test]
    fn test_body_under_html_has_empty_path() {
        let doc = Html::parse_document("<html><body>x</body></html>");
        let result = path_for(&doc, "body");
        assert!(result.path.is_empty());
        assert!(!result.degraded);
    }
}
