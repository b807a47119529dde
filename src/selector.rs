//! CSS selector synthesis
//!
//! Turns EID nodes into query selectors: escaped class and attribute
//! predicates in stored order, descendant combinators by default, `>` for
//! root-element chains and SVG interiors, and uniqueness escalation for the
//! anchor and the target against a supplied root.

use crate::cache::EngineCache;
use crate::extract::nth_of_type;
use crate::types::{AnchorNode, Eid, NodeView};
use crate::{Error, ResolveRoot, Result};
use scraper::{ElementRef, Selector};
use tracing::trace;

/// Outcome of selector synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// The synthesized selector.
    pub selector: String,
    /// True when the selector was verified to match exactly one element in
    /// the supplied root. Always false when no root was supplied.
    pub is_unique: bool,
    /// True when anchor escalation had to fall back to `:nth-of-type`.
    pub used_nth_of_type: bool,
    /// Classes added beyond the baseline during escalation.
    pub extra_classes_added: usize,
}

/// Options for [`build_selector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    /// Root to verify uniqueness against. Without it the build is purely
    /// textual.
    pub root: Option<ResolveRoot<'a>>,
    /// Escalate the target portion until the selector is unique in `root`.
    pub ensure_unique: bool,
}

/// Synthesize a CSS selector for an EID.
pub fn build_selector(eid: &Eid, opts: &BuildOptions<'_>) -> BuildResult {
    build_selector_cached(eid, opts, None)
}

pub(crate) fn build_selector_cached(
    eid: &Eid,
    opts: &BuildOptions<'_>,
    cache: Option<&EngineCache>,
) -> BuildResult {
    // Root elements synthesize fixed chains.
    if eid.target.tag == "html" {
        let is_unique = verify_unique(opts.root, "html", cache);
        return BuildResult {
            selector: "html".to_string(),
            is_unique,
            used_nth_of_type: false,
            extra_classes_added: 0,
        };
    }

    let mut used_nth_of_type = false;
    let mut extra_classes_added = 0usize;

    let (anchor_selector, root_chain) = if eid.anchor.tag == "html" {
        ("html".to_string(), true)
    } else {
        let escalated = escalate_anchor(&eid.anchor, opts.root, cache);
        used_nth_of_type = escalated.used_nth_of_type;
        extra_classes_added += escalated.extra_classes_added;
        (escalated.selector, false)
    };

    let mut selector = anchor_selector;
    // Root chains use `>` throughout; SVG interiors switch to `>` from the
    // svg node onward.
    let mut child_combinator = root_chain;
    for node in &eid.path {
        push_segment(&mut selector, &node_selector(node.into()), child_combinator);
        if node.tag == "svg" {
            child_combinator = true;
        }
    }
    push_segment(&mut selector, &node_selector((&eid.target).into()), child_combinator);

    let Some(root) = opts.root else {
        return BuildResult {
            selector,
            is_unique: false,
            used_nth_of_type,
            extra_classes_added,
        };
    };

    let mut is_unique = count(root, &selector, cache) == Some(1);
    if opts.ensure_unique && !is_unique {
        let (escalated, added_classes, unique) =
            escalate_target(&selector, eid, root, cache);
        selector = escalated;
        extra_classes_added += added_classes;
        is_unique = unique;
    }

    BuildResult {
        selector,
        is_unique,
        used_nth_of_type,
        extra_classes_added,
    }
}

/// Append a segment with the proper combinator.
fn push_segment(selector: &mut String, segment: &str, child: bool) {
    if !selector.is_empty() {
        selector.push_str(if child { " > " } else { " " });
    }
    selector.push_str(segment);
}

/// Full node syntax: tag, classes in stored order, attribute predicates in
/// stored order. The classes-before-attributes order is normative.
pub fn node_selector(view: NodeView<'_>) -> String {
    let mut out = String::from(view.tag);
    for class in &view.semantics.classes {
        out.push('.');
        out.push_str(&escape_css_identifier(class));
    }
    for (name, value) in &view.semantics.attributes {
        out.push('[');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute_value(value));
        out.push_str("\"]");
    }
    out
}

pub(crate) struct AnchorEscalation {
    pub(crate) selector: String,
    pub(crate) used_nth_of_type: bool,
    pub(crate) extra_classes_added: usize,
}

/// Narrow the anchor selector until it matches exactly one element: tag
/// alone, then one stable attribute, then one semantic class, then the
/// stored `:nth-child`, then `:nth-of-type` computed from the document.
pub(crate) fn escalate_anchor(
    anchor: &AnchorNode,
    root: Option<ResolveRoot<'_>>,
    cache: Option<&EngineCache>,
) -> AnchorEscalation {
    let tag = &anchor.tag;
    let Some(root) = root else {
        // Purely textual build: emit the full node syntax.
        return AnchorEscalation {
            selector: node_selector(anchor.into()),
            used_nth_of_type: false,
            extra_classes_added: 0,
        };
    };

    let mut attempts: Vec<(String, bool, usize)> = vec![(tag.clone(), false, 0)];
    if let Some((name, value)) = anchor.semantics.attributes.first() {
        attempts.push((
            format!("{tag}[{name}=\"{}\"]", escape_attribute_value(value)),
            false,
            0,
        ));
    }
    if let Some(class) = anchor.semantics.classes.first() {
        attempts.push((format!("{tag}.{}", escape_css_identifier(class)), false, 1));
    }
    if let Some(nth) = anchor.nth_child {
        attempts.push((format!("{tag}:nth-child({nth})"), false, 0));
    }

    for (candidate, nth_of_type, classes) in &attempts {
        if count(root, candidate, cache) == Some(1) {
            trace!(selector = %candidate, "anchor selector settled");
            return AnchorEscalation {
                selector: candidate.clone(),
                used_nth_of_type: *nth_of_type,
                extra_classes_added: *classes,
            };
        }
    }

    // Last resort: probe nth-of-type positions of the tag's occurrences.
    if let Ok(matches) = query(root, tag) {
        let mut seen = Vec::new();
        for candidate_el in matches {
            let Some(k) = nth_of_type(candidate_el) else { continue };
            if seen.contains(&k) {
                continue;
            }
            seen.push(k);
            let candidate = format!("{tag}:nth-of-type({k})");
            if count(root, &candidate, cache) == Some(1) {
                return AnchorEscalation {
                    selector: candidate,
                    used_nth_of_type: true,
                    extra_classes_added: 0,
                };
            }
        }
    }

    // Nothing narrowed to one; keep the most specific attempt.
    let fallback = node_selector(anchor.into());
    AnchorEscalation {
        selector: fallback,
        used_nth_of_type: false,
        extra_classes_added: 0,
    }
}

/// Target escalation under `ensure_unique`: extra semantic classes, then
/// extra identity attributes, then the stored `:nth-child`.
///
/// The baseline node syntax already carries every stored class and
/// attribute, so the first two steps have nothing left to contribute and the
/// stored nth-child is the working discriminator. Appending it keeps the
/// narrowed selector even when the document has drifted enough that it still
/// matches several elements.
fn escalate_target(
    baseline: &str,
    eid: &Eid,
    root: ResolveRoot<'_>,
    cache: Option<&EngineCache>,
) -> (String, usize, bool) {
    if let Some(nth) = eid.target.nth_child {
        let candidate = format!("{baseline}:nth-child({nth})");
        match count(root, &candidate, cache) {
            Some(1) => return (candidate, 0, true),
            Some(n) if n > 1 => return (candidate, 0, false),
            _ => {}
        }
    }
    let unique = count(root, baseline, cache) == Some(1);
    (baseline.to_string(), 0, unique)
}

/// Escape a class name (or other identifier) for use in a selector.
///
/// A leading `-` escapes to `\-`; the CSS-reserved punctuation set escapes
/// with a backslash; a leading digit uses the code-point form.
pub fn escape_css_identifier(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 2);
    for (i, c) in input.chars().enumerate() {
        match c {
            '!' | '"' | '#' | '$' | '%' | '&' | '\'' | '(' | ')' | '*' | '+' | ','
            | '.' | '/' | ':' | ';' | '<' | '=' | '>' | '?' | '@' | '[' | '\\' | ']'
            | '^' | '`' | '{' | '|' | '}' | '~' => {
                result.push('\\');
                result.push(c);
            }
            '0'..='9' if i == 0 => {
                result.push_str(&format!("\\3{c} "));
            }
            '-' if i == 0 => {
                result.push_str("\\-");
            }
            _ => result.push(c),
        }
    }
    result
}

/// Escape an attribute value for a double-quoted predicate.
pub fn escape_attribute_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            result.push('\\');
        }
        result.push(c);
    }
    result
}

/// Run a selector against a root, returning matches in document order.
pub(crate) fn query<'a>(
    root: ResolveRoot<'a>,
    selector_str: &str,
) -> Result<Vec<ElementRef<'a>>> {
    let selector = Selector::parse(selector_str).map_err(|e| Error::SelectorParse {
        selector: selector_str.to_string(),
        reason: e.to_string(),
    })?;
    Ok(match root {
        ResolveRoot::Document(doc) => doc.select(&selector).collect(),
        ResolveRoot::Element(el) => el.select(&selector).collect(),
    })
}

/// Like [`query`], but memoized through the selector-result LRU.
pub(crate) fn query_cached<'a>(
    root: ResolveRoot<'a>,
    selector_str: &str,
    cache: Option<&EngineCache>,
) -> Result<Vec<ElementRef<'a>>> {
    let Some(cache) = cache else {
        return query(root, selector_str);
    };
    let key = cache_key(root, selector_str);
    if let Some(ids) = cache.selector_result(&key) {
        let tree = root.tree();
        return Ok(ids
            .into_iter()
            .filter_map(|id| tree.get(id).and_then(ElementRef::wrap))
            .collect());
    }
    let matches = query(root, selector_str)?;
    cache.store_selector_result(&key, matches.iter().map(|el| el.id()).collect());
    Ok(matches)
}

/// Match count for a selector, `None` when the selector fails to compile.
pub(crate) fn count(
    root: ResolveRoot<'_>,
    selector_str: &str,
    cache: Option<&EngineCache>,
) -> Option<usize> {
    query_cached(root, selector_str, cache).ok().map(|m| m.len())
}

fn verify_unique(
    root: Option<ResolveRoot<'_>>,
    selector: &str,
    cache: Option<&EngineCache>,
) -> bool {
    root.map_or(false, |r| count(r, selector, cache) == Some(1))
}

fn cache_key(root: ResolveRoot<'_>, selector: &str) -> String {
    match root {
        ResolveRoot::Document(_) => format!("doc|{selector}"),
        ResolveRoot::Element(el) => format!("{:?}|{selector}", el.id()),
    }
}
