//! Per-element semantic extraction
//!
//! Distills an element into its identity-only semantics: stable id, semantic
//! classes, kept attributes in priority order, role, direct text, and an SVG
//! fingerprint where applicable.

use crate::classify::{
    attribute_priority, filter_classes, is_dynamic_id, is_stable_attribute, stable_id,
    ID_REFERENCE_ATTRIBUTES,
};
use crate::svg;
use crate::text::text_content;
use crate::types::ElementSemantics;
use crate::urlnorm::{clean_url_value, URL_ATTRIBUTES};
use crate::GenerateOptions;
use indexmap::IndexMap;
use scraper::ElementRef;

/// Tags whose direct text participates in identity.
const TEXT_BEARING_TAGS: &[&str] = &[
    "button", "a", "label", "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "li",
    "th", "td", "dt", "dd", "legend", "figcaption", "summary",
];

/// Attributes handled through their own channels, never stored in the
/// attribute map.
const CHANNELED_ATTRIBUTES: &[&str] = &["id", "class", "style"];

/// Extract identity semantics for one element.
pub fn extract_semantics(el: ElementRef<'_>, opts: &GenerateOptions) -> ElementSemantics {
    let element = el.value();
    let tag = element.name().to_lowercase();

    let id = stable_id(element.attr("id")).map(str::to_string);

    let classes = if opts.include_utility_classes {
        element.classes().map(str::to_string).collect()
    } else {
        filter_classes(element.classes()).semantic
    };

    let mut kept: Vec<(&str, String)> = Vec::new();
    for (name, value) in element.attrs() {
        if CHANNELED_ATTRIBUTES.contains(&name) {
            continue;
        }
        if references_dynamic_id(name, value) {
            continue;
        }
        if !is_stable_attribute(name, value) {
            continue;
        }
        let stored = if URL_ATTRIBUTES.contains(&name) {
            clean_url_value(value)
        } else {
            value.to_string()
        };
        kept.push((name, stored));
    }
    kept.sort_by(|(a, _), (b, _)| attribute_priority(a).cmp(&attribute_priority(b)));
    let attributes: IndexMap<String, String> = kept
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

    let role = element.attr("role").map(str::to_string);

    let text = if TEXT_BEARING_TAGS.contains(&tag.as_str()) {
        direct_text(el).as_deref().and_then(text_content)
    } else {
        None
    };

    let svg = if opts.enable_svg_fingerprint {
        svg::fingerprint(el)
    } else {
        None
    };

    ElementSemantics {
        id,
        classes,
        attributes,
        role,
        text,
        svg,
    }
}

/// Memoized variant of [`extract_semantics`]. A shared cache assumes the
/// same extraction options across calls.
pub(crate) fn cached_semantics(
    el: ElementRef<'_>,
    opts: &GenerateOptions,
    cache: &crate::cache::EngineCache,
) -> ElementSemantics {
    if let Some(hit) = cache.semantics(el.id()) {
        return hit;
    }
    let semantics = extract_semantics(el, opts);
    cache.store_semantics(el.id(), semantics.clone());
    semantics
}

/// Semantic richness of an element, in `[0, 1]`.
pub fn semantic_score(semantics: &ElementSemantics) -> f64 {
    let mut score: f64 = 0.5;
    if semantics.id.is_some() {
        score += 0.15;
    }
    if !semantics.classes.is_empty() {
        score += 0.10;
    }
    if !semantics.attributes.is_empty() {
        score += 0.10;
    }
    if semantics.role.is_some() {
        score += 0.10;
    }
    if semantics.text.is_some() {
        score += 0.05;
    }
    score.clamp(0.0, 1.0)
}

/// An id-reference attribute pointing at any dynamic id is dropped wholesale.
fn references_dynamic_id(name: &str, value: &str) -> bool {
    ID_REFERENCE_ATTRIBUTES.contains(&name)
        && value.split_ascii_whitespace().any(is_dynamic_id)
}

/// Concatenated direct text-node children (descendant text excluded).
fn direct_text(el: ElementRef<'_>) -> Option<String> {
    let mut out = String::new();
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
    (!out.trim().is_empty()).then_some(out)
}

/// The `<html>` element (more generally, the outermost element) of the tree
/// containing `el`.
pub fn document_element(el: ElementRef<'_>) -> ElementRef<'_> {
    let mut root = *el;
    while let Some(parent) = root.parent() {
        root = parent;
    }
    ElementRef::wrap(root)
        .or_else(|| root.children().find_map(ElementRef::wrap))
        .unwrap_or(el)
}

/// 1-based position among the parent's element children, `None` for
/// parentless elements.
pub fn nth_child(el: ElementRef<'_>) -> Option<u32> {
    let parent = el.parent()?;
    let mut index = 0u32;
    for sibling in parent.children() {
        if ElementRef::wrap(sibling).is_some() {
            index += 1;
            if sibling.id() == el.id() {
                return Some(index);
            }
        }
    }
    None
}

/// 1-based position among same-tag element siblings, `None` for parentless
/// elements.
pub fn nth_of_type(el: ElementRef<'_>) -> Option<u32> {
    let parent = el.parent()?;
    let tag = el.value().name();
    let mut index = 0u32;
    for sibling in parent.children() {
        if let Some(sib_el) = ElementRef::wrap(sibling) {
            if sib_el.value().name() == tag {
                index += 1;
                if sibling.id() == el.id() {
                    return Some(index);
                }
            }
        }
    }
    None
}
