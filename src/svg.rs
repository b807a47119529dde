//! SVG shape fingerprinting
//!
//! Icons and decorative vectors rarely carry ids or classes of their own, so
//! their identity is derived from geometry instead: a hash over the leading
//! path commands, or over a scale-independent descriptor for primitive
//! shapes. Hashes use a fixed-state [`FxHasher`] so fingerprints are stable
//! across runs and hosts; the output width is 8 hex digits.

use crate::types::{SvgFingerprint, SvgShape};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHasher;
use scraper::ElementRef;
use std::hash::Hasher;

/// Number of leading path commands contributing to `dHash`.
const PATH_COMMAND_LIMIT: usize = 5;

/// SMIL animation elements.
const SMIL_TAGS: &[&str] = &["animate", "animateTransform", "animateMotion"];

/// Path-data tokens: a command letter or a (possibly signed, possibly
/// exponent-bearing) number.
static PATH_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([MmLlHhVvCcSsQqTtAaZz])|(-?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("path token pattern must compile")
});

/// True when the element lives in an `<svg>` subtree (or is the `<svg>`
/// root itself).
pub fn is_svg_element(el: ElementRef<'_>) -> bool {
    if el.value().name().eq_ignore_ascii_case("svg") {
        return true;
    }
    el.ancestors().any(|node| {
        ElementRef::wrap(node)
            .map(|a| a.value().name().eq_ignore_ascii_case("svg"))
            .unwrap_or(false)
    })
}

/// Derive the fingerprint for an SVG element. Returns `None` for elements
/// outside the supported shape set or outside an SVG subtree.
pub fn fingerprint(el: ElementRef<'_>) -> Option<SvgFingerprint> {
    let tag = el.value().name().to_lowercase();
    let shape = SvgShape::from_tag(&tag)?;
    if !is_svg_element(el) {
        return None;
    }

    let d_hash = match shape {
        SvgShape::Path => el.value().attr("d").map(path_hash),
        _ => None,
    };
    let geom_hash = geometry_descriptor(shape, el).map(|descriptor| hash8(&descriptor));

    Some(SvgFingerprint {
        shape,
        d_hash,
        geom_hash,
        role: el.value().attr("role").map(str::to_string),
        title_text: title_text(el),
        has_animation: has_animation(el),
    })
}

/// Hash the first [`PATH_COMMAND_LIMIT`] commands of a path's `d` attribute,
/// with numeric operands rounded to one decimal place.
pub fn path_hash(d: &str) -> String {
    let mut canonical = String::new();
    let mut commands = 0usize;
    for token in PATH_TOKENS.find_iter(d) {
        let tok = token.as_str();
        if tok.len() == 1 && tok.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            commands += 1;
            if commands > PATH_COMMAND_LIMIT {
                break;
            }
            if !canonical.is_empty() {
                canonical.push('|');
            }
            canonical.push_str(tok);
        } else if commands > 0 {
            let rounded = tok.parse::<f64>().map(|n| round_to(n, 1)).unwrap_or(0.0);
            canonical.push(' ');
            canonical.push_str(&format_num(rounded));
        }
    }
    hash8(&canonical)
}

/// Scale-independent descriptor for primitive shapes.
fn geometry_descriptor(shape: SvgShape, el: ElementRef<'_>) -> Option<String> {
    let attr = |name: &str| -> Option<f64> {
        el.value().attr(name).and_then(|v| v.trim().parse::<f64>().ok())
    };
    match shape {
        SvgShape::Circle => {
            let r = attr("r")?;
            Some(format!("circle:r={}", format_num(round_to(r, 2))))
        }
        SvgShape::Rect => {
            let w = attr("width")?;
            let h = attr("height")?;
            if h == 0.0 {
                return None;
            }
            Some(format!("rect:ratio={}", format_num(round_to(w / h, 2))))
        }
        SvgShape::Ellipse => {
            let rx = attr("rx")?;
            let ry = attr("ry")?;
            if ry == 0.0 {
                return None;
            }
            Some(format!("ellipse:ratio={}", format_num(round_to(rx / ry, 2))))
        }
        SvgShape::Line => {
            let x1 = attr("x1").unwrap_or(0.0);
            let y1 = attr("y1").unwrap_or(0.0);
            let x2 = attr("x2").unwrap_or(0.0);
            let y2 = attr("y2").unwrap_or(0.0);
            let angle = (y2 - y1).atan2(x2 - x1);
            Some(format!("line:angle={}", format_num(round_to(angle, 2))))
        }
        _ => None,
    }
}

/// Text of a direct `<title>` child, when present.
fn title_text(el: ElementRef<'_>) -> Option<String> {
    el.children().find_map(|child| {
        let child_el = ElementRef::wrap(child)?;
        if child_el.value().name().eq_ignore_ascii_case("title") {
            let text: String = child_el.text().collect();
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        } else {
            None
        }
    })
}

/// SMIL children or an inline style declaring a running animation or a named
/// transition.
fn has_animation(el: ElementRef<'_>) -> bool {
    let smil = el.descendants().any(|node| {
        ElementRef::wrap(node)
            .map(|d| SMIL_TAGS.iter().any(|t| d.value().name().eq_ignore_ascii_case(t)))
            .unwrap_or(false)
    });
    if smil {
        return true;
    }
    el.value()
        .attr("style")
        .map(style_declares_animation)
        .unwrap_or(false)
}

fn style_declares_animation(style: &str) -> bool {
    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim().to_ascii_lowercase();
        if value.is_empty() || value == "none" {
            continue;
        }
        if property == "animation" || property == "animation-name" {
            return true;
        }
        if property == "transition" || property == "transition-property" {
            return true;
        }
    }
    false
}

fn round_to(n: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (n * factor).round() / factor
}

/// Canonical numeric formatting: integers print without a trailing `.0`.
fn format_num(n: f64) -> String {
    if n == n.trunc() {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Stable 32-bit mix of a canonical descriptor, printed as 8 hex digits.
pub fn hash8(input: &str) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(input.as_bytes());
    format!("{:08x}", hasher.finish() as u32)
}
