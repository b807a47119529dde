//! Classifiers and filters
//!
//! The identity-versus-state decisions live here: which class names are
//! presentational utilities, which ids are framework-generated, which
//! attributes reflect transient UI state, and in what order the surviving
//! attributes are emitted.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

// ---------------------------------------------------------------------------
// Utility classes
// ---------------------------------------------------------------------------

/// Patterns covering the common CSS utility frameworks. A class matching any
/// of these carries no element identity.
static UTILITY_CLASS_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // Directional spacing: m-4, px-2, mt-0, -mx-1, p-[3px]
        r"^[mp][trblxyse]?-(\d|px$|auto$|full$|\[)",
        // Sizing
        r"^(w|h|min-w|min-h|max-w|max-h|size)-",
        // Framework color scales: bg-blue-500, text-gray-900, border-red-50
        r"^(bg|text|border|ring|fill|stroke|from|via|to|accent|caret|divide|decoration|placeholder)-[a-z]+-\d+",
        r"^(bg|text|border|ring|fill|stroke)-(white|black|transparent|current|inherit|none)$",
        // Display / flex / grid primitives
        r"^(flex|grid|block|inline|inline-block|inline-flex|inline-grid|contents|hidden|table|flow-root)$",
        r"^(flex|grid|basis|items|justify|content|self|place|gap|space|col|row|order|grow|shrink|wrap)-",
        // Positioning
        r"^(static|fixed|absolute|relative|sticky)$",
        r"^(top|right|bottom|left|inset|start|end)-",
        r"^z-\d+$",
        // Transforms and animation
        r"^(translate|rotate|scale|skew|origin|transform)(-|$)",
        r"^(transition|duration|ease|delay|animate)(-|$)",
        // Typography utilities
        r"^(font|leading|tracking|whitespace|break|align|indent)-",
        r"^text-(left|center|right|justify|start|end|xs|sm|base|lg|[0-9]?xl|\[)",
        r"^(truncate|uppercase|lowercase|capitalize|italic|not-italic|underline|overline|line-through|no-underline|antialiased|subpixel-antialiased)$",
        // Borders, effects, filters
        r"^(rounded|border|shadow|opacity|ring|outline|blur|brightness|contrast|grayscale|saturate|sepia|backdrop)(-|$)",
        // Behavior utilities
        r"^(overflow|overscroll|cursor|select|pointer-events|resize|appearance|list|object|aspect|columns|scroll|snap|touch|will-change)-",
        // Arbitrary variant prefixes: hover:, sm:, focus-visible:, file:, dark:
        r"^[a-z][a-z-]*:",
    ])
    .expect("utility class pattern set must compile")
});

/// Classify a single class name as utility (presentational) or semantic.
///
/// A leading `-` (negative spacing/offset variants) is stripped before
/// matching, so `-mt-4` classifies like `mt-4`.
pub fn is_utility_class(class: &str) -> bool {
    let candidate = class.strip_prefix('-').unwrap_or(class);
    UTILITY_CLASS_PATTERNS.is_match(candidate)
}

/// Ordered partition of a class list into semantic and utility halves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPartition {
    /// Classes carrying identity, in source order.
    pub semantic: Vec<String>,
    /// Presentational utilities, in source order.
    pub utility: Vec<String>,
}

/// Partition class names, preserving source order within each half.
pub fn filter_classes<'a, I>(classes: I) -> ClassPartition
where
    I: IntoIterator<Item = &'a str>,
{
    let mut partition = ClassPartition::default();
    for class in classes {
        if class.is_empty() {
            continue;
        }
        if is_utility_class(class) {
            partition.utility.push(class.to_string());
        } else {
            partition.semantic.push(class.to_string());
        }
    }
    partition
}

// ---------------------------------------------------------------------------
// Dynamic ids
// ---------------------------------------------------------------------------

/// Framework-generated id shapes.
static FRAMEWORK_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^radix-").unwrap(),
        Regex::new(r"^headlessui-").unwrap(),
        Regex::new(r"^mantine-").unwrap(),
        Regex::new(r"^mui-").unwrap(),
        Regex::new(r"^chakra-").unwrap(),
        Regex::new(r"^__next").unwrap(),
        // React useId: ":r0:", ":r1a:"
        Regex::new(r"^:r[0-9a-z]+:$").unwrap(),
    ]
});

/// Long opaque hex runs: content hashes, uuid fragments.
static OPAQUE_HEX_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-fA-F0-9]{16,}$").unwrap());

/// Hash-like short ids: short lowercase prefix followed by an opaque tail.
static HASH_LIKE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{1,3}[A-Za-z0-9]{8,}$").unwrap());

/// Attributes whose values reference other element ids. When the referenced
/// id is dynamic, the whole attribute is dropped from semantics.
pub const ID_REFERENCE_ATTRIBUTES: &[&str] = &[
    "for",
    "form",
    "aria-labelledby",
    "aria-describedby",
    "aria-controls",
    "aria-owns",
    "list",
    "headers",
];

/// Detect framework-generated or hash-like ids.
///
/// CamelCase identifiers (uppercase but no digits) and short numeric tails
/// (`button2`) are stable; mixed alphanumeric runs that look like content
/// hashes are not.
pub fn is_dynamic_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    if FRAMEWORK_ID_PATTERNS.iter().any(|p| p.is_match(id)) {
        return true;
    }
    if OPAQUE_HEX_ID.is_match(id) {
        return true;
    }
    if HASH_LIKE_ID.is_match(id) {
        let has_digit = id.chars().any(|c| c.is_ascii_digit());
        let has_upper = id.chars().any(|c| c.is_ascii_uppercase());
        if (has_digit && has_upper) || id.len() >= 20 {
            return true;
        }
    }
    has_opaque_segment(id)
}

/// A separator-delimited segment reads as generated when it is a hex run of
/// six or more characters mixing letters and digits, or a longer base62 run
/// mixing digits with both letter cases.
fn has_opaque_segment(id: &str) -> bool {
    id.split(['-', '_', ':', '.']).any(|segment| {
        let len = segment.chars().count();
        let has_digit = segment.chars().any(|c| c.is_ascii_digit());
        let has_alpha = segment.chars().any(|c| c.is_ascii_alphabetic());
        let all_hex = !segment.is_empty()
            && segment.chars().all(|c| c.is_ascii_hexdigit());
        if all_hex && len >= 6 && has_digit && has_alpha {
            return true;
        }
        let all_alnum = !segment.is_empty()
            && segment.chars().all(|c| c.is_ascii_alphanumeric());
        let has_upper = segment.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = segment.chars().any(|c| c.is_ascii_lowercase());
        all_alnum && len >= 8 && has_digit && has_upper && has_lower
    })
}

/// An id usable for anchoring, i.e. present and not generated.
pub fn stable_id(id: Option<&str>) -> Option<&str> {
    id.filter(|candidate| !candidate.is_empty() && !is_dynamic_id(candidate))
}

// ---------------------------------------------------------------------------
// Attribute classification
// ---------------------------------------------------------------------------

/// ARIA attributes whose values track transient UI state.
const ARIA_STATE_ATTRIBUTES: &[&str] = &[
    "aria-selected",
    "aria-checked",
    "aria-pressed",
    "aria-expanded",
    "aria-hidden",
    "aria-current",
    "aria-disabled",
    "aria-busy",
    "aria-invalid",
    "aria-grabbed",
    "aria-valuenow",
    "aria-valuetext",
    "aria-sort",
    "aria-live",
    "aria-modal",
];

/// `data-*` attributes UI kits flip as state changes.
const STATE_DATA_ATTRIBUTES: &[&str] = &[
    "data-state",
    "data-active",
    "data-open",
    "data-selected",
    "data-expanded",
    "data-orientation",
    "data-highlighted",
    "data-disabled",
    "data-checked",
    "data-pressed",
    "data-side",
    "data-align",
    "data-loading",
    "data-focus",
    "data-focus-visible",
    "data-hover",
    "data-placeholder",
];

/// UI-kit internal data attribute prefixes.
const LIBRARY_DATA_PREFIXES: &[&str] = &[
    "data-radix-",
    "data-headlessui-",
    "data-reach-",
    "data-mui-",
    "data-chakra-",
];

/// Boolean HTML attributes that flag state, not identity.
const HTML_STATE_FLAGS: &[&str] = &["disabled", "readonly", "checked", "hidden", "open"];

/// Analytics and tracking attribute prefixes, dropped even when the name ends
/// in `-id`.
const ANALYTICS_PREFIXES: &[&str] = &[
    "data-ga",
    "data-gtm",
    "data-track",
    "data-tracking",
    "data-event",
    "data-hj",
    "data-fs",
    "data-optimizely",
    "data-vwo",
    "data-fb",
    "data-tt",
    "data-li",
    "data-analytics",
    "data-ym",
];

/// Test markers always kept, shielded from the analytics prefix rules.
pub const TEST_MARKER_ATTRIBUTES: &[&str] =
    &["data-testid", "data-test", "data-qa", "data-cy"];

/// Scoped-style and framework bookkeeping markers.
const SCOPED_STYLE_PREFIXES: &[&str] = &["data-v-", "data-reactid", "_ng", "ng-"];

/// Identity attributes kept in semantics, in emission-priority order.
const IDENTITY_ATTRIBUTES: &[&str] = &[
    "type",
    "name",
    "value",
    "href",
    "src",
    "action",
    "role",
    "placeholder",
    "for",
    "form",
    "alt",
    "title",
    "lang",
    "dir",
];

/// ARIA attributes that name rather than track the element.
const ARIA_IDENTITY_ATTRIBUTES: &[&str] =
    &["aria-label", "aria-labelledby", "aria-describedby"];

/// Value shapes that read as generated rather than authored.
static DYNAMIC_VALUE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"[a-fA-F0-9]{32,}").unwrap(),
        Regex::new(r"\d{10,}").unwrap(),
        Regex::new(r"^(undefined|null)$").unwrap(),
        Regex::new(r"^\[object ").unwrap(),
        Regex::new(r"\{\{.*\}\}").unwrap(),
    ]
});

/// Whether an attribute value looks machine-generated.
pub fn is_dynamic_value(value: &str) -> bool {
    DYNAMIC_VALUE_PATTERNS.iter().any(|p| p.is_match(value))
}

/// Classify an attribute as identity-bearing (`true`) or droppable (`false`).
///
/// State attributes, analytics markers, framework bookkeeping, inline event
/// handlers and dynamic values are all dropped; the identity set plus the
/// test-marker whitelist plus well-behaved custom `data-*` attributes are
/// kept.
pub fn is_stable_attribute(name: &str, value: &str) -> bool {
    if TEST_MARKER_ATTRIBUTES.contains(&name) {
        return true;
    }
    if ARIA_STATE_ATTRIBUTES.contains(&name) {
        return false;
    }
    if STATE_DATA_ATTRIBUTES.contains(&name) {
        return false;
    }
    if LIBRARY_DATA_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if HTML_STATE_FLAGS.contains(&name) {
        return false;
    }
    if ANALYTICS_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if name.starts_with("on") {
        return false;
    }
    if SCOPED_STYLE_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return false;
    }
    if is_dynamic_value(value) {
        return false;
    }
    if IDENTITY_ATTRIBUTES.contains(&name) || ARIA_IDENTITY_ATTRIBUTES.contains(&name) {
        return true;
    }
    // Custom data attributes carry identity unless ruled out above.
    name.starts_with("data-")
}

/// Emission priority for a kept attribute. Lower sorts first: identity
/// attributes in table order, then `aria-*`, then the test-marker family,
/// then remaining `data-*` alphabetically.
pub fn attribute_priority(name: &str) -> (u8, usize, &str) {
    if let Some(pos) = IDENTITY_ATTRIBUTES.iter().position(|a| *a == name) {
        return (0, pos, name);
    }
    if let Some(pos) = ARIA_IDENTITY_ATTRIBUTES.iter().position(|a| *a == name) {
        return (1, pos, name);
    }
    if let Some(pos) = TEST_MARKER_ATTRIBUTES.iter().position(|a| *a == name) {
        return (2, pos, name);
    }
    (3, 0, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacing_utilities() {
        for class in ["m-4", "mt-2", "px-6", "py-0", "p-px", "mx-auto", "-mt-4", "ms-1"] {
            assert!(is_utility_class(class), "{class} should be utility");
        }
    }

    #[test]
    fn test_sizing_and_color_utilities() {
        for class in ["w-full", "h-10", "min-w-0", "max-h-screen", "bg-blue-500", "text-gray-900", "bg-transparent"] {
            assert!(is_utility_class(class), "{class} should be utility");
        }
    }

    #[test]
    fn test_layout_utilities() {
        for class in ["flex", "grid", "hidden", "items-center", "justify-between", "absolute", "top-0", "z-50", "-z-10"] {
            assert!(is_utility_class(class), "{class} should be utility");
        }
    }

    #[test]
    fn test_variant_prefix_catch_all() {
        for class in ["hover:bg-red-500", "sm:flex", "file:bg-transparent", "focus-visible:ring-2", "dark:text-white"] {
            assert!(is_utility_class(class), "{class} should be utility");
        }
    }

    #[test]
    fn test_semantic_classes_survive() {
        for class in ["glass-card", "btn-primary", "nav-link", "lucide-mail", "search-form", "product-tile"] {
            assert!(!is_utility_class(class), "{class} should be semantic");
        }
    }

    #[test]
    fn test_filter_classes_preserves_order() {
        let partition =
            filter_classes(["flex", "glass-card", "h-10", "w-full", "file:bg-transparent"]);
        assert_eq!(partition.semantic, vec!["glass-card"]);
        assert_eq!(
            partition.utility,
            vec!["flex", "h-10", "w-full", "file:bg-transparent"]
        );
    }

    #[test]
    fn test_framework_ids_are_dynamic() {
        for id in [
            "radix-42",
            "headlessui-menu-button-3",
            "mantine-r1c2",
            "mui-8821",
            "chakra-toast-1",
            ":r5:",
            "__next-route-announcer",
        ] {
            assert!(is_dynamic_id(id), "{id} should be dynamic");
        }
    }

    #[test]
    fn test_opaque_hex_ids_are_dynamic() {
        assert!(is_dynamic_id("9f86d081884c7d659a2f"));
        assert!(is_dynamic_id("deadbeefdeadbeef"));
    }

    #[test]
    fn test_hash_like_ids_are_dynamic() {
        // Short lowercase prefix, then an opaque tail with digits and caps.
        assert!(is_dynamic_id("x7Kp2Qr9w"));
        assert!(is_dynamic_id("ab3F9xQ2mZ"));
    }

    #[test]
    fn test_camel_case_and_numeric_tails_are_stable() {
        for id in ["firstName", "lastName", "submitButton", "button2", "step3", "nav", "main-content"] {
            assert!(!is_dynamic_id(id), "{id} should be stable");
        }
    }

    #[test]
    fn test_mixed_hex_segments_are_dynamic() {
        assert!(is_dynamic_id("field-a1b2c3"));
        assert!(is_dynamic_id("tooltip_0f3e9d"));
    }

    #[test]
    fn test_aria_state_dropped() {
        assert!(!is_stable_attribute("aria-expanded", "true"));
        assert!(!is_stable_attribute("aria-selected", "false"));
        assert!(!is_stable_attribute("aria-hidden", "true"));
    }

    #[test]
    fn test_aria_identity_kept() {
        assert!(is_stable_attribute("aria-label", "Close dialog"));
        assert!(is_stable_attribute("aria-labelledby", "title-1"));
    }

    #[test]
    fn test_state_data_attributes_dropped() {
        assert!(!is_stable_attribute("data-state", "open"));
        assert!(!is_stable_attribute("data-orientation", "horizontal"));
        assert!(!is_stable_attribute("data-radix-collection-item", ""));
    }

    #[test]
    fn test_html_state_flags_dropped() {
        assert!(!is_stable_attribute("disabled", ""));
        assert!(!is_stable_attribute("checked", ""));
        assert!(!is_stable_attribute("open", ""));
    }

    #[test]
    fn test_analytics_dropped_even_with_id_suffix() {
        assert!(!is_stable_attribute("data-tracking-id", "abc"));
        assert!(!is_stable_attribute("data-ga-event", "click"));
        assert!(!is_stable_attribute("data-gtm-label", "cta"));
    }

    #[test]
    fn test_test_markers_whitelisted() {
        assert!(is_stable_attribute("data-testid", "save-button"));
        assert!(is_stable_attribute("data-qa", "login"));
        assert!(is_stable_attribute("data-cy", "submit"));
    }

    #[test]
    fn test_custom_data_attributes_kept() {
        assert!(is_stable_attribute("data-product-id", "42"));
        assert!(is_stable_attribute("data-step", "billing"));
    }

    #[test]
    fn test_event_handlers_and_scoped_styles_dropped() {
        assert!(!is_stable_attribute("onclick", "doThing()"));
        assert!(!is_stable_attribute("onmouseover", "x"));
        assert!(!is_stable_attribute("data-v-7ba5bd90", ""));
        assert!(!is_stable_attribute("ng-controller", "MainCtrl"));
    }

    #[test]
    fn test_dynamic_values_dropped() {
        assert!(!is_stable_attribute("data-hash", &"a".repeat(40)));
        assert!(!is_stable_attribute("data-ts", "1714764893000"));
        assert!(!is_stable_attribute("data-x", "undefined"));
        assert!(!is_stable_attribute("data-tpl", "{{item.name}}"));
    }

    #[test]
    fn test_unprioritized_attributes_dropped() {
        assert!(!is_stable_attribute("tabindex", "0"));
        assert!(!is_stable_attribute("spellcheck", "false"));
    }

    #[test]
    fn test_attribute_priority_ordering() {
        let mut names = vec![
            "data-product-id",
            "aria-label",
            "data-testid",
            "name",
            "type",
            "data-a",
        ];
        names.sort_by_key(|n| attribute_priority(n));
        assert_eq!(
            names,
            vec!["type", "name", "aria-label", "data-testid", "data-a", "data-product-id"]
        );
    }
}
