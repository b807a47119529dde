//! URL normalization
//!
//! Two distinct passes over URL-bearing attribute values:
//!
//! - **Extraction time** ([`clean_url_value`]): query strings and
//!   dynamic-looking fragments are removed, origins are left alone.
//! - **Match time** ([`normalize_url`]): same-origin absolute URLs collapse
//!   to their root-relative path so that `https://app.example.com/cart` and
//!   `/cart` compare equal. The base comes from the resolver's root context,
//!   never from ambient process state.

use crate::classify::is_dynamic_id;
use url::Url;

/// Schemes preserved verbatim by both passes.
const PRESERVED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Attribute names whose values are URLs.
pub const URL_ATTRIBUTES: &[&str] = &["href", "src", "action"];

fn has_preserved_scheme(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    PRESERVED_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Extraction-time cleaning: strip the query string, and strip the fragment
/// only when it reads as generated. The origin is not touched.
pub fn clean_url_value(value: &str) -> String {
    if has_preserved_scheme(value) {
        return value.to_string();
    }
    let (without_fragment, fragment) = match value.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (value, None),
    };
    let without_query = without_fragment
        .split_once('?')
        .map(|(head, _)| head)
        .unwrap_or(without_fragment);

    match fragment {
        Some(frag) if !frag.is_empty() && !is_dynamic_id(frag) => {
            format!("{without_query}#{frag}")
        }
        _ => without_query.to_string(),
    }
}

/// Match-time normalization against the resolution base URL.
///
/// Same-origin absolute URLs become root-relative paths; preserved schemes,
/// cross-origin absolutes, and relative URLs pass through unchanged.
pub fn normalize_url(value: &str, base: Option<&Url>) -> String {
    if value.is_empty() || has_preserved_scheme(value) {
        return value.to_string();
    }
    match Url::parse(value) {
        Ok(parsed) => {
            if let Some(base) = base {
                if same_origin(&parsed, base) {
                    let mut path = parsed.path().to_string();
                    if let Some(query) = parsed.query() {
                        path.push('?');
                        path.push_str(query);
                    }
                    if let Some(frag) = parsed.fragment() {
                        path.push('#');
                        path.push_str(frag);
                    }
                    return path;
                }
            }
            // Cross-origin (or no base): preserved as given.
            value.to_string()
        }
        // Relative URLs are already in their comparable form.
        Err(_) => value.to_string(),
    }
}

/// The comparable form used by the attribute matcher: cleaned, then
/// normalized. Applying this to both sides keeps comparison symmetric.
pub fn canonicalize_url(value: &str, base: Option<&Url>) -> String {
    normalize_url(&clean_url_value(value), base)
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
