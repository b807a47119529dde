//! # seql
//!
//! Resilient semantic identifiers for HTML/SVG document elements.
//!
//! `seql` assigns an element a stable **Element Identity Descriptor (EID)**
//! that encodes what the element *is*: its semantic anchor, the meaningful
//! ancestors above it, and its identity attributes, rather than where it
//! happens to sit. The descriptor survives CSS-class churn, framework
//! re-rendering, state flips, and a bounded amount of structural drift, and
//! can later be resolved back to the element in a mutated document.
//!
//! ## Quick Start
//!
//! ```rust
//! use scraper::{Html, Selector};
//! use seql::{generate_eid, resolve, GenerateOptions, ResolveOptions, ResolveRoot};
//!
//! let html = r#"<body><form id="login"><input name="email"></form></body>"#;
//! let doc = Html::parse_document(html);
//!
//! let input = doc
//!     .select(&Selector::parse("input").unwrap())
//!     .next()
//!     .unwrap();
//! let eid = generate_eid(input, &GenerateOptions::default()).unwrap();
//!
//! // ...the page re-renders, classes churn, state flips...
//! let found = resolve(&eid, ResolveRoot::Document(&doc), &ResolveOptions::default());
//! assert_eq!(found.elements.len(), 1);
//!
//! // Compact one-line form for logs and storage:
//! let line = seql::to_seql(&eid);
//! let parsed = seql::parse_seql(&line).unwrap();
//! assert_eq!(parsed.target.tag, "input");
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: the same element in the same document state yields the
//!   same descriptor, with or without a shared cache.
//! - **State independence**: mutations that only flip state attributes
//!   (`aria-expanded`, `data-state`, `disabled`, …) or utility classes do
//!   not change the descriptor.
//! - **Errors are values**: resolution reports `success`, `ambiguous`,
//!   `degraded-fallback`, or `error`. Nothing panics across the API.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod anchor;
mod cache;
mod classify;
mod constraints;
mod extract;
mod generate;
mod matcher;
mod path;
mod resolve;
mod selector;
pub mod seql;
mod svg;
mod text;
mod types;
mod urlnorm;

pub use cache::{EngineCache, DEFAULT_SELECTOR_CACHE_SIZE};
pub use classify::{
    filter_classes, is_dynamic_id, is_stable_attribute, is_utility_class, ClassPartition,
    ID_REFERENCE_ATTRIBUTES, TEST_MARKER_ATTRIBUTES,
};
pub use constraints::{Candidate, ConstraintOutcome};
pub use extract::{extract_semantics, nth_child, nth_of_type, semantic_score};
pub use generate::{generate_eid, generate_eid_batch, generate_eid_with_cache};
pub use matcher::{similarity, FALLBACK_THRESHOLD, MATCH_THRESHOLD};
pub use resolve::{resolve, resolve_with_cache, ResolveResult, ResolveStatus};
pub use selector::{
    build_selector, escape_css_identifier, node_selector, BuildOptions, BuildResult,
};
pub use seql::{parse_seql, to_seql};
pub use svg::{fingerprint as svg_fingerprint, is_svg_element};
pub use text::{normalize_text, MAX_TEXT_LENGTH};
pub use types::*;
pub use urlnorm::{canonicalize_url, clean_url_value, normalize_url};

use scraper::{ElementRef, Html};
use thiserror::Error;
use url::Url;

/// Errors surfaced by the format layer and selector compilation.
///
/// Generation returns `Option` and resolution reports status values; only
/// genuinely exceptional inputs (unparseable SEQL, a selector the engine
/// cannot compile) travel as `Err`.
#[derive(Error, Debug)]
pub enum Error {
    /// A synthesized or supplied selector failed to compile.
    #[error("failed to compile selector `{selector}`: {reason}")]
    SelectorParse {
        /// The offending selector text.
        selector: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A SEQL line failed to parse.
    #[error("SEQL parse error at offset {offset}: {reason}")]
    SeqlParse {
        /// Character offset of the failure.
        offset: usize,
        /// What the parser expected.
        reason: String,
    },

    /// A descriptor violated a structural invariant.
    #[error("malformed descriptor: {0}")]
    InvalidEid(String),

    /// IO error from a front-end.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for seql operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options governing EID generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Cap on the anchor walk and the ancestor chain (default 10).
    pub max_path_depth: u32,
    /// Record SVG shape fingerprints (default true).
    pub enable_svg_fingerprint: bool,
    /// Reject results below this confidence; 0.0 accepts everything
    /// (default 0.0).
    pub confidence_threshold: f64,
    /// Fall back to `<body>` when the anchor walk finds nothing
    /// (default true).
    pub fallback_to_body: bool,
    /// Keep utility classes in semantics, a debug aid (default false).
    pub include_utility_classes: bool,
    /// Provenance tag stored in `meta.source`.
    pub source: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_path_depth: 10,
            enable_svg_fingerprint: true,
            confidence_threshold: 0.0,
            fallback_to_body: true,
            include_utility_classes: false,
            source: None,
        }
    }
}

/// Options governing resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Reject degraded fallback matches (default false).
    pub strict_mode: bool,
    /// Promote `ambiguous` to `error` (default false).
    pub require_uniqueness: bool,
    /// Allow the degraded anchor-only pass (default true).
    pub enable_fallback: bool,
    /// Cap on phase-1 candidates (default 100).
    pub max_candidates: usize,
    /// Base URL for attribute normalization. Defaults to the document's
    /// `<base href>` when absent.
    pub base_url: Option<Url>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            require_uniqueness: false,
            enable_fallback: true,
            max_candidates: 100,
            base_url: None,
        }
    }
}

/// Where a resolution call searches: a whole document or a subtree.
#[derive(Debug, Clone, Copy)]
pub enum ResolveRoot<'a> {
    /// Search the entire document.
    Document(&'a Html),
    /// Search the descendants of one element.
    Element(ElementRef<'a>),
}

impl<'a> ResolveRoot<'a> {
    pub(crate) fn tree(&self) -> &'a ego_tree::Tree<scraper::Node> {
        match *self {
            ResolveRoot::Document(doc) => &doc.tree,
            ResolveRoot::Element(el) => el.tree(),
        }
    }
}
