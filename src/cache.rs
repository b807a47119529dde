//! Engine caches
//!
//! Two tiers, per the shared caching discipline of the generator and the
//! resolver:
//!
//! - **Per-element memoization** keyed by the element's tree id for the
//!   anchor outcome, the extracted semantics, and the finished EID. Tree ids
//!   are `Copy` indices: holding one never extends an element's lifetime.
//!   Entries belong to a single document; a document stamp (the address of
//!   the tree's root node) detects a different document and clears them.
//! - **Selector-result LRU** keyed by selector string. The same selector
//!   recurs across targets during path disambiguation, so this tier is kept
//!   separate and bounded.
//!
//! The cache is a plain collaborator. The crate-level entry points fall back
//! to a thread-local process default when no handle is supplied.

use crate::anchor::AnchorOutcome;
use crate::types::{Eid, ElementSemantics};
use ahash::AHashMap;
use lru::LruCache;
use ego_tree::NodeId;
use scraper::{ElementRef, Node};
use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;

/// Default bound for the selector-result LRU.
pub const DEFAULT_SELECTOR_CACHE_SIZE: usize = 1000;

/// Shared memoization for one engine's generation and resolution calls.
///
/// Interior-mutable and deliberately not `Sync`: the core is single-threaded
/// and an engine instance assumes exclusive access to the document it is
/// inspecting during a call.
pub struct EngineCache {
    doc_stamp: Cell<Option<usize>>,
    anchors: RefCell<AHashMap<NodeId, AnchorOutcome>>,
    semantics: RefCell<AHashMap<NodeId, ElementSemantics>>,
    eids: RefCell<AHashMap<NodeId, Eid>>,
    selectors: RefCell<LruCache<String, Vec<NodeId>>>,
}

impl EngineCache {
    /// A cache with the default selector-LRU bound.
    pub fn new() -> Self {
        Self::with_selector_capacity(DEFAULT_SELECTOR_CACHE_SIZE)
    }

    /// A cache with a custom selector-LRU bound.
    pub fn with_selector_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            doc_stamp: Cell::new(None),
            anchors: RefCell::new(AHashMap::new()),
            semantics: RefCell::new(AHashMap::new()),
            eids: RefCell::new(AHashMap::new()),
            selectors: RefCell::new(LruCache::new(capacity)),
        }
    }

    /// Bind the cache to the document owning `el`, clearing every entry left
    /// over from a different document.
    pub fn touch_document(&self, el: ElementRef<'_>) {
        let stamp = document_stamp(el);
        if self.doc_stamp.get() != Some(stamp) {
            self.clear();
            self.doc_stamp.set(Some(stamp));
        }
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.anchors.borrow_mut().clear();
        self.semantics.borrow_mut().clear();
        self.eids.borrow_mut().clear();
        self.selectors.borrow_mut().clear();
        self.doc_stamp.set(None);
    }

    pub(crate) fn anchor(&self, id: NodeId) -> Option<AnchorOutcome> {
        self.anchors.borrow().get(&id).cloned()
    }

    pub(crate) fn store_anchor(&self, id: NodeId, outcome: AnchorOutcome) {
        self.anchors.borrow_mut().insert(id, outcome);
    }

    pub(crate) fn semantics(&self, id: NodeId) -> Option<ElementSemantics> {
        self.semantics.borrow().get(&id).cloned()
    }

    pub(crate) fn store_semantics(&self, id: NodeId, semantics: ElementSemantics) {
        self.semantics.borrow_mut().insert(id, semantics);
    }

    pub(crate) fn eid(&self, id: NodeId) -> Option<Eid> {
        self.eids.borrow().get(&id).cloned()
    }

    pub(crate) fn store_eid(&self, id: NodeId, eid: Eid) {
        self.eids.borrow_mut().insert(id, eid);
    }

    pub(crate) fn selector_result(&self, selector: &str) -> Option<Vec<NodeId>> {
        self.selectors.borrow_mut().get(selector).cloned()
    }

    pub(crate) fn store_selector_result(&self, selector: &str, ids: Vec<NodeId>) {
        self.selectors.borrow_mut().put(selector.to_string(), ids);
    }

    /// Number of memoized EIDs, for diagnostics.
    pub fn eid_entries(&self) -> usize {
        self.eids.borrow().len()
    }

    /// Number of cached selector results, for diagnostics.
    pub fn selector_entries(&self) -> usize {
        self.selectors.borrow().len()
    }
}

impl Default for EngineCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCache")
            .field("eids", &self.eids.borrow().len())
            .field("semantics", &self.semantics.borrow().len())
            .field("anchors", &self.anchors.borrow().len())
            .field("selectors", &self.selectors.borrow().len())
            .finish()
    }
}

/// Identity stamp of the document owning `el`: the address of the tree's
/// root node, stable for the document's lifetime.
pub(crate) fn document_stamp(el: ElementRef<'_>) -> usize {
    let mut node = *el;
    while let Some(parent) = node.parent() {
        node = parent;
    }
    node.value() as *const Node as usize
}

thread_local! {
    static PROCESS_CACHE: EngineCache = EngineCache::new();
}

/// Run `f` against the thread-local process-default cache.
pub fn with_process_cache<R>(f: impl FnOnce(&EngineCache) -> R) -> R {
    PROCESS_CACHE.with(|cache| f(cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, sel: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(sel).unwrap()).next().unwrap()
    }

    #[test]
    fn test_semantics_round_trip() {
        let doc = Html::parse_document("<div id='a'>x</div>");
        let el = first(&doc, "#a");
        let cache = EngineCache::new();
        cache.touch_document(el);

        assert!(cache.semantics(el.id()).is_none());
        cache.store_semantics(el.id(), ElementSemantics::default());
        assert_eq!(cache.semantics(el.id()), Some(ElementSemantics::default()));
    }

    #[test]
    fn test_document_switch_clears_entries() {
        let doc_a = Html::parse_document("<div id='a'>x</div>");
        let doc_b = Html::parse_document("<div id='b'>y</div>");
        let el_a = first(&doc_a, "#a");
        let el_b = first(&doc_b, "#b");

        let cache = EngineCache::new();
        cache.touch_document(el_a);
        cache.store_semantics(el_a.id(), ElementSemantics::default());
        cache.store_selector_result("div", vec![el_a.id()]);

        cache.touch_document(el_b);
        assert!(cache.semantics(el_a.id()).is_none());
        assert!(cache.selector_result("div").is_none());

        // Re-touching the same document keeps entries.
        cache.store_semantics(el_b.id(), ElementSemantics::default());
        cache.touch_document(el_b);
        assert!(cache.semantics(el_b.id()).is_some());
    }

    #[test]
    fn test_selector_lru_bound() {
        let cache = EngineCache::with_selector_capacity(2);
        let doc = Html::parse_document("<p>x</p>");
        let el = first(&doc, "p");
        cache.touch_document(el);

        cache.store_selector_result("a", vec![]);
        cache.store_selector_result("b", vec![]);
        cache.store_selector_result("c", vec![]);
        assert_eq!(cache.selector_entries(), 2);
        // "a" was the least recently used entry.
        assert!(cache.selector_result("a").is_none());
        assert!(cache.selector_result("c").is_some());
    }

    #[test]
    fn test_stamp_differs_between_documents() {
        let doc_a = Html::parse_document("<div>x</div>");
        let doc_b = Html::parse_document("<div>x</div>");
        let stamp_a = document_stamp(first(&doc_a, "div"));
        let stamp_b = document_stamp(first(&doc_b, "div"));
        assert_ne!(stamp_a, stamp_b);
    }
}
