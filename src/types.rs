//! Core type definitions for element identity descriptors
//!
//! This module defines the EID data model shared by the generator and the
//! resolver: node records, element semantics, constraints, fallback policy,
//! and metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current EID format version tag.
pub const EID_VERSION: &str = "1";

/// An Element Identity Descriptor: an immutable semantic fingerprint of a
/// document element.
///
/// An EID references no document state; it is pure data. It is produced by
/// [`crate::generate_eid`] and consumed by [`crate::resolve`] and
/// [`crate::build_selector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eid {
    /// Format version tag.
    pub version: String,
    /// The semantic root the identifier hangs from.
    pub anchor: AnchorNode,
    /// Filtered semantic ancestors strictly between anchor and target, in
    /// anchor-to-target order. May be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathNode>,
    /// The identified element.
    pub target: TargetNode,
    /// Post-filter constraints applied at resolution, in declining priority.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    /// What the resolver does on ambiguity or on zero candidates.
    pub fallback: FallbackPolicy,
    /// Generation metadata.
    pub meta: EidMeta,
}

impl Eid {
    /// Whether generation degraded anywhere (anchor or path).
    pub fn is_degraded(&self) -> bool {
        self.meta.degraded
    }
}

/// The anchor node of an EID: the closest strong-semantic ancestor chosen as
/// the identifier's root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorNode {
    /// Lowercased tag name.
    pub tag: String,
    /// Identity semantics recorded at generation time.
    pub semantics: ElementSemantics,
    /// Anchor quality in `[0, 1]`.
    pub score: f64,
    /// True when the anchor was selected under relaxed conditions
    /// (body sentinel, no candidate found).
    #[serde(default)]
    pub degraded: bool,
    /// 1-based position among the parent's element children. Absent only for
    /// parentless elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth_child: Option<u32>,
}

/// An intermediate node between anchor and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    /// Lowercased tag name.
    pub tag: String,
    /// Identity semantics recorded at generation time.
    pub semantics: ElementSemantics,
    /// Semantic richness in `[0, 1]`.
    pub score: f64,
    /// 1-based position among the parent's element children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth_child: Option<u32>,
}

/// The target node of an EID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetNode {
    /// Lowercased tag name, equal to the element's tag at generation time.
    pub tag: String,
    /// Identity semantics recorded at generation time.
    pub semantics: ElementSemantics,
    /// Semantic richness in `[0, 1]`.
    pub score: f64,
    /// 1-based position among the parent's element children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth_child: Option<u32>,
}

/// A borrowed, kind-erased view over [`AnchorNode`], [`PathNode`] and
/// [`TargetNode`]. The selector synthesizer and the SEQL stringifier operate
/// on this view so all three node kinds format identically.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    /// Lowercased tag name.
    pub tag: &'a str,
    /// Identity semantics.
    pub semantics: &'a ElementSemantics,
    /// 1-based nth-child, when recorded.
    pub nth_child: Option<u32>,
}

impl<'a> From<&'a AnchorNode> for NodeView<'a> {
    fn from(n: &'a AnchorNode) -> Self {
        NodeView {
            tag: &n.tag,
            semantics: &n.semantics,
            nth_child: n.nth_child,
        }
    }
}

impl<'a> From<&'a PathNode> for NodeView<'a> {
    fn from(n: &'a PathNode) -> Self {
        NodeView {
            tag: &n.tag,
            semantics: &n.semantics,
            nth_child: n.nth_child,
        }
    }
}

impl<'a> From<&'a TargetNode> for NodeView<'a> {
    fn from(n: &'a TargetNode) -> Self {
        NodeView {
            tag: &n.tag,
            semantics: &n.semantics,
            nth_child: n.nth_child,
        }
    }
}

/// Identity-only semantics of an element.
///
/// Everything state-dependent (utility classes, ARIA state attributes,
/// framework-generated ids) is filtered out before this record is built, so
/// two renderings of the same logical element produce equal semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSemantics {
    /// Stable element id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Semantic class names, utility classes removed, order preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Identity attributes in emission-priority order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
    /// ARIA role attribute, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Direct text content, for text-bearing tags only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    /// SVG shape fingerprint, for SVG elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<SvgFingerprint>,
}

impl ElementSemantics {
    /// True when nothing identifying was captured.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.role.is_none()
            && self.text.is_none()
            && self.svg.is_none()
    }
}

/// Raw and normalized text of an element, each capped at 100 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// Trimmed source text.
    pub raw: String,
    /// NFC-normalized, whitespace-collapsed form.
    pub normalized: String,
}

/// SVG shape kind, mapped from the element tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SvgShape {
    /// `<path>`
    Path,
    /// `<circle>`
    Circle,
    /// `<rect>`
    Rect,
    /// `<line>`
    Line,
    /// `<polyline>`
    Polyline,
    /// `<polygon>`
    Polygon,
    /// `<ellipse>`
    Ellipse,
    /// `<g>`
    G,
    /// `<text>`
    Text,
    /// `<use>`
    Use,
    /// `<svg>`
    Svg,
}

impl SvgShape {
    /// Map a lowercased SVG tag name to its shape kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "path" => SvgShape::Path,
            "circle" => SvgShape::Circle,
            "rect" => SvgShape::Rect,
            "line" => SvgShape::Line,
            "polyline" => SvgShape::Polyline,
            "polygon" => SvgShape::Polygon,
            "ellipse" => SvgShape::Ellipse,
            "g" => SvgShape::G,
            "text" => SvgShape::Text,
            "use" => SvgShape::Use,
            "svg" => SvgShape::Svg,
            _ => return None,
        })
    }

    /// The lowercased tag name for this shape.
    pub fn as_str(&self) -> &'static str {
        match self {
            SvgShape::Path => "path",
            SvgShape::Circle => "circle",
            SvgShape::Rect => "rect",
            SvgShape::Line => "line",
            SvgShape::Polyline => "polyline",
            SvgShape::Polygon => "polygon",
            SvgShape::Ellipse => "ellipse",
            SvgShape::G => "g",
            SvgShape::Text => "text",
            SvgShape::Use => "use",
            SvgShape::Svg => "svg",
        }
    }
}

/// Compact hash summary of an SVG shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgFingerprint {
    /// Shape kind.
    pub shape: SvgShape,
    /// 8-hex hash of the first five path commands, for `<path>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d_hash: Option<String>,
    /// 8-hex hash of a scale-independent geometry descriptor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geom_hash: Option<String>,
    /// ARIA role, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text of a `<title>` child, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_text: Option<String>,
    /// True when the shape carries SMIL children or an inline animation.
    pub has_animation: bool,
}

/// A post-filter rule applied by the resolver after semantic scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// The rule itself.
    #[serde(flatten)]
    pub kind: ConstraintKind,
    /// Application priority, 0..=100, highest first.
    pub priority: u8,
}

/// Constraint rule kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "kebab-case")]
pub enum ConstraintKind {
    /// Enforce a candidate-count policy.
    Uniqueness {
        /// How multiple survivors are handled.
        mode: UniquenessMode,
    },
    /// Keep candidates whose text is close to a reference string.
    TextProximity {
        /// Reference text to compare against.
        reference: String,
        /// Maximum Levenshtein distance allowed.
        max_distance: u32,
    },
    /// Deterministic positional tiebreak.
    Position {
        /// Which candidate wins.
        strategy: PositionStrategy,
    },
}

/// Policy for multiple surviving candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UniquenessMode {
    /// More than one candidate is a failure.
    Strict,
    /// Keep the single highest-scored candidate.
    BestScore,
    /// Multiple candidates are acceptable.
    AllowMultiple,
}

/// Positional tiebreak strategies.
///
/// Without a layout engine, `top-most` and `left-most` degrade to
/// `first-in-dom`; the resolver records a warning when that happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionStrategy {
    /// Candidate closest to the top of the viewport.
    TopMost,
    /// Candidate closest to the left edge.
    LeftMost,
    /// First candidate in document order.
    FirstInDom,
}

/// Degraded-resolution policy stored in the EID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackPolicy {
    /// What to do when several candidates survive all phases.
    pub on_multiple: UniquenessMode,
    /// What to do when no candidate survives the primary filter.
    pub on_missing: OnMissing,
    /// Depth bound honored by degraded strategies.
    pub max_depth: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            on_multiple: UniquenessMode::BestScore,
            on_missing: OnMissing::AnchorOnly,
            max_depth: 10,
        }
    }
}

/// Zero-candidate fallback strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnMissing {
    /// Re-run matching from anchor-only narrowing with a relaxed threshold.
    AnchorOnly,
    /// No fallback; zero candidates is an error.
    None,
}

/// Why generation degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradationReason {
    /// The anchor walk reached `body` without a candidate.
    BodyFallback,
    /// No anchor candidate and body fallback was disabled.
    AnchorNotFound,
    /// The ancestor chain hit the depth cap before meeting the anchor.
    PathDepthOverflow,
    /// The target is not a descendant of the recorded anchor.
    TargetNotDescendantOfAnchor,
}

impl DegradationReason {
    /// Kebab-case identifier, as surfaced in metadata and warnings.
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationReason::BodyFallback => "body-fallback",
            DegradationReason::AnchorNotFound => "anchor-not-found",
            DegradationReason::PathDepthOverflow => "path-depth-overflow",
            DegradationReason::TargetNotDescendantOfAnchor => {
                "target-not-descendant-of-anchor"
            }
        }
    }
}

/// Generation metadata attached to every EID.
///
/// Equality ignores `generated_at`: two generations of the same element in
/// the same document state are considered equal descriptors regardless of
/// when they ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EidMeta {
    /// Aggregate generation confidence in `[0, 1]`.
    pub confidence: f64,
    /// RFC 3339 timestamp of generation.
    pub generated_at: String,
    /// Generator identifier, e.g. `seql-rs/0.3.0`.
    pub generator: String,
    /// Optional caller-supplied provenance tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// True iff the anchor or the path degraded.
    #[serde(default)]
    pub degraded: bool,
    /// The dominant degradation reason, when degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation_reason: Option<DegradationReason>,
}

impl PartialEq for EidMeta {
    fn eq(&self, other: &Self) -> bool {
        self.confidence == other.confidence
            && self.generator == other.generator
            && self.source == other.source
            && self.degraded == other.degraded
            && self.degradation_reason == other.degradation_reason
    }
}

/// Result of a path construction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PathBuildResult {
    /// Kept intermediate nodes, anchor-to-target order.
    pub path: Vec<PathNode>,
    /// True when the chain overflowed or left the anchor's subtree.
    pub degraded: bool,
    /// Why the path degraded.
    pub degradation_reason: Option<DegradationReason>,
}
