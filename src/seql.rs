//! SEQL string form
//!
//! One-line textual serialization of an EID:
//!
//! ```text
//! v1: form[id="f"] :: div.glass-card > input[id="firstName",name="firstName"]#1
//! ```
//!
//! A node is `tag` + `.class…` + `[attr="val",…]` + optional `#N` where `N`
//! is the 1-based nth-child. Classes always precede attributes. The stable
//! id travels in the attribute block under the `id` key and is lifted back
//! out on parse. Scores, constraints, fallback policy, text, and SVG
//! fingerprints are not carried; they re-default deterministically when
//! parsing.

use crate::extract::semantic_score;
use crate::generate::confidence_score;
use crate::types::{
    AnchorNode, Eid, EidMeta, ElementSemantics, FallbackPolicy, NodeView, PathNode,
    TargetNode, EID_VERSION,
};
use crate::{Error, Result};
use indexmap::IndexMap;

/// Characters that must be backslash-escaped inside a SEQL identifier.
const IDENT_ESCAPES: &[char] = &['\\', '.', '[', ']', '#', '>', ',', '"', ' ', ':'];

/// Serialize an EID to its SEQL line.
pub fn to_seql(eid: &Eid) -> String {
    let mut out = format!("v{}: {}", eid.version, node_to_string((&eid.anchor).into()));
    out.push_str(" :: ");
    for node in &eid.path {
        out.push_str(&node_to_string(node.into()));
        out.push_str(" > ");
    }
    out.push_str(&node_to_string((&eid.target).into()));
    out
}

fn node_to_string(view: NodeView<'_>) -> String {
    let mut out = String::from(view.tag);
    for class in &view.semantics.classes {
        out.push('.');
        out.push_str(&escape_ident(class));
    }

    let mut attrs: Vec<(&str, &str)> = Vec::new();
    if let Some(id) = &view.semantics.id {
        attrs.push(("id", id));
    }
    for (name, value) in &view.semantics.attributes {
        attrs.push((name, value));
    }
    if !attrs.is_empty() {
        out.push('[');
        for (i, (name, value)) in attrs.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push_str("=\"");
            for c in value.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
        out.push(']');
    }

    if let Some(nth) = view.nth_child {
        out.push('#');
        out.push_str(&nth.to_string());
    }
    out
}

fn escape_ident(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if IDENT_ESCAPES.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Parse a SEQL line back into an EID.
///
/// Parsing is pure and deterministic: the derived scores are recomputed from
/// the parsed semantics and the metadata carries no timestamp.
pub fn parse_seql(input: &str) -> Result<Eid> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    parser.expect_char('v')?;
    let version = parser.take_while(|c| c != ':');
    if version.is_empty() {
        return parser.fail("expected a version tag after 'v'");
    }
    parser.expect_char(':')?;
    parser.skip_ws();

    let anchor_parsed = parser.parse_node()?;
    parser.skip_ws();
    parser.expect_str("::")?;
    parser.skip_ws();

    let mut nodes = vec![parser.parse_node()?];
    loop {
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        parser.expect_char('>')?;
        parser.skip_ws();
        nodes.push(parser.parse_node()?);
    }

    let target_parsed = nodes.pop().expect("at least one node after '::'");

    let anchor_score = semantic_score(&anchor_parsed.semantics);
    let anchor = AnchorNode {
        tag: anchor_parsed.tag,
        semantics: anchor_parsed.semantics,
        score: anchor_score,
        degraded: false,
        nth_child: anchor_parsed.nth_child,
    };

    let path: Vec<PathNode> = nodes
        .into_iter()
        .map(|node| {
            let score = semantic_score(&node.semantics);
            PathNode {
                tag: node.tag,
                semantics: node.semantics,
                score,
                nth_child: node.nth_child,
            }
        })
        .collect();

    let target_score = semantic_score(&target_parsed.semantics);
    let target = TargetNode {
        tag: target_parsed.tag,
        semantics: target_parsed.semantics,
        score: target_score,
        nth_child: target_parsed.nth_child,
    };

    let confidence = confidence_score(anchor.score, false, target_score, false);
    Ok(Eid {
        version,
        anchor,
        path,
        target,
        constraints: Vec::new(),
        fallback: FallbackPolicy::default(),
        meta: EidMeta {
            confidence,
            generated_at: String::new(),
            generator: format!("seql-rs/{}", env!("CARGO_PKG_VERSION")),
            source: None,
            degraded: false,
            degradation_reason: None,
        },
    })
}

struct ParsedNode {
    tag: String,
    semantics: ElementSemantics,
    nth_child: Option<u32>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Parser {
            chars: input.trim().chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                self.fail(&format!("expected '{expected}'"))
            }
        }
    }

    fn expect_str(&mut self, expected: &str) -> Result<()> {
        for c in expected.chars() {
            self.expect_char(c)?;
        }
        Ok(())
    }

    fn fail<T>(&self, reason: &str) -> Result<T> {
        Err(Error::SeqlParse {
            offset: self.pos,
            reason: reason.to_string(),
        })
    }

    fn parse_node(&mut self) -> Result<ParsedNode> {
        let tag = self.parse_ident()?;
        if tag.is_empty() {
            return self.fail("expected a tag name");
        }

        let mut classes = Vec::new();
        while self.peek() == Some('.') {
            self.bump();
            let class = self.parse_ident()?;
            if class.is_empty() {
                return self.fail("expected a class name after '.'");
            }
            classes.push(class);
        }

        let mut attributes: IndexMap<String, String> = IndexMap::new();
        if self.peek() == Some('[') {
            self.bump();
            loop {
                let name = self.take_while(|c| c != '=' && c != ']' && c != ',');
                if name.is_empty() {
                    return self.fail("expected an attribute name");
                }
                self.expect_char('=')?;
                let value = self.parse_quoted()?;
                attributes.insert(name.trim().to_string(), value);
                match self.bump() {
                    Some(',') => continue,
                    Some(']') => break,
                    _ => return self.fail("expected ',' or ']' in attribute block"),
                }
            }
        }

        let nth_child = if self.peek() == Some('#') {
            self.bump();
            let digits = self.take_while(|c| c.is_ascii_digit());
            let value: u32 = digits
                .parse()
                .map_err(|_| Error::SeqlParse {
                    offset: self.pos,
                    reason: "expected a 1-based index after '#'".to_string(),
                })?;
            if value == 0 {
                return self.fail("nth-child index is 1-based");
            }
            Some(value)
        } else {
            None
        };

        let id = attributes.shift_remove("id");
        let role = attributes.get("role").cloned();
        Ok(ParsedNode {
            tag,
            semantics: ElementSemantics {
                id,
                classes,
                attributes,
                role,
                text: None,
                svg: None,
            },
            nth_child,
        })
    }

    /// An identifier, stopping at structural delimiters; backslash escapes
    /// the next character.
    fn parse_ident(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => out.push(escaped),
                        None => return self.fail("dangling escape"),
                    }
                }
                '.' | '[' | ']' | '#' | '>' | ',' | ':' => break,
                c if c.is_whitespace() => break,
                c => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Ok(out)
    }

    fn parse_quoted(&mut self) -> Result<String> {
        self.expect_char('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some(escaped) => out.push(escaped),
                    None => return self.fail("unterminated string escape"),
                },
                Some(c) => out.push(c),
                None => return self.fail("unterminated quoted value"),
            }
        }
    }
}

/// A fresh descriptor's version matches the parser's expectations.
pub fn current_version() -> &'static str {
    EID_VERSION
}
