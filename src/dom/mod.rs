// src/dom/mod.rs
//! Document abstraction the enrichment path runs against.
//!
//! A [`Document`] answers the handful of queries site adapters and the
//! scheduler need, and attaches badges. A [`MutationSource`] hands out
//! subscriptions to structural change batches.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::badge::Badge;

pub use memory::{ElementSpec, MemoryDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Positioning {
    #[default]
    Static,
    Relative,
    Absolute,
}

/// A title tile found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Node the title was read from.
    pub element: NodeId,
    pub title: String,
    /// Node the badge goes under.
    pub target: NodeId,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid selector {input:?}: {reason}")]
pub struct SelectorError {
    pub input: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    /// `[name]`
    Present(String),
    /// `[name*="needle"]`
    Contains(String, String),
}

impl AttrTest {
    fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (AttrTest::Present(_), Some(_)) => true,
            (AttrTest::Contains(_, needle), Some(v)) => v.contains(needle.as_str()),
            (_, None) => false,
        }
    }

    fn name(&self) -> &str {
        match self {
            AttrTest::Present(n) | AttrTest::Contains(n, _) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches<'a>(&self, tag: &str, classes: &[String], attr: &dyn Fn(&str) -> Option<&'a str>) -> bool {
        self.tag.as_deref().map_or(true, |t| t.eq_ignore_ascii_case(tag))
            && self.classes.iter().all(|c| classes.iter().any(|x| x == c))
            && self.attrs.iter().all(|a| a.matches(attr(a.name())))
    }
}

/// Comma-separated list of compound selectors:
/// `tag.class[attr][attr*="part"], .other`.
///
/// No combinators; descendant relations are expressed by the adapter rules
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

fn is_ident(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

/// Rest of `[name ...]` after the name: `]` or `*="needle"]`.
fn take_attr_test(
    name: String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Option<AttrTest> {
    match chars.next()? {
        ']' => Some(AttrTest::Present(name)),
        '*' => {
            if chars.next()? != '=' {
                return None;
            }
            let needle = match chars.peek().copied()? {
                quote @ ('"' | '\'') => {
                    chars.next();
                    let mut out = String::new();
                    loop {
                        let ch = chars.next()?;
                        if ch == quote {
                            break;
                        }
                        out.push(ch);
                    }
                    out
                }
                _ => take_ident(chars),
            };
            if needle.is_empty() || chars.next()? != ']' {
                return None;
            }
            Some(AttrTest::Contains(name, needle))
        }
        _ => None,
    }
}

fn take_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.peek() {
        if !is_ident(ch) {
            break;
        }
        out.push(ch);
        chars.next();
    }
    out
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let err = |reason: &str| SelectorError {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(err("empty selector"));
            }
            let mut c = Compound::default();
            let mut chars = part.chars().peekable();
            let tag = take_ident(&mut chars);
            if !tag.is_empty() {
                c.tag = Some(tag.to_ascii_lowercase());
            }
            while let Some(ch) = chars.next() {
                match ch {
                    '.' => {
                        let name = take_ident(&mut chars);
                        if name.is_empty() {
                            return Err(err("missing class name"));
                        }
                        c.classes.push(name);
                    }
                    '[' => {
                        let name = take_ident(&mut chars);
                        if name.is_empty() {
                            return Err(err("malformed attribute"));
                        }
                        let test = take_attr_test(name, &mut chars)
                            .ok_or_else(|| err("malformed attribute"))?;
                        c.attrs.push(test);
                    }
                    other => return Err(err(&format!("unexpected character {other:?}"))),
                }
            }
            alternatives.push(c);
        }
        Ok(Self {
            source: input.trim().to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// `attr` returns the element's value for an attribute name, if set.
    pub fn matches<'a>(
        &self,
        tag: &str,
        classes: &[String],
        attr: &dyn Fn(&str) -> Option<&'a str>,
    ) -> bool {
        self.alternatives
            .iter()
            .any(|c| c.matches(tag, classes, attr))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Selector::parse(&s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Read/attach surface of a live document.
pub trait Document: Send + Sync {
    /// Matching elements in document order.
    fn select_all(&self, selector: &Selector) -> Vec<NodeId>;
    /// First matching descendant of `node`.
    fn select_within(&self, node: NodeId, selector: &Selector) -> Option<NodeId>;
    /// `node` itself or its nearest matching ancestor.
    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn text_content(&self, node: NodeId) -> String;
    fn is_element(&self, node: NodeId) -> bool;
    /// Rendered width in px; 0 for hidden or detached nodes.
    fn rendered_width(&self, node: NodeId) -> f64;
    /// Badge marker present on `node` or below it.
    fn has_badge(&self, node: NodeId) -> bool;
    fn position(&self, node: NodeId) -> Positioning;
    fn set_position(&self, node: NodeId, position: Positioning);
    /// Check the marker and append in one step. False if a badge is already there.
    fn attach_badge(&self, target: NodeId, badge: Badge) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildAdded,
    ChildRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub parent: NodeId,
    pub node: NodeId,
    pub kind: MutationKind,
}

/// One burst of structural changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
    /// Batches the subscriber fell behind on and that were folded into this one.
    pub skipped: u64,
}

/// Live subscription. Dropping it unsubscribes.
pub struct MutationSubscription {
    rx: broadcast::Receiver<MutationBatch>,
}

impl MutationSubscription {
    pub fn new(rx: broadcast::Receiver<MutationBatch>) -> Self {
        Self { rx }
    }

    /// Next batch; `None` once the document is gone.
    pub async fn next(&mut self) -> Option<MutationBatch> {
        match self.rx.recv().await {
            Ok(batch) => Some(batch),
            Err(broadcast::error::RecvError::Lagged(n)) => Some(MutationBatch {
                records: Vec::new(),
                skipped: n,
            }),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

pub trait MutationSource: Send + Sync {
    fn subscribe(&self) -> MutationSubscription;
}
