// src/dom/memory.rs
//! In-process document tree. Every structural change publishes one
//! [`MutationBatch`], including badge insertion.

use std::collections::BTreeMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{
    Document, MutationBatch, MutationKind, MutationRecord, MutationSource, MutationSubscription,
    NodeId, Positioning, Selector,
};
use crate::badge::{Badge, CONTAINER_CLASS, TITLE_ATTR};

const CHANNEL_CAPACITY: usize = 256;

/// Element to insert.
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    width: f64,
    position: Positioning,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.classes.extend(class.split_whitespace().map(str::to_string));
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn width(mut self, px: f64) -> Self {
        self.width = px;
        self
    }

    pub fn position(mut self, position: Positioning) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug)]
struct ElementData {
    spec: ElementSpec,
    badge: Option<Badge>,
}

#[derive(Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.get(id)?.kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.element(id).is_some_and(|e| {
            selector.matches(&e.spec.tag, &e.spec.classes, &|a: &str| {
                e.spec.attrs.get(a).map(String::as_str)
            })
        })
    }

    /// Preorder walk below `id` (excluding `id`).
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .get(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(node) = self.get(n) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn is_connected(&self, mut id: NodeId) -> bool {
        loop {
            if id == MemoryDocument::ROOT {
                return true;
            }
            match self.get(id).and_then(|n| n.parent) {
                Some(p) => id = p,
                None => return false,
            }
        }
    }

    fn has_container(&self, id: NodeId) -> bool {
        let is_container = |n: NodeId| {
            self.element(n)
                .is_some_and(|e| e.spec.classes.iter().any(|c| c == CONTAINER_CLASS))
        };
        is_container(id) || self.descendants(id).into_iter().any(is_container)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.element(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        Some(id)
    }
}

/// Document tree held in memory, rooted at a `body` element.
pub struct MemoryDocument {
    tree: Mutex<Tree>,
    tx: broadcast::Sender<MutationBatch>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element(ElementData {
                spec: ElementSpec::new("body"),
                badge: None,
            }),
        };
        Self {
            tree: Mutex::new(Tree { nodes: vec![root] }),
            tx,
        }
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    fn publish(&self, record: MutationRecord) {
        // No subscribers is fine.
        let _ = self.tx.send(MutationBatch {
            records: vec![record],
            skipped: 0,
        });
    }

    /// Append an element under `parent`. `None` if `parent` is not an element.
    pub fn append_element(&self, parent: NodeId, spec: ElementSpec) -> Option<NodeId> {
        let id = {
            let mut t = self.tree.lock().expect("document mutex poisoned");
            t.push(parent, NodeKind::Element(ElementData { spec, badge: None }))?
        };
        self.publish(MutationRecord {
            parent,
            node: id,
            kind: MutationKind::ChildAdded,
        });
        Some(id)
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> Option<NodeId> {
        let id = {
            let mut t = self.tree.lock().expect("document mutex poisoned");
            t.push(parent, NodeKind::Text(text.to_string()))?
        };
        self.publish(MutationRecord {
            parent,
            node: id,
            kind: MutationKind::ChildAdded,
        });
        Some(id)
    }

    /// Detach `node` (and its subtree) from the document.
    pub fn remove(&self, node: NodeId) -> bool {
        let parent = {
            let mut t = self.tree.lock().expect("document mutex poisoned");
            let Some(parent) = t.get(node).and_then(|n| n.parent) else {
                return false;
            };
            t.nodes[parent.0].children.retain(|c| *c != node);
            t.nodes[node.0].parent = None;
            parent
        };
        self.publish(MutationRecord {
            parent,
            node,
            kind: MutationKind::ChildRemoved,
        });
        true
    }

    pub fn set_width(&self, node: NodeId, px: f64) {
        let mut t = self.tree.lock().expect("document mutex poisoned");
        if let Some(e) = t.element_mut(node) {
            e.spec.width = px;
        }
    }

    /// Badge attached under `target`, if any.
    pub fn badge(&self, target: NodeId) -> Option<Badge> {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.descendants(target)
            .into_iter()
            .find_map(|n| t.element(n).and_then(|e| e.badge.clone()))
    }

    /// Number of badges currently in the document.
    pub fn badge_count(&self) -> usize {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.descendants(Self::ROOT)
            .into_iter()
            .filter(|n| t.element(*n).is_some_and(|e| e.badge.is_some()))
            .count()
    }
}

impl Document for MemoryDocument {
    fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.descendants(Self::ROOT)
            .into_iter()
            .filter(|n| t.matches(*n, selector))
            .collect()
    }

    fn select_within(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.descendants(node)
            .into_iter()
            .find(|n| t.matches(*n, selector))
    }

    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let t = self.tree.lock().expect("document mutex poisoned");
        let mut cur = Some(node);
        while let Some(n) = cur {
            if t.matches(n, selector) {
                return Some(n);
            }
            cur = t.get(n).and_then(|x| x.parent);
        }
        None
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.get(node).and_then(|n| n.parent)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.element(node).and_then(|e| e.spec.attrs.get(name).cloned())
    }

    fn text_content(&self, node: NodeId) -> String {
        let t = self.tree.lock().expect("document mutex poisoned");
        let mut out = String::new();
        let own = std::iter::once(node).chain(t.descendants(node));
        for n in own {
            if let Some(Node {
                kind: NodeKind::Text(s),
                ..
            }) = t.get(n)
            {
                out.push_str(s);
            }
        }
        out
    }

    fn is_element(&self, node: NodeId) -> bool {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.element(node).is_some()
    }

    fn rendered_width(&self, node: NodeId) -> f64 {
        let t = self.tree.lock().expect("document mutex poisoned");
        if !t.is_connected(node) {
            return 0.0;
        }
        t.element(node).map(|e| e.spec.width).unwrap_or(0.0)
    }

    fn has_badge(&self, node: NodeId) -> bool {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.has_container(node)
    }

    fn position(&self, node: NodeId) -> Positioning {
        let t = self.tree.lock().expect("document mutex poisoned");
        t.element(node).map(|e| e.spec.position).unwrap_or_default()
    }

    fn set_position(&self, node: NodeId, position: Positioning) {
        let mut t = self.tree.lock().expect("document mutex poisoned");
        if let Some(e) = t.element_mut(node) {
            e.spec.position = position;
        }
    }

    fn attach_badge(&self, target: NodeId, badge: Badge) -> bool {
        let id = {
            let mut t = self.tree.lock().expect("document mutex poisoned");
            if t.element(target).is_none() || t.has_container(target) {
                return false;
            }
            let spec = ElementSpec::new("div")
                .class(CONTAINER_CLASS)
                .attr(TITLE_ATTR, &badge.title)
                .position(Positioning::Absolute);
            match t.push(
                target,
                NodeKind::Element(ElementData {
                    spec,
                    badge: Some(badge),
                }),
            ) {
                Some(id) => id,
                None => return false,
            }
        };
        self.publish(MutationRecord {
            parent: target,
            node: id,
            kind: MutationKind::ChildAdded,
        });
        true
    }
}

impl MutationSource for MemoryDocument {
    fn subscribe(&self) -> MutationSubscription {
        MutationSubscription::new(self.tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    fn badge(title: &str) -> Badge {
        Badge {
            title: title.to_string(),
            gap_px: 1.0,
            indicators: Vec::new(),
        }
    }

    #[test]
    fn queries_follow_document_order() {
        let doc = MemoryDocument::new();
        let row = doc.append_element(doc.root(), ElementSpec::new("div").class("row")).unwrap();
        let a = doc.append_element(row, ElementSpec::new("div").class("tile")).unwrap();
        let b = doc.append_element(row, ElementSpec::new("div").class("tile")).unwrap();
        let span = doc.append_element(a, ElementSpec::new("span").class("name")).unwrap();
        doc.append_text(span, "Dune").unwrap();

        assert_eq!(doc.select_all(&sel(".tile")), vec![a, b]);
        assert_eq!(doc.select_within(a, &sel(".name")), Some(span));
        assert_eq!(doc.select_within(b, &sel(".name")), None);
        assert_eq!(doc.closest(span, &sel(".row")), Some(row));
        assert_eq!(doc.text_content(a), "Dune");
        assert!(doc.is_element(a));
        assert!(!doc.is_element(NodeId(999)));
    }

    #[test]
    fn attach_is_once_per_target() {
        let doc = MemoryDocument::new();
        let tile = doc
            .append_element(doc.root(), ElementSpec::new("div").width(200.0))
            .unwrap();
        assert!(!doc.has_badge(tile));
        assert!(doc.attach_badge(tile, badge("A")));
        assert!(doc.has_badge(tile));
        assert!(!doc.attach_badge(tile, badge("A")));
        assert_eq!(doc.badge_count(), 1);
        assert_eq!(doc.badge(tile).map(|b| b.title), Some("A".to_string()));
        // marker is visible from ancestors too
        assert!(doc.has_badge(doc.root()));
    }

    #[test]
    fn removed_nodes_have_no_width() {
        let doc = MemoryDocument::new();
        let tile = doc
            .append_element(doc.root(), ElementSpec::new("div").width(120.0))
            .unwrap();
        assert_eq!(doc.rendered_width(tile), 120.0);
        assert!(doc.remove(tile));
        assert_eq!(doc.rendered_width(tile), 0.0);
        assert!(doc.select_all(&sel("div")).is_empty());
    }

    #[tokio::test]
    async fn structural_changes_are_published() {
        let doc = MemoryDocument::new();
        let mut sub = doc.subscribe();
        let tile = doc.append_element(doc.root(), ElementSpec::new("div")).unwrap();
        doc.attach_badge(tile, badge("X"));

        let first = sub.next().await.unwrap();
        assert_eq!(first.records[0].node, tile);
        assert_eq!(first.records[0].kind, MutationKind::ChildAdded);
        let second = sub.next().await.unwrap();
        assert_eq!(second.records[0].parent, tile);
    }
}
