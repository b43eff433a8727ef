#![forbid(unsafe_code)]

//! The document tree.
//!
//! # Design
//!
//! [`Document`] is a cheap-clone handle over shared, reference-counted
//! storage (`Rc<RefCell<..>>`), the same way an observable value is shared
//! between its owner and its subscribers. All clones see the same tree.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Removal only
//! detaches, so ids stay valid and a detached subtree can be moved back in.
//!
//! # Re-entrancy
//!
//! Observer callbacks run with no borrow held, so they may freely query
//! and mutate the document. Mutations made from a callback are delivered
//! in the next round of the same checkpoint.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, debug_span, trace, warn};
use web_time::Instant;

use crate::error::{DomError, SelectorError};
use crate::mutation::{
    MutationCallback, MutationObserver, MutationRecord, ObserveOptions, ObserverEntry, ObserverId,
};
use crate::node::{AdjacentPosition, ElementData, NodeId, NodeKind};
use crate::selector::{ElementTree, SelectorList};

/// Upper bound on delivery rounds within one checkpoint.
pub const MAX_DELIVERY_ROUNDS: usize = 64;

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub(crate) struct DocInner {
    nodes: Vec<NodeData>,
    body: NodeId,
    observers: Vec<ObserverEntry>,
    next_observer: u64,
}

type ReadyBatch = (ObserverId, Rc<MutationCallback>, Vec<MutationRecord>);

impl DocInner {
    fn new() -> Self {
        let mut inner = Self {
            nodes: vec![NodeData {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            body: NodeId::ROOT,
            observers: Vec::new(),
            next_observer: 1,
        };
        let html = inner.alloc(NodeKind::Element(ElementData::new("html")));
        let body = inner.alloc(NodeKind::Element(ElementData::new("body")));
        inner.link(NodeId::ROOT, html, 0);
        inner.link(html, body, 0);
        inner.body = body;
        inner
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId::from_raw((self.nodes.len() - 1) as u32)
    }

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.index())
    }

    fn check(&self, id: NodeId) -> Result<(), DomError> {
        match self.get(id) {
            Some(_) => Ok(()),
            None => Err(DomError::UnknownNode(id)),
        }
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    fn index_in_parent(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&c| c == id)?;
        Some((parent, index))
    }

    fn sibling(&self, id: NodeId, offset: isize) -> Option<NodeId> {
        let (parent, index) = self.index_in_parent(id)?;
        let target = index.checked_add_signed(offset)?;
        self.children(parent).get(target).copied()
    }

    /// Inclusive: a node contains itself.
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn link(&mut self, parent: NodeId, node: NodeId, index: usize) {
        self.nodes[parent.index()].children.insert(index, node);
        self.nodes[node.index()].parent = Some(parent);
    }

    /// Detach `node` from its parent, queuing a removal record.
    fn detach(&mut self, node: NodeId) -> bool {
        let Some((parent, index)) = self.index_in_parent(node) else {
            return false;
        };
        let previous_sibling = index
            .checked_sub(1)
            .map(|i| self.nodes[parent.index()].children[i]);
        let next_sibling = self.children(parent).get(index + 1).copied();
        self.nodes[parent.index()].children.remove(index);
        self.nodes[node.index()].parent = None;
        self.queue(MutationRecord {
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
            previous_sibling,
            next_sibling,
        });
        true
    }

    /// Insert `node` under `parent` before `reference` (or last), queuing
    /// records for the detach (if any) and the insertion.
    fn insert(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.check(parent)?;
        self.check(node)?;
        if node == NodeId::ROOT
            || !self.nodes[parent.index()].kind.accepts_children()
            || self.contains(node, parent)
        {
            return Err(DomError::HierarchyRequest { parent, node });
        }
        let mut reference = reference;
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotAChild { parent, child: r });
            }
            if r == node {
                reference = self.sibling(node, 1);
            }
        }

        self.detach(node);
        let index = match reference {
            Some(r) => self
                .children(parent)
                .iter()
                .position(|&c| c == r)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        self.link(parent, node, index);
        let previous_sibling = index
            .checked_sub(1)
            .map(|i| self.nodes[parent.index()].children[i]);
        let next_sibling = self.children(parent).get(index + 1).copied();
        self.queue(MutationRecord {
            target: parent,
            added_nodes: vec![node],
            removed_nodes: Vec::new(),
            previous_sibling,
            next_sibling,
        });
        Ok(())
    }

    fn queue(&mut self, record: MutationRecord) {
        trace!(
            target_node = %record.target,
            added = record.added_nodes.len(),
            removed = record.removed_nodes.len(),
            "mutation recorded"
        );
        let interested: Vec<usize> = self
            .observers
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.is_live()
                    && entry.options.contains(ObserveOptions::CHILD_LIST)
                    && (entry.root == record.target
                        || (entry.options.contains(ObserveOptions::SUBTREE)
                            && self.contains(entry.root, record.target)))
            })
            .map(|(i, _)| i)
            .collect();
        for i in interested {
            self.observers[i].pending.push(record.clone());
        }
    }

    fn register(
        &mut self,
        root: NodeId,
        options: ObserveOptions,
        callback: &Rc<MutationCallback>,
    ) -> ObserverId {
        let id = ObserverId::new(self.next_observer);
        self.next_observer += 1;
        self.observers.push(ObserverEntry {
            id,
            root,
            options,
            callback: Rc::downgrade(callback),
            pending: Vec::new(),
        });
        id
    }

    pub(crate) fn has_observer(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|e| e.id == id && e.is_live())
    }

    pub(crate) fn remove_observer(&mut self, id: ObserverId) {
        self.observers.retain(|e| e.id != id);
    }

    pub(crate) fn take_pending(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| std::mem::take(&mut e.pending))
            .unwrap_or_default()
    }

    fn has_pending(&self) -> bool {
        self.observers
            .iter()
            .any(|e| e.is_live() && !e.pending.is_empty())
    }

    /// Prune dead observers and drain every non-empty queue.
    fn take_ready(&mut self) -> Vec<ReadyBatch> {
        self.observers.retain(ObserverEntry::is_live);
        self.observers
            .iter_mut()
            .filter(|e| !e.pending.is_empty())
            .filter_map(|e| {
                let callback = e.callback.upgrade()?;
                Some((e.id, callback, std::mem::take(&mut e.pending)))
            })
            .collect()
    }
}

impl ElementTree for DocInner {
    fn element(&self, node: NodeId) -> Option<&ElementData> {
        self.get(node).and_then(|n| n.kind.as_element())
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }
}

/// Shared handle to a document tree.
///
/// Cloning a `Document` creates a new handle to the **same** tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocInner>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("observers", &inner.observers.len())
            .finish()
    }
}

impl Document {
    /// A document containing `<html><body></body></html>`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocInner::new())),
        }
    }

    /// Whether both handles refer to the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    #[must_use]
    pub fn body(&self) -> NodeId {
        self.inner.borrow().body
    }

    // ── construction ────────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .alloc(NodeKind::Element(ElementData::new(tag)))
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .alloc(NodeKind::Text(text.to_string()))
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        match inner.nodes.get_mut(node.index()).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => {
                el.set_attribute(name, value);
                Ok(())
            }
            Some(_) => Err(DomError::NotAnElement(node)),
            None => Err(DomError::UnknownNode(node)),
        }
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<bool, DomError> {
        let mut inner = self.inner.borrow_mut();
        match inner.nodes.get_mut(node.index()).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Ok(el.remove_attribute(name)),
            Some(_) => Err(DomError::NotAnElement(node)),
            None => Err(DomError::UnknownNode(node)),
        }
    }

    // ── queries ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn exists(&self, node: NodeId) -> bool {
        self.inner.borrow().get(node).is_some()
    }

    #[must_use]
    pub fn is_element(&self, node: NodeId) -> bool {
        self.inner.borrow().element(node).is_some()
    }

    #[must_use]
    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.inner
            .borrow()
            .element(node)
            .map(|el| el.tag().to_string())
    }

    #[must_use]
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .element(node)
            .and_then(|el| el.attribute(name))
            .map(str::to_string)
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().parent(node)
    }

    /// The parent if it is an element; `None` under the document root.
    #[must_use]
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        let inner = self.inner.borrow();
        inner
            .parent(node)
            .filter(|&p| inner.element(p).is_some())
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.borrow().children(node).to_vec()
    }

    /// Children that are elements (text nodes skipped).
    #[must_use]
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        inner
            .children(node)
            .iter()
            .copied()
            .filter(|&c| inner.element(c).is_some())
            .collect()
    }

    #[must_use]
    pub fn child_count(&self, node: NodeId) -> usize {
        self.inner.borrow().children(node).len()
    }

    #[must_use]
    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().children(node).first().copied()
    }

    #[must_use]
    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().children(node).last().copied()
    }

    #[must_use]
    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().sibling(node, -1)
    }

    #[must_use]
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().sibling(node, 1)
    }

    /// Inclusive containment: `contains(a, a)` is true.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.borrow().contains(ancestor, node)
    }

    /// Whether the node is reachable from the document root.
    #[must_use]
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(NodeId::ROOT, node)
    }

    /// Concatenated text of all descendant text nodes, in tree order.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(data) = inner.get(id) else { continue };
            if let NodeKind::Text(text) = &data.kind {
                out.push_str(text);
            }
            stack.extend(data.children.iter().rev());
        }
        out
    }

    // ── selectors ───────────────────────────────────────────────────────

    /// First element in document order matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list, true).into_iter().next())
    }

    /// All elements in document order matching `selector`.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let list = SelectorList::parse(selector)?;
        Ok(self.select(&list, false))
    }

    #[must_use]
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let inner = self.inner.borrow();
        preorder(&inner, NodeId::ROOT)
            .into_iter()
            .find(|&n| inner.element(n).and_then(ElementData::id) == Some(id))
    }

    fn select(&self, list: &SelectorList, first_only: bool) -> Vec<NodeId> {
        let inner = self.inner.borrow();
        let mut found = Vec::new();
        for node in preorder(&inner, NodeId::ROOT) {
            if list.matches(&*inner, node) {
                found.push(node);
                if first_only {
                    break;
                }
            }
        }
        found
    }

    // ── mutation ────────────────────────────────────────────────────────

    /// Insert `node` as the last child of `parent`, moving it if attached.
    pub fn append_child(&self, parent: NodeId, node: NodeId) -> Result<(), DomError> {
        self.inner.borrow_mut().insert(parent, node, None)
    }

    /// Insert `node` under `parent` before `reference`, or last when `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.inner.borrow_mut().insert(parent, node, reference)
    }

    /// Detach `node` from its parent. Returns `false` if it had none.
    pub fn remove(&self, node: NodeId) -> Result<bool, DomError> {
        let mut inner = self.inner.borrow_mut();
        inner.check(node)?;
        Ok(inner.detach(node))
    }

    /// Insert `node` relative to `target`.
    ///
    /// Sibling modes on a parentless target do nothing and return
    /// `Ok(false)`; otherwise the node is inserted and `Ok(true)` returned.
    pub fn insert_adjacent(
        &self,
        target: NodeId,
        position: AdjacentPosition,
        node: NodeId,
    ) -> Result<bool, DomError> {
        let mut inner = self.inner.borrow_mut();
        inner.check(target)?;
        match position {
            AdjacentPosition::BeforeBegin => {
                let Some(parent) = inner.parent(target) else {
                    return Ok(false);
                };
                inner.insert(parent, node, Some(target))?;
            }
            AdjacentPosition::AfterBegin => {
                let first = inner.children(target).first().copied();
                inner.insert(target, node, first)?;
            }
            AdjacentPosition::BeforeEnd => inner.insert(target, node, None)?,
            AdjacentPosition::AfterEnd => {
                let Some(parent) = inner.parent(target) else {
                    return Ok(false);
                };
                let next = inner.sibling(target, 1);
                inner.insert(parent, node, next)?;
            }
        }
        Ok(true)
    }

    // ── observation ─────────────────────────────────────────────────────

    /// Register an observer on `root`. Records are delivered at the next
    /// [`flush_mutations`](Self::flush_mutations).
    pub fn observe(
        &self,
        root: NodeId,
        options: ObserveOptions,
        callback: impl Fn(&[MutationRecord]) + 'static,
    ) -> MutationObserver {
        let callback: Rc<MutationCallback> = Rc::new(callback);
        let id = self.inner.borrow_mut().register(root, options, &callback);
        debug!(observer = %id, root = %root, "observer registered");
        MutationObserver::new(id, root, Rc::downgrade(&self.inner), callback)
    }

    /// Whether any live observer has undelivered records.
    #[must_use]
    pub fn has_pending_mutations(&self) -> bool {
        self.inner.borrow().has_pending()
    }

    /// Deliver queued records to their observers.
    ///
    /// Runs rounds until no observer has pending records, or until
    /// [`MAX_DELIVERY_ROUNDS`] is reached. Returns the number of batches
    /// delivered.
    pub fn flush_mutations(&self) -> usize {
        let start = Instant::now();
        let _span = debug_span!(
            "mooring.mutations.flush",
            rounds = tracing::field::Empty,
            batches = tracing::field::Empty,
            duration_us = tracing::field::Empty
        )
        .entered();

        let mut rounds = 0usize;
        let mut batches = 0usize;
        loop {
            if rounds == MAX_DELIVERY_ROUNDS {
                if self.has_pending_mutations() {
                    warn!(
                        rounds,
                        "mutation delivery did not settle; leaving records queued"
                    );
                }
                break;
            }
            let ready = self.inner.borrow_mut().take_ready();
            if ready.is_empty() {
                break;
            }
            rounds += 1;
            for (id, callback, records) in ready {
                // An earlier callback in this round may have disconnected it.
                if !self.inner.borrow().has_observer(id) {
                    continue;
                }
                callback(&records);
                batches += 1;
            }
        }

        let span = tracing::Span::current();
        span.record("rounds", rounds as u64);
        span.record("batches", batches as u64);
        span.record("duration_us", start.elapsed().as_micros() as u64);
        batches
    }
}

fn preorder(inner: &DocInner, from: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![from];
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(inner.children(id).iter().rev());
    }
    out
}
