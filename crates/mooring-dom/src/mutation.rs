#![forbid(unsafe_code)]

//! Structural mutation records and observer handles.
//!
//! # Delivery model
//!
//! Every child-list change on a [`Document`](crate::Document) produces one
//! [`MutationRecord`]. Records are queued on each interested observer and
//! are **not** delivered synchronously: they wait for the next
//! [`Document::flush_mutations`](crate::Document::flush_mutations)
//! checkpoint, which plays the role of the browser's microtask checkpoint.
//!
//! # Invariants
//!
//! 1. An observer sees records in the order the mutations happened.
//! 2. Interest is decided when the mutation happens, against the tree as it
//!    was at that moment.
//! 3. A disconnected (or dropped) observer is never invoked again and its
//!    queued records are discarded.
//!
//! # Failure Modes
//!
//! - **Observer feedback loop**: a callback that mutates the observed
//!   subtree on every delivery never reaches quiescence. The checkpoint
//!   stops after a bounded number of rounds and leaves the rest queued.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::document::DocInner;
use crate::node::NodeId;

bitflags! {
    /// What an observer wants to hear about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        /// Child additions and removals.
        const CHILD_LIST = 0b01;
        /// Extend observation from the root to all its descendants.
        const SUBTREE = 0b10;
    }
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self::CHILD_LIST | Self::SUBTREE
    }
}

/// One child-list change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// The parent whose children changed.
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    /// Sibling before the changed position, at the time of the change.
    pub previous_sibling: Option<NodeId>,
    /// Sibling after the changed position, at the time of the change.
    pub next_sibling: Option<NodeId>,
}

impl MutationRecord {
    /// Added then removed nodes.
    pub fn changed_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.added_nodes
            .iter()
            .chain(self.removed_nodes.iter())
            .copied()
    }
}

/// Identity of a registered observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

pub(crate) type MutationCallback = dyn Fn(&[MutationRecord]);

/// Registration kept by the document. The callback is held weakly; the
/// strong reference lives in the [`MutationObserver`] handle.
pub(crate) struct ObserverEntry {
    pub(crate) id: ObserverId,
    pub(crate) root: NodeId,
    pub(crate) options: ObserveOptions,
    pub(crate) callback: Weak<MutationCallback>,
    pub(crate) pending: Vec<MutationRecord>,
}

impl ObserverEntry {
    pub(crate) fn is_live(&self) -> bool {
        self.callback.strong_count() > 0
    }
}

/// RAII handle for a registered observer.
///
/// Dropping the handle disconnects the observer.
pub struct MutationObserver {
    id: ObserverId,
    root: NodeId,
    doc: Weak<RefCell<DocInner>>,
    _callback: Rc<MutationCallback>,
}

impl MutationObserver {
    pub(crate) fn new(
        id: ObserverId,
        root: NodeId,
        doc: Weak<RefCell<DocInner>>,
        callback: Rc<MutationCallback>,
    ) -> Self {
        Self {
            id,
            root,
            doc,
            _callback: callback,
        }
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The node this observer was registered on.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Whether the document still delivers to this observer.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.doc
            .upgrade()
            .is_some_and(|doc| doc.borrow().has_observer(self.id))
    }

    /// Stop delivery and discard queued records. Idempotent.
    pub fn disconnect(&self) {
        if let Some(doc) = self.doc.upgrade()
            && let Ok(mut inner) = doc.try_borrow_mut()
        {
            inner.remove_observer(self.id);
        }
    }

    /// Drain queued records without invoking the callback.
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.doc
            .upgrade()
            .map(|doc| doc.borrow_mut().take_pending(self.id))
            .unwrap_or_default()
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("id", &self.id)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Drop for MutationObserver {
    fn drop(&mut self) {
        // If the document is borrowed right now, the dead weak callback is
        // pruned on the next checkpoint instead.
        self.disconnect();
    }
}
