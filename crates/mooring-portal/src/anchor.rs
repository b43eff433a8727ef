#![forbid(unsafe_code)]

//! Anchor specifications and their resolution to a live node.

use std::fmt;
use std::rc::Rc;

use mooring_dom::{Document, NodeId};
use tracing::debug;

use crate::error::AnchorFault;
use crate::refs::NodeSlot;

/// Caller-supplied anchor lookup. Returning `Ok(None)` means "not there
/// yet"; returning `Err` is a fault in the caller's own logic.
pub type AnchorFactory = Rc<dyn Fn(&Document) -> Result<Option<NodeId>, AnchorFault>>;

/// Where the anchor comes from. Re-evaluated on every resolution cycle.
#[derive(Clone, Default)]
pub enum AnchorSpec {
    /// No anchor; the portal never attaches.
    #[default]
    None,
    /// First element in the document matching a CSS selector.
    Selector(String),
    /// Whatever the factory returns.
    Factory(AnchorFactory),
    /// This node, as-is.
    Node(NodeId),
    /// The current value of a shared cell, which may be unset.
    Handle(NodeSlot),
}

impl AnchorSpec {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn factory(
        f: impl Fn(&Document) -> Result<Option<NodeId>, AnchorFault> + 'static,
    ) -> Self {
        Self::Factory(Rc::new(f))
    }

    /// Short label for tracing fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Selector(_) => "selector",
            Self::Factory(_) => "factory",
            Self::Node(_) => "node",
            Self::Handle(_) => "handle",
        }
    }
}

impl From<&str> for AnchorSpec {
    fn from(selector: &str) -> Self {
        Self::Selector(selector.to_string())
    }
}

impl From<String> for AnchorSpec {
    fn from(selector: String) -> Self {
        Self::Selector(selector)
    }
}

impl From<NodeId> for AnchorSpec {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl From<Option<NodeId>> for AnchorSpec {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Self::None, Self::Node)
    }
}

impl From<NodeSlot> for AnchorSpec {
    fn from(slot: NodeSlot) -> Self {
        Self::Handle(slot)
    }
}

impl fmt::Debug for AnchorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Selector(s) => f.debug_tuple("Selector").field(s).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Node(n) => f.debug_tuple("Node").field(n).finish(),
            Self::Handle(slot) => f.debug_tuple("Handle").field(slot).finish(),
        }
    }
}

/// Resolve an anchor specification to a node.
///
/// Invalid selector syntax resolves to `Ok(None)`. A factory fault is
/// returned unchanged.
pub fn resolve_anchor(doc: &Document, spec: &AnchorSpec) -> Result<Option<NodeId>, AnchorFault> {
    match spec {
        AnchorSpec::None => Ok(None),
        AnchorSpec::Selector(selector) => match doc.query_selector(selector) {
            Ok(found) => Ok(found),
            Err(err) => {
                debug!(selector = %selector, error = %err, "invalid anchor selector");
                Ok(None)
            }
        },
        AnchorSpec::Factory(factory) => factory(doc),
        AnchorSpec::Node(node) => Ok(Some(*node)),
        AnchorSpec::Handle(slot) => Ok(slot.current()),
    }
}
