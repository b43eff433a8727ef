#![forbid(unsafe_code)]

//! Position policy and insertion-parent derivation.

use std::fmt;

use mooring_dom::{AdjacentPosition, Document, NodeId};

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorSpec, resolve_anchor};
use crate::error::AnchorFault;

/// Where content goes relative to its anchor.
///
/// `First`/`Last` place it inside the anchor at an edge; `Before`/`After`
/// make it a sibling of the anchor in the anchor's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(rename_all = "lowercase"))]
pub enum Position {
    First,
    #[default]
    Last,
    Before,
    After,
}

impl Position {
    pub const ALL: [Position; 4] = [Self::First, Self::Last, Self::Before, Self::After];

    /// The insert-adjacent mode that realizes this position on the anchor.
    #[must_use]
    pub const fn adjacent(self) -> AdjacentPosition {
        match self {
            Self::Before => AdjacentPosition::BeforeBegin,
            Self::First => AdjacentPosition::AfterBegin,
            Self::Last => AdjacentPosition::BeforeEnd,
            Self::After => AdjacentPosition::AfterEnd,
        }
    }

    /// Whether the content becomes a sibling of the anchor.
    #[must_use]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Self::Before | Self::After)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Last => "last",
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The insertion parent for `anchor` under `position`.
///
/// `None` when there is no anchor, or when a sibling position is asked of
/// an anchor without a parent element.
pub fn resolve_container(doc: &Document, anchor: Option<NodeId>, position: Position) -> Option<NodeId> {
    let anchor = anchor?;
    if position.is_sibling() {
        doc.parent_element(anchor)
    } else {
        Some(anchor)
    }
}

/// An anchor and the container derived from it.
///
/// `container` is never set without `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedPair {
    pub anchor: Option<NodeId>,
    pub container: Option<NodeId>,
}

impl ResolvedPair {
    /// Neither anchor nor container.
    pub const DETACHED: ResolvedPair = ResolvedPair {
        anchor: None,
        container: None,
    };

    /// Derive the container for an already resolved anchor.
    pub fn derive(doc: &Document, anchor: Option<NodeId>, position: Position) -> Self {
        Self {
            anchor,
            container: resolve_container(doc, anchor, position),
        }
    }

    /// Run the full resolve-then-derive step.
    pub fn resolve(
        doc: &Document,
        spec: &AnchorSpec,
        position: Position,
    ) -> Result<Self, AnchorFault> {
        let anchor = resolve_anchor(doc, spec)?;
        Ok(Self::derive(doc, anchor, position))
    }

    /// Both ends, when a container was found.
    #[must_use]
    pub fn attached(self) -> Option<(NodeId, NodeId)> {
        self.anchor.zip(self.container)
    }

    #[must_use]
    pub fn is_attached(self) -> bool {
        self.container.is_some()
    }
}
