#![forbid(unsafe_code)]

//! What a host hands the portal to place.
//!
//! A portal owns exactly one element. Everything else is either silently
//! ignored (nothing, text) or rejected with a diagnostic (several nodes,
//! a grouping fragment).

use std::fmt;

use mooring_dom::NodeId;
use tracing::error;

use crate::refs::NodeRef;

/// A host-created element plus the owner's hook on it, if any.
#[derive(Debug, Clone)]
pub struct ContentElement {
    pub node: NodeId,
    pub owner_ref: Option<NodeRef>,
}

impl ContentElement {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            owner_ref: None,
        }
    }

    /// Attach the owner's own hook, forwarded alongside the engine's.
    #[must_use]
    pub fn with_ref(mut self, owner_ref: impl Into<NodeRef>) -> Self {
        self.owner_ref = Some(owner_ref.into());
        self
    }

    /// Whether `other` carries the same node and the same owner hook.
    pub(crate) fn same_binding(&self, other: &ContentElement) -> bool {
        self.node == other.node
            && match (&self.owner_ref, &other.owner_ref) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_hook(b),
                _ => false,
            }
    }
}

/// Portal content as produced by the host.
#[derive(Debug, Clone, Default)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Element(ContentElement),
    /// A grouping wrapper. Never placeable.
    Fragment(Vec<Content>),
    /// A list of children, placeable only when it holds exactly one.
    Many(Vec<Content>),
}

/// Why content was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentViolation {
    Multiple { count: usize },
    Fragment,
}

impl fmt::Display for ContentViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multiple { count } => write!(
                f,
                "multiple children are not supported in a portal ({count} given); wrap them in one element"
            ),
            Self::Fragment => write!(
                f,
                "fragment children are not supported in a portal; wrap them in one element"
            ),
        }
    }
}

impl std::error::Error for ContentViolation {}

impl Content {
    pub fn element(node: NodeId) -> Self {
        Self::Element(ContentElement::new(node))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The single placeable element, `None` for nothing placeable, or the
    /// violation that makes this content unplaceable.
    pub fn validate(&self) -> Result<Option<&ContentElement>, ContentViolation> {
        match self {
            Self::Empty | Self::Text(_) => Ok(None),
            Self::Element(element) => Ok(Some(element)),
            Self::Fragment(_) => Err(ContentViolation::Fragment),
            Self::Many(children) => match children.as_slice() {
                [] => Ok(None),
                [only] => only.validate(),
                _ => Err(ContentViolation::Multiple {
                    count: children.len(),
                }),
            },
        }
    }

    /// [`validate`](Self::validate), logging violations and treating them
    /// as nothing to place.
    pub fn placeable(&self) -> Option<ContentElement> {
        match self.validate() {
            Ok(element) => element.cloned(),
            Err(violation) => {
                error!(%violation, "portal content rejected");
                None
            }
        }
    }
}

impl From<ContentElement> for Content {
    fn from(element: ContentElement) -> Self {
        Self::Element(element)
    }
}

impl From<NodeId> for Content {
    fn from(node: NodeId) -> Self {
        Self::element(node)
    }
}

impl From<Option<NodeId>> for Content {
    fn from(node: Option<NodeId>) -> Self {
        node.map_or(Self::Empty, Self::element)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}
