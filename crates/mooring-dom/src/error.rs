#![forbid(unsafe_code)]

//! Error types for tree mutations and selector parsing.

use std::fmt;

use crate::node::NodeId;

/// Tree mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The id does not belong to this document.
    UnknownNode(NodeId),
    /// The insertion would make a node its own ancestor, or would place
    /// something under a node that cannot have children.
    HierarchyRequest { parent: NodeId, node: NodeId },
    /// The reference node passed to `insert_before` is not a child of the parent.
    NotAChild { parent: NodeId, child: NodeId },
    /// An element-only operation was applied to a text or document node.
    NotAnElement(NodeId),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::HierarchyRequest { parent, node } => {
                write!(f, "cannot insert {node} under {parent}")
            }
            Self::NotAChild { parent, child } => write!(f, "{child} is not a child of {parent}"),
            Self::NotAnElement(id) => write!(f, "{id} is not an element"),
        }
    }
}

impl std::error::Error for DomError {}

/// What went wrong while parsing a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorErrorKind {
    /// Input was empty or only whitespace.
    Empty,
    /// A character that cannot start or continue a selector.
    UnexpectedChar(char),
    /// Input ended in the middle of a construct.
    UnexpectedEnd,
    /// An identifier was required here.
    ExpectedIdent,
    /// A combinator or comma with nothing after it.
    DanglingCombinator,
    /// Syntax that is valid CSS but not supported (pseudo-classes, `~`, `+`).
    Unsupported(char),
}

/// A selector that failed to parse, with the byte offset of the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorError {
    pub kind: SelectorErrorKind,
    pub offset: usize,
}

impl SelectorError {
    pub(crate) fn new(kind: SelectorErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SelectorErrorKind::Empty => write!(f, "empty selector"),
            SelectorErrorKind::UnexpectedChar(c) => {
                write!(f, "unexpected '{c}' at offset {}", self.offset)
            }
            SelectorErrorKind::UnexpectedEnd => {
                write!(f, "unexpected end of selector at offset {}", self.offset)
            }
            SelectorErrorKind::ExpectedIdent => {
                write!(f, "expected identifier at offset {}", self.offset)
            }
            SelectorErrorKind::DanglingCombinator => {
                write!(f, "combinator without selector at offset {}", self.offset)
            }
            SelectorErrorKind::Unsupported(c) => {
                write!(f, "unsupported selector syntax '{c}' at offset {}", self.offset)
            }
        }
    }
}

impl std::error::Error for SelectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = DomError::HierarchyRequest {
            parent: NodeId::from_raw(3),
            node: NodeId::from_raw(1),
        };
        assert_eq!(err.to_string(), "cannot insert #1 under #3");

        let err = SelectorError::new(SelectorErrorKind::UnexpectedChar('!'), 4);
        assert_eq!(err.to_string(), "unexpected '!' at offset 4");
    }
}
