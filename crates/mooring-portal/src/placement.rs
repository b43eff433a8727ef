#![forbid(unsafe_code)]

//! Idempotent placement of the content node.
//!
//! # Invariants
//!
//! 1. A node that already sits where `position` asks is never touched.
//! 2. Otherwise exactly one insert-adjacent call moves it into place.
//!
//! Unconditional re-insertion under a live subtree observer would produce
//! a fresh record on every cycle; with several portals sharing one anchor
//! that turns into a storm. The check in [`is_placed`] is the guard.

use mooring_dom::{Document, DomError, NodeId};
use tracing::trace;

use crate::container::Position;

/// Outcome of a [`place`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The node was already correctly positioned; nothing changed.
    AlreadyPlaced,
    /// One structural mutation moved the node into place.
    Moved,
    /// A sibling position was asked of a parentless anchor.
    Skipped,
}

impl Placement {
    #[must_use]
    pub fn mutated(self) -> bool {
        self == Self::Moved
    }
}

/// Whether `node` already sits at `position` relative to `anchor` under
/// `container`.
#[must_use]
pub fn is_placed(
    doc: &Document,
    node: NodeId,
    anchor: NodeId,
    container: NodeId,
    position: Position,
) -> bool {
    if doc.parent(node) != Some(container) {
        return false;
    }
    match position {
        Position::Last => doc.last_child(container) == Some(node),
        Position::First => doc.first_child(container) == Some(node),
        Position::Before => doc.previous_sibling(anchor) == Some(node),
        Position::After => doc.next_sibling(anchor) == Some(node),
    }
}

/// Put `node` at `position` relative to `anchor`, unless it is already there.
pub fn place(
    doc: &Document,
    node: NodeId,
    anchor: NodeId,
    container: NodeId,
    position: Position,
) -> Result<Placement, DomError> {
    if is_placed(doc, node, anchor, container, position) {
        trace!(node = %node, %position, "content already placed");
        return Ok(Placement::AlreadyPlaced);
    }
    if doc.insert_adjacent(anchor, position.adjacent(), node)? {
        trace!(node = %node, anchor = %anchor, %position, "content moved");
        Ok(Placement::Moved)
    } else {
        Ok(Placement::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooring_dom::ObserveOptions;
    use pretty_assertions::assert_eq;

    struct Fixture {
        doc: Document,
        anchor: NodeId,
        content: NodeId,
    }

    fn fixture() -> Fixture {
        let doc = Document::new();
        let anchor = doc.create_element("div");
        doc.append_child(doc.body(), anchor).unwrap();
        for tag in ["span", "em"] {
            let child = doc.create_element(tag);
            doc.append_child(anchor, child).unwrap();
        }
        let content = doc.create_element("section");
        Fixture { doc, anchor, content }
    }

    fn container(f: &Fixture, position: Position) -> NodeId {
        if position.is_sibling() { f.doc.body() } else { f.anchor }
    }

    #[test]
    fn each_position_lands_in_the_right_spot() {
        for position in Position::ALL {
            let f = fixture();
            let container = container(&f, position);
            let out = place(&f.doc, f.content, f.anchor, container, position).unwrap();
            assert_eq!(out, Placement::Moved, "{position}");
            assert!(is_placed(&f.doc, f.content, f.anchor, container, position));
            let expected = match position {
                Position::First => f.doc.first_child(f.anchor),
                Position::Last => f.doc.last_child(f.anchor),
                Position::Before => f.doc.previous_sibling(f.anchor),
                Position::After => f.doc.next_sibling(f.anchor),
            };
            assert_eq!(expected, Some(f.content), "{position}");
        }
    }

    #[test]
    fn second_placement_is_a_no_op() {
        for position in Position::ALL {
            let f = fixture();
            let container = container(&f, position);
            let observer = f.doc.observe(f.doc.root(), ObserveOptions::default(), |_| {});

            place(&f.doc, f.content, f.anchor, container, position).unwrap();
            let again = place(&f.doc, f.content, f.anchor, container, position).unwrap();

            assert_eq!(again, Placement::AlreadyPlaced);
            let records = observer.take_records();
            assert_eq!(records.len(), 1, "{position}");
            assert!(!again.mutated());
        }
    }

    #[test]
    fn displaced_node_is_moved_back() {
        let f = fixture();
        place(&f.doc, f.content, f.anchor, f.anchor, Position::Last).unwrap();
        let intruder = f.doc.create_element("b");
        f.doc.append_child(f.anchor, intruder).unwrap();
        assert!(!is_placed(&f.doc, f.content, f.anchor, f.anchor, Position::Last));

        assert_eq!(
            place(&f.doc, f.content, f.anchor, f.anchor, Position::Last),
            Ok(Placement::Moved)
        );
        assert_eq!(f.doc.last_child(f.anchor), Some(f.content));
    }

    #[test]
    fn node_under_a_different_parent_is_not_placed() {
        let f = fixture();
        f.doc.append_child(f.doc.body(), f.content).unwrap();
        // Last child of body, but body is not the container for `last`.
        assert!(!is_placed(&f.doc, f.content, f.anchor, f.anchor, Position::Last));
    }

    #[test]
    fn parentless_anchor_skips_sibling_placement() {
        let doc = Document::new();
        let anchor = doc.create_element("div");
        let content = doc.create_element("p");
        let out = place(&doc, content, anchor, anchor, Position::After).unwrap();
        assert_eq!(out, Placement::Skipped);
        assert_eq!(doc.parent(content), None);
    }

    #[test]
    fn placing_an_ancestor_inside_its_descendant_fails() {
        let f = fixture();
        let err = place(&f.doc, f.doc.body(), f.anchor, f.anchor, Position::Last);
        assert!(matches!(err, Err(DomError::HierarchyRequest { .. })));
    }
}
