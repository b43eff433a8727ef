#![forbid(unsafe_code)]

//! The seam to the host reconciler's portal commit.
//!
//! A host renders portal content into a container it was handed, then
//! removes it on unmount. The engine repositions the node afterwards from
//! the content's attach hook, so the host only needs the coarse operations.

use std::fmt;

use mooring_dom::{Document, DomError, NodeId};

/// How content enters and leaves a container.
pub trait PortalHost {
    /// Commit `node` into `container`.
    fn insert(&self, doc: &Document, container: NodeId, node: NodeId) -> Result<(), DomError>;

    /// Take `node` out of `container`.
    fn remove(&self, doc: &Document, container: NodeId, node: NodeId) -> Result<(), DomError>;
}

/// Appends on insert, detaches on remove.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentHost;

impl PortalHost for DocumentHost {
    fn insert(&self, doc: &Document, container: NodeId, node: NodeId) -> Result<(), DomError> {
        doc.append_child(container, node)
    }

    fn remove(&self, doc: &Document, container: NodeId, node: NodeId) -> Result<(), DomError> {
        // The node may already have been moved elsewhere by hand.
        if doc.parent(node) == Some(container) {
            doc.remove(node)?;
        }
        Ok(())
    }
}

impl fmt::Debug for dyn PortalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PortalHost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_host_appends_and_detaches() {
        let doc = Document::new();
        let container = doc.create_element("div");
        let first = doc.create_element("i");
        let node = doc.create_element("p");
        doc.append_child(doc.body(), container).unwrap();
        doc.append_child(container, first).unwrap();

        DocumentHost.insert(&doc, container, node).unwrap();
        assert_eq!(doc.children(container), vec![first, node]);

        DocumentHost.remove(&doc, container, node).unwrap();
        assert_eq!(doc.parent(node), None);
        assert_eq!(doc.children(container), vec![first]);
    }

    #[test]
    fn removing_a_node_that_moved_away_leaves_it_alone() {
        let doc = Document::new();
        let container = doc.create_element("div");
        let node = doc.create_element("p");
        doc.append_child(doc.body(), node).unwrap();
        DocumentHost.remove(&doc, container, node).unwrap();
        assert_eq!(doc.parent(node), Some(doc.body()));
    }
}
