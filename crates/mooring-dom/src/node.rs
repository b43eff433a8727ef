#![forbid(unsafe_code)]

//! Node identity and payload types.

use std::fmt;

/// Stable identity of a node within one [`Document`](crate::Document).
///
/// Ids are arena indices. They stay valid for the lifetime of the document:
/// removing a node detaches it but never frees the slot, so a detached
/// subtree can be re-inserted later under the same ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The document root. Always present, never has a parent.
    pub const ROOT: NodeId = NodeId(0);

    /// Build an id from its raw index. Intended for tests and diagnostics;
    /// an id that was not handed out by the document is rejected with
    /// [`DomError::UnknownNode`](crate::DomError::UnknownNode).
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Element payload: tag name and attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attributes: Vec<(String, String)>,
}

impl ElementData {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Lowercased tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub(crate) fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        self.attributes.len() != before
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

impl NodeKind {
    #[must_use]
    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            Self::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Text nodes are leaves.
    #[must_use]
    pub fn accepts_children(&self) -> bool {
        !matches!(self, Self::Text(_))
    }
}

/// The four insert-adjacent modes, relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdjacentPosition {
    /// Immediately before the target, as its previous sibling.
    BeforeBegin,
    /// Inside the target, as its first child.
    AfterBegin,
    /// Inside the target, as its last child.
    BeforeEnd,
    /// Immediately after the target, as its next sibling.
    AfterEnd,
}

impl AdjacentPosition {
    /// Whether this mode inserts into the target's parent rather than the target.
    #[must_use]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Self::BeforeBegin | Self::AfterEnd)
    }
}
