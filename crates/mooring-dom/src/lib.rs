#![forbid(unsafe_code)]

//! Mooring DOM
//!
//! A small in-memory document tree with the pieces a DOM-synchronizing
//! engine needs from its host document.
//!
//! # Key Components
//!
//! - [`Document`] - Shared handle over a node arena with tree queries and mutations
//! - [`SelectorList`] - Parser and matcher for a CSS selector subset
//! - [`MutationObserver`] - RAII observer registration with deferred, batched delivery
//! - [`MutationRecord`] - One child-list change
//!
//! # Role in Mooring
//! `mooring-dom` stands in for the browser document. `mooring-portal`
//! resolves anchors against it, relocates content inside it, and watches it
//! for exogenous structural changes.

pub mod document;
pub mod error;
pub mod mutation;
pub mod node;
pub mod selector;

pub use document::{Document, MAX_DELIVERY_ROUNDS};
pub use error::{DomError, SelectorError, SelectorErrorKind};
pub use mutation::{MutationObserver, MutationRecord, ObserveOptions, ObserverId};
pub use node::{AdjacentPosition, ElementData, NodeId, NodeKind};
pub use selector::{ElementTree, SelectorList};
