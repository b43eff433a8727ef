#![forbid(unsafe_code)]

//! Mooring Portal
//!
//! Keeps one piece of host-rendered content physically attached to an
//! anchor node that may not exist yet, may move, or may disappear and
//! reappear.
//!
//! # Key Components
//!
//! - [`Portal`] - One engine instance: resolution cycle, watcher, lifecycle
//! - [`AnchorSpec`] / [`resolve_anchor`] - Where the anchor comes from
//! - [`Position`] / [`resolve_container`] - Where content goes relative to it
//! - [`place`] - Idempotent placement of the content node
//! - [`compose_refs`] - Merging the owner's hook with the engine's
//! - [`MutationWatcher`] - Self-caused versus exogenous change detection
//! - [`MountState`] - Attach/detach transition tracking
//! - [`PortalPolicy`] - Policy-as-data defaults and fault handling
//!
//! # Example
//!
//! ```
//! use mooring_dom::Document;
//! use mooring_portal::{Portal, PortalConfig, Position};
//!
//! let doc = Document::new();
//! let content = doc.create_element("aside");
//! let portal = Portal::mount(
//!     &doc,
//!     PortalConfig::new("#sidebar").with_position(Position::First),
//!     content,
//! )
//! .unwrap();
//! assert!(!portal.is_attached());
//!
//! let sidebar = doc.create_element("div");
//! doc.set_attribute(sidebar, "id", "sidebar").unwrap();
//! doc.append_child(doc.body(), sidebar).unwrap();
//! doc.flush_mutations();
//!
//! assert_eq!(portal.container(), Some(sidebar));
//! assert_eq!(doc.parent(content), Some(sidebar));
//! ```

pub mod anchor;
pub mod container;
pub mod content;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod placement;
pub mod policy;
pub mod portal;
pub mod refs;
pub mod watcher;

pub use anchor::{AnchorFactory, AnchorSpec, resolve_anchor};
pub use container::{Position, ResolvedPair, resolve_container};
pub use content::{Content, ContentElement, ContentViolation};
pub use error::{AnchorFault, PortalError, Result};
pub use host::{DocumentHost, PortalHost};
pub use lifecycle::{AttachedPair, LifecycleHook, LifecycleHooks, MountState, Transition};
pub use placement::{Placement, is_placed, place};
pub use policy::{FactoryFaultPolicy, PolicyConfigError, PortalPolicy};
pub use portal::{Portal, PortalConfig};
pub use refs::{Cleanup, ComposedRef, NodeRef, NodeSlot, RefCleanup, compose_refs};
pub use watcher::{MutationOrigin, MutationWatcher, classify};
