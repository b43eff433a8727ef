#![forbid(unsafe_code)]

//! Mooring public facade crate.
//!
//! Re-exports the document model from `mooring-dom` and the portal engine
//! from `mooring-portal`, plus a prelude for day-to-day usage.

// --- Document re-exports ---------------------------------------------------

pub use mooring_dom::{
    AdjacentPosition, Document, DomError, MutationObserver, MutationRecord, NodeId, ObserveOptions,
    SelectorError, SelectorList,
};

// --- Portal re-exports -----------------------------------------------------

pub use mooring_portal::{
    AnchorFault, AnchorSpec, Content, ContentElement, ContentViolation, DocumentHost,
    FactoryFaultPolicy, NodeRef, NodeSlot, PolicyConfigError, Portal, PortalConfig, PortalError,
    PortalHost, PortalPolicy, Position, Result, compose_refs,
};

/// Crate-level module aliases.
pub mod dom {
    pub use mooring_dom::*;
}

pub mod portal {
    pub use mooring_portal::*;
}

/// Common imports for everyday use.
pub mod prelude {
    pub use crate::{
        AnchorFault, AnchorSpec, Content, ContentElement, Document, NodeId, NodeRef, NodeSlot,
        Portal, PortalConfig, PortalError, PortalPolicy, Position,
    };
}
