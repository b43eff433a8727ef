#![forbid(unsafe_code)]

//! Portal error model.
//!
//! Ordinary absence is never an error: a selector that matches nothing, an
//! unset handle, a factory returning `None`, or an unparented anchor under a
//! sibling position all resolve to "not found" and leave the portal
//! unattached. Only faults in caller-supplied code and host tree failures
//! surface as [`PortalError`].

use std::fmt;

use mooring_dom::DomError;

/// A fault raised by a caller-supplied anchor factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorFault {
    message: String,
}

impl AnchorFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AnchorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anchor factory failed: {}", self.message)
    }
}

impl std::error::Error for AnchorFault {}

impl From<&str> for AnchorFault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for AnchorFault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Errors surfaced by portal operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// The anchor factory faulted and the policy is to propagate.
    AnchorFactory(AnchorFault),
    /// The host tree rejected a content insertion.
    Dom(DomError),
    /// The portal was already torn down.
    TornDown,
}

/// Standard result type for portal APIs.
pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// Error type label for tracing fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AnchorFactory(_) => "anchor_factory",
            Self::Dom(_) => "dom",
            Self::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorFactory(fault) => write!(f, "{fault}"),
            Self::Dom(err) => write!(f, "host tree: {err}"),
            Self::TornDown => write!(f, "portal already torn down"),
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AnchorFactory(fault) => Some(fault),
            Self::Dom(err) => Some(err),
            Self::TornDown => None,
        }
    }
}

impl From<AnchorFault> for PortalError {
    fn from(fault: AnchorFault) -> Self {
        Self::AnchorFactory(fault)
    }
}

impl From<DomError> for PortalError {
    fn from(err: DomError) -> Self {
        Self::Dom(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooring_dom::NodeId;
    use std::error::Error as _;

    #[test]
    fn display_and_source() {
        let err = PortalError::from(AnchorFault::new("boom"));
        assert_eq!(err.to_string(), "anchor factory failed: boom");
        assert_eq!(err.error_type(), "anchor_factory");
        assert!(err.source().is_some());

        let err = PortalError::from(DomError::UnknownNode(NodeId::from_raw(7)));
        assert_eq!(err.to_string(), "host tree: unknown node #7");
        assert_eq!(err.error_type(), "dom");

        assert!(PortalError::TornDown.source().is_none());
    }
}
