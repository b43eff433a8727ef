#![forbid(unsafe_code)]

//! Policy-as-data configuration for portal behaviour.
//!
//! # Loading
//!
//! ```toml
//! # mooring-policy.toml
//! default_position = "first"
//! factory_faults = "not-found"
//! ```
//!
//! ```rust,ignore
//! let policy = PortalPolicy::from_toml_file("mooring-policy.toml")?;
//! let policy = PortalPolicy::from_json_str(json)?;
//! ```
//!
//! # Defaults
//!
//! `PortalPolicy::default()` places content last and propagates anchor
//! factory faults to the caller.

#[cfg(feature = "policy-config")]
use std::path::Path;

#[cfg(feature = "policy-config")]
use serde::{Deserialize, Serialize};

use crate::container::Position;

/// What to do when an anchor factory returns a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(rename_all = "kebab-case"))]
pub enum FactoryFaultPolicy {
    /// Return the fault to the caller of the resolution cycle.
    #[default]
    Propagate,
    /// Log it and treat the anchor as not found.
    NotFound,
}

/// Portal-wide tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "policy-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default))]
pub struct PortalPolicy {
    /// Position used when a portal does not set one.
    pub default_position: Position,
    /// Handling of anchor factory faults.
    pub factory_faults: FactoryFaultPolicy,
}

impl PortalPolicy {
    #[must_use]
    pub fn with_default_position(mut self, position: Position) -> Self {
        self.default_position = position;
        self
    }

    #[must_use]
    pub fn with_factory_faults(mut self, policy: FactoryFaultPolicy) -> Self {
        self.factory_faults = policy;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, PolicyConfigError> {
        toml::from_str(s).map_err(PolicyConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, PolicyConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PolicyConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "policy-config")]
    pub fn from_json_str(s: &str) -> Result<Self, PolicyConfigError> {
        serde_json::from_str(s).map_err(PolicyConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "policy-config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PolicyConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(PolicyConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Serialize to a TOML string.
    #[cfg(feature = "policy-config")]
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Errors from loading a [`PortalPolicy`].
#[derive(Debug)]
pub enum PolicyConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "policy-config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "policy-config")]
    Json(serde_json::Error),
}

impl std::fmt::Display for PolicyConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
        }
    }
}

impl std::error::Error for PolicyConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "policy-config")]
            Self::Json(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let policy = PortalPolicy::default();
        assert_eq!(policy.default_position, Position::Last);
        assert_eq!(policy.factory_faults, FactoryFaultPolicy::Propagate);
    }

    #[test]
    fn builders() {
        let policy = PortalPolicy::default()
            .with_default_position(Position::Before)
            .with_factory_faults(FactoryFaultPolicy::NotFound);
        assert_eq!(policy.default_position, Position::Before);
        assert_eq!(policy.factory_faults, FactoryFaultPolicy::NotFound);
    }

    #[test]
    fn io_error_display() {
        let err = PolicyConfigError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.to_string(), "I/O error: gone");
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let policy = PortalPolicy::from_toml_str("default_position = \"first\"").unwrap();
        assert_eq!(policy.default_position, Position::First);
        assert_eq!(policy.factory_faults, FactoryFaultPolicy::Propagate);
    }
}
