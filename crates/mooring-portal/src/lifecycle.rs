#![forbid(unsafe_code)]

//! Attach/detach transition tracking.
//!
//! [`MountState`] remembers the pair the last notification was fired for.
//! Transitions are keyed on container identity: re-resolving to the same
//! container is not a transition, even if the anchor node changed.

use std::fmt;
use std::rc::Rc;

use mooring_dom::NodeId;
use tracing::info;

/// Callback receiving `(anchor, container)`.
pub type LifecycleHook = Rc<dyn Fn(NodeId, NodeId)>;

/// The anchor/container pair a portal is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedPair {
    pub anchor: NodeId,
    pub container: NodeId,
}

/// What changed between two resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    Attach(AttachedPair),
    Detach(AttachedPair),
    /// Container changed identity: detach the previous, attach the next.
    Replace {
        previous: AttachedPair,
        next: AttachedPair,
    },
}

impl Transition {
    /// The pair to fire `on_detach` for, if any.
    #[must_use]
    pub fn detached(self) -> Option<AttachedPair> {
        match self {
            Self::Detach(pair) | Self::Replace { previous: pair, .. } => Some(pair),
            Self::None | Self::Attach(_) => None,
        }
    }

    /// The pair to fire `on_attach` for, if any.
    #[must_use]
    pub fn attached(self) -> Option<AttachedPair> {
        match self {
            Self::Attach(pair) | Self::Replace { next: pair, .. } => Some(pair),
            Self::None | Self::Detach(_) => None,
        }
    }
}

/// Last-notified state of one portal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountState {
    current: Option<AttachedPair>,
}

impl MountState {
    #[must_use]
    pub fn current(&self) -> Option<AttachedPair> {
        self.current
    }

    /// Move to `next` and report the transition.
    pub fn transition(&mut self, next: Option<AttachedPair>) -> Transition {
        let previous = self.current;
        self.current = next;
        match (previous, next) {
            (None, None) => Transition::None,
            (None, Some(next)) => Transition::Attach(next),
            (Some(previous), None) => Transition::Detach(previous),
            (Some(previous), Some(next)) if previous.container == next.container => {
                Transition::None
            }
            (Some(previous), Some(next)) => Transition::Replace { previous, next },
        }
    }

    /// Forget the current pair, returning it.
    pub fn reset(&mut self) -> Option<AttachedPair> {
        self.current.take()
    }
}

/// Caller-supplied `on_attach` / `on_detach` callbacks.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub on_attach: Option<LifecycleHook>,
    pub on_detach: Option<LifecycleHook>,
}

impl LifecycleHooks {
    pub fn notify_attach(&self, pair: AttachedPair) {
        info!(anchor = %pair.anchor, container = %pair.container, "portal attached");
        if let Some(hook) = &self.on_attach {
            hook(pair.anchor, pair.container);
        }
    }

    pub fn notify_detach(&self, pair: AttachedPair) {
        info!(anchor = %pair.anchor, container = %pair.container, "portal detached");
        if let Some(hook) = &self.on_detach {
            hook(pair.anchor, pair.container);
        }
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("on_attach", &self.on_attach.is_some())
            .field("on_detach", &self.on_detach.is_some())
            .finish()
    }
}
