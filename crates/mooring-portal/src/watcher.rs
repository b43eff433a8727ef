#![forbid(unsafe_code)]

//! Subtree watcher that separates the engine's own writes from the rest.
//!
//! Every changed node in a batch is classified against the container the
//! portal currently resolves to. Nodes inside that container are the
//! engine's own doing (or content the engine owns) and are ignored. Any
//! other node means the document changed underneath the portal, and the
//! resolution cycle must run again.
//!
//! A container that has left the watched root no longer claims anything:
//! when an anchor that is its own container gets removed, the removal
//! must read as exogenous.
//!
//! Classification runs at delivery time, after the cycle that wrote the
//! records has finished. Content moved from an old container into a new
//! one is therefore already inside the new container, and its removal
//! record is self-caused. Content removed by anyone else is outside every
//! container, which is what triggers the cycle that puts it back.
//!
//! # Failure Modes
//!
//! - **Self-triggering loop**: without classification, each placement
//!   would produce a record, which would trigger a cycle, which would
//!   place again. Placement is idempotent so the loop settles, but only
//!   after a redundant cycle per batch.

use std::fmt;

use mooring_dom::{Document, MutationObserver, MutationRecord, NodeId, ObserveOptions};
use tracing::debug;

/// Who caused a batch of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOrigin {
    /// Every changed node lies inside the current container.
    SelfCaused,
    /// At least one changed node lies outside it.
    Exogenous,
}

/// Classify a batch against the current container.
///
/// With no container, or a container outside `root`, every change is
/// exogenous. An empty batch is self-caused.
pub fn classify(
    doc: &Document,
    records: &[MutationRecord],
    root: NodeId,
    container: Option<NodeId>,
) -> MutationOrigin {
    let container = container.filter(|&c| doc.contains(root, c));
    let exogenous = records
        .iter()
        .flat_map(|record| record.changed_nodes())
        .any(|node| !container.is_some_and(|c| doc.contains(c, node)));
    if exogenous {
        MutationOrigin::Exogenous
    } else {
        MutationOrigin::SelfCaused
    }
}

/// An active observation of one subtree. Stops on [`stop`](Self::stop)
/// or drop.
pub struct MutationWatcher {
    observer: MutationObserver,
}

impl MutationWatcher {
    /// Observe `root` and call `on_exogenous` for every batch that is not
    /// self-caused. `container` is read fresh for every batch.
    pub fn start(
        doc: &Document,
        root: NodeId,
        container: impl Fn() -> Option<NodeId> + 'static,
        on_exogenous: impl Fn() + 'static,
    ) -> Self {
        let handle = doc.clone();
        let observer = doc.observe(root, ObserveOptions::default(), move |records| {
            let current = container();
            match classify(&handle, records, root, current) {
                MutationOrigin::SelfCaused => {
                    debug!(records = records.len(), "ignoring self-caused mutations");
                }
                MutationOrigin::Exogenous => on_exogenous(),
            }
        });
        Self { observer }
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.observer.root()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.observer.is_connected()
    }

    pub fn stop(&self) {
        self.observer.disconnect();
    }
}

impl fmt::Debug for MutationWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationWatcher")
            .field("root", &self.observer.root())
            .field("active", &self.is_active())
            .finish()
    }
}
