#![forbid(unsafe_code)]

//! Ownership hooks on the content node and their composition.
//!
//! A content node can carry several parties' hooks at once: the owner's
//! own ref and the engine's placement hook. [`compose_refs`] merges them
//! into one [`ComposedRef`] that the host invokes on attach; the returned
//! [`RefCleanup`] undoes every hook exactly once.
//!
//! # Hook kinds
//!
//! - [`NodeRef::Slot`]: a mutable cell. Attach writes the node; cleanup
//!   writes `None` back.
//! - [`NodeRef::Callback`]: called with `Some(node)` on attach. If it
//!   returns a cleanup, that cleanup runs on detach; otherwise the callback
//!   is called again with `None`.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use mooring_dom::NodeId;

/// Cleanup returned by a callback hook.
pub type Cleanup = Box<dyn FnOnce()>;

type HookFn = dyn Fn(Option<NodeId>) -> Option<Cleanup>;

/// Shared, settable cell holding an optional node.
///
/// Clones share the same cell. Used both as an ownership hook and as a
/// weak-handle anchor that may not be set yet.
#[derive(Clone, Default)]
pub struct NodeSlot(Rc<Cell<Option<NodeId>>>);

impl NodeSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(node: NodeId) -> Self {
        let slot = Self::new();
        slot.set(Some(node));
        slot
    }

    #[must_use]
    pub fn current(&self) -> Option<NodeId> {
        self.0.get()
    }

    pub fn set(&self, node: Option<NodeId>) {
        self.0.set(node);
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &NodeSlot) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeSlot").field(&self.current()).finish()
    }
}

/// One ownership hook.
#[derive(Clone)]
pub enum NodeRef {
    Slot(NodeSlot),
    Callback(Rc<HookFn>),
}

impl NodeRef {
    /// A plain callback: `Some(node)` on attach, `None` on detach.
    pub fn callback(f: impl Fn(Option<NodeId>) + 'static) -> Self {
        Self::Callback(Rc::new(move |node: Option<NodeId>| -> Option<Cleanup> {
            f(node);
            None
        }))
    }

    /// A callback that returns its own cleanup. It is only ever called
    /// with a node; detach runs the cleanup instead.
    pub fn with_cleanup(f: impl Fn(NodeId) -> Cleanup + 'static) -> Self {
        Self::Callback(Rc::new(move |node: Option<NodeId>| node.map(&f)))
    }

    /// Whether two hooks are the same hook (same cell or same closure).
    #[must_use]
    pub fn same_hook(&self, other: &NodeRef) -> bool {
        match (self, other) {
            (Self::Slot(a), Self::Slot(b)) => a.ptr_eq(b),
            (Self::Callback(a), Self::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn set(&self, node: Option<NodeId>) -> Option<Cleanup> {
        match self {
            Self::Slot(slot) => {
                slot.set(node);
                None
            }
            Self::Callback(f) => f(node),
        }
    }
}

impl From<NodeSlot> for NodeRef {
    fn from(slot: NodeSlot) -> Self {
        Self::Slot(slot)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(slot) => f.debug_tuple("Slot").field(slot).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Several hooks merged into one.
#[derive(Clone)]
pub struct ComposedRef {
    refs: Rc<[NodeRef]>,
}

/// Merge hooks, in order. Attach invokes them first to last; cleanup
/// undoes them in the same order.
pub fn compose_refs(refs: impl IntoIterator<Item = NodeRef>) -> ComposedRef {
    ComposedRef {
        refs: refs.into_iter().collect(),
    }
}

impl ComposedRef {
    /// Invoke every hook with `node` and collect what each returns.
    pub fn attach(&self, node: NodeId) -> RefCleanup {
        let cleanups = self.refs.iter().map(|r| r.set(Some(node))).collect();
        RefCleanup {
            pending: Some((Rc::clone(&self.refs), cleanups)),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

impl fmt::Debug for ComposedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.refs.iter()).finish()
    }
}

/// Detach side of one attach. Runs at most once: on [`run`](Self::run),
/// or on drop if never run.
#[must_use = "dropping a RefCleanup runs it immediately"]
pub struct RefCleanup {
    pending: Option<(Rc<[NodeRef]>, Vec<Option<Cleanup>>)>,
}

impl RefCleanup {
    pub fn run(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        let Some((refs, cleanups)) = self.pending.take() else {
            return;
        };
        for (hook, cleanup) in refs.iter().zip(cleanups) {
            match cleanup {
                Some(cleanup) => cleanup(),
                None => {
                    // A cleanup returned for the null call is not kept.
                    drop(hook.set(None));
                }
            }
        }
    }
}

impl fmt::Debug for RefCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCleanup")
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl Drop for RefCleanup {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn node(raw: u32) -> NodeId {
        NodeId::from_raw(raw)
    }

    #[test]
    fn slot_is_set_and_cleared() {
        let slot = NodeSlot::new();
        let composed = compose_refs([NodeRef::from(slot.clone())]);
        let cleanup = composed.attach(node(4));
        assert_eq!(slot.current(), Some(node(4)));
        cleanup.run();
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn plain_callback_gets_null_on_detach() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&calls);
        let composed = compose_refs([NodeRef::callback(move |n| log.borrow_mut().push(n))]);

        composed.attach(node(2)).run();
        assert_eq!(*calls.borrow(), vec![Some(node(2)), None]);
    }

    #[test]
    fn returned_cleanup_replaces_null_call() {
        let calls = Rc::new(RefCell::new(Vec::<String>::new()));
        let log = Rc::clone(&calls);
        let composed = compose_refs([NodeRef::with_cleanup(move |n| {
            log.borrow_mut().push(format!("attach {n}"));
            let log = Rc::clone(&log);
            Box::new(move || log.borrow_mut().push(format!("cleanup {n}")))
        })]);

        composed.attach(node(9)).run();
        assert_eq!(*calls.borrow(), vec!["attach #9", "cleanup #9"]);
    }

    #[test]
    fn every_hook_runs_in_order_and_cleans_up_once() {
        let calls = Rc::new(RefCell::new(Vec::<String>::new()));
        let slot = NodeSlot::new();
        let a = Rc::clone(&calls);
        let b = Rc::clone(&calls);
        let composed = compose_refs([
            NodeRef::callback(move |n| a.borrow_mut().push(format!("a {n:?}"))),
            NodeRef::from(slot.clone()),
            NodeRef::with_cleanup(move |_| {
                b.borrow_mut().push("b attach".into());
                let b = Rc::clone(&b);
                Box::new(move || b.borrow_mut().push("b cleanup".into()))
            }),
        ]);
        assert_eq!(composed.len(), 3);

        let cleanup = composed.attach(node(1));
        assert_eq!(slot.current(), Some(node(1)));
        cleanup.run();

        assert_eq!(
            *calls.borrow(),
            vec![
                "a Some(NodeId(1))",
                "b attach",
                "a None",
                "b cleanup"
            ]
        );
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn dropping_cleanup_runs_it() {
        let slot = NodeSlot::new();
        {
            let _cleanup = compose_refs([NodeRef::from(slot.clone())]).attach(node(3));
            assert_eq!(slot.current(), Some(node(3)));
        }
        assert_eq!(slot.current(), None);
    }

    #[test]
    fn same_hook_identity() {
        let slot = NodeSlot::new();
        let a = NodeRef::from(slot.clone());
        let b = NodeRef::from(slot);
        let c = NodeRef::from(NodeSlot::new());
        let cb = NodeRef::callback(|_| {});
        assert!(a.same_hook(&b));
        assert!(!a.same_hook(&c));
        assert!(cb.same_hook(&cb.clone()));
        assert!(!cb.same_hook(&a));
    }
}
