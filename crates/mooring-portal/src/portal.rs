#![forbid(unsafe_code)]

//! The portal engine.
//!
//! A [`Portal`] keeps one externally created content node attached to an
//! anchor that may not exist yet, may move, or may disappear.
//!
//! # Resolution cycle
//!
//! ```text
//! AnchorSpec ──resolve──▶ anchor ──derive(position)──▶ container
//!                                                         │
//!                     MountState::transition ◀────────────┤
//!                                                         ▼
//!        unmount old ─▶ on_detach ─▶ mount/rebind/recheck ─▶ on_attach
//! ```
//!
//! A cycle runs on [`Portal::mount`], on every setter, on
//! [`Portal::update`], and from the mutation watcher whenever a delivered
//! batch is exogenous. A cycle never flushes mutations itself, so it always
//! completes before the next batch is processed.
//!
//! # Borrowing
//!
//! No `RefCell` borrow of the portal state is held while caller code runs
//! (anchor factories, ownership hooks, lifecycle hooks, the host). Each
//! cycle resolves with no borrow held, plans inside one short borrow, and
//! executes outside it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use mooring_dom::{Document, NodeId};
use tracing::{error, info_span, warn};
use web_time::Instant;

use crate::anchor::{AnchorSpec, resolve_anchor};
use crate::container::{Position, ResolvedPair};
use crate::content::{Content, ContentElement};
use crate::error::{PortalError, Result};
use crate::host::{DocumentHost, PortalHost};
use crate::lifecycle::{AttachedPair, LifecycleHooks, MountState, Transition};
use crate::placement::place;
use crate::policy::{FactoryFaultPolicy, PortalPolicy};
use crate::refs::{ComposedRef, NodeRef, RefCleanup, compose_refs};
use crate::watcher::MutationWatcher;

// ============================================================================
// Configuration
// ============================================================================

/// Options for one portal instance.
pub struct PortalConfig {
    anchor: AnchorSpec,
    position: Option<Position>,
    root: Option<NodeId>,
    hooks: LifecycleHooks,
    host: Rc<dyn PortalHost>,
    policy: PortalPolicy,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            anchor: AnchorSpec::None,
            position: None,
            root: None,
            hooks: LifecycleHooks::default(),
            host: Rc::new(DocumentHost),
            policy: PortalPolicy::default(),
        }
    }
}

impl PortalConfig {
    pub fn new(anchor: impl Into<AnchorSpec>) -> Self {
        Self {
            anchor: anchor.into(),
            ..Self::default()
        }
    }

    /// Placement relative to the anchor. Defaults to the policy's
    /// `default_position`.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Subtree watched for exogenous changes. Defaults to the body.
    #[must_use]
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    #[must_use]
    pub fn on_attach(mut self, hook: impl Fn(NodeId, NodeId) + 'static) -> Self {
        self.hooks.on_attach = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn on_detach(mut self, hook: impl Fn(NodeId, NodeId) + 'static) -> Self {
        self.hooks.on_detach = Some(Rc::new(hook));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl PortalHost + 'static) -> Self {
        self.host = Rc::new(host);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: PortalPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("anchor", &self.anchor)
            .field("position", &self.position)
            .field("root", &self.root)
            .field("hooks", &self.hooks)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// State
// ============================================================================

struct Mounted {
    element: ContentElement,
    anchor: NodeId,
    container: NodeId,
    position: Position,
    cleanup: Option<RefCleanup>,
}

struct PortalInner {
    doc: Document,
    anchor: AnchorSpec,
    position: Position,
    root: NodeId,
    policy: PortalPolicy,
    hooks: LifecycleHooks,
    host: Rc<dyn PortalHost>,
    element: Option<ContentElement>,
    pair: ResolvedPair,
    state: MountState,
    mounted: Option<Mounted>,
    watcher: Option<MutationWatcher>,
    last_fault: Option<PortalError>,
    /// Set while a planned `on_attach` has not fired yet.
    pending_attach: bool,
    torn_down: bool,
}

type Shared = Rc<RefCell<PortalInner>>;

/// Work decided inside the borrow, carried out after it is released.
struct Plan {
    transition: Transition,
    unmount: Option<Mounted>,
    rebind: Option<(ContentElement, Option<RefCleanup>)>,
    mount: Option<(ContentElement, AttachedPair)>,
    recheck: Option<Recheck>,
}

/// Placement work for content that stays in the same container.
enum Recheck {
    /// The anchor changed inside the container.
    Anchor(NodeId),
    /// Put the node back only if it has left the container.
    Restore { node: NodeId, container: NodeId },
}

impl PortalInner {
    fn plan(&mut self, pair: ResolvedPair) -> Plan {
        let next = pair
            .attached()
            .map(|(anchor, container)| AttachedPair { anchor, container });
        let transition = self.state.transition(next);
        self.pending_attach = transition.attached().is_some();
        self.pair = pair;

        let mut plan = Plan {
            transition,
            unmount: None,
            rebind: None,
            mount: None,
            recheck: None,
        };
        let target = next.zip(self.element.clone());
        let keep = matches!(
            (&self.mounted, &target),
            (Some(m), Some((pair, element)))
                if m.container == pair.container && m.element.node == element.node
        );

        match target {
            Some((pair, element)) if keep => {
                let position = self.position;
                if let Some(mounted) = self.mounted.as_mut() {
                    let moved = mounted.anchor != pair.anchor;
                    mounted.anchor = pair.anchor;
                    if mounted.position != position || !mounted.element.same_binding(&element) {
                        mounted.position = position;
                        mounted.element = element.clone();
                        plan.rebind = Some((element, mounted.cleanup.take()));
                    } else if moved {
                        plan.recheck = Some(Recheck::Anchor(element.node));
                    } else {
                        plan.recheck = Some(Recheck::Restore {
                            node: element.node,
                            container: pair.container,
                        });
                    }
                }
            }
            target => {
                plan.unmount = self.mounted.take();
                plan.mount = target.map(|(pair, element)| (element, pair));
            }
        }
        plan
    }
}

// ============================================================================
// Portal
// ============================================================================

/// One content node kept attached to a resolved anchor.
///
/// Dropping the portal tears it down.
pub struct Portal {
    inner: Shared,
}

impl Portal {
    /// Create a portal, run the first resolution cycle, and start watching.
    ///
    /// A factory fault under [`FactoryFaultPolicy::Propagate`] is returned
    /// and the portal is torn down.
    pub fn mount(doc: &Document, config: PortalConfig, content: impl Into<Content>) -> Result<Self> {
        let PortalConfig {
            anchor,
            position,
            root,
            hooks,
            host,
            policy,
        } = config;
        let root = root.unwrap_or_else(|| doc.body());
        let inner = Rc::new(RefCell::new(PortalInner {
            doc: doc.clone(),
            anchor,
            position: position.unwrap_or(policy.default_position),
            root,
            policy,
            hooks,
            host,
            element: content.into().placeable(),
            pair: ResolvedPair::DETACHED,
            state: MountState::default(),
            mounted: None,
            watcher: None,
            last_fault: None,
            pending_attach: false,
            torn_down: false,
        }));
        let portal = Self { inner };
        run_cycle(&portal.inner)?;
        start_watcher(&portal.inner, root);
        Ok(portal)
    }

    /// Re-run the resolution cycle now.
    pub fn update(&self) -> Result<()> {
        run_cycle(&self.inner)
    }

    /// Replace the content. A different node is unmounted and the new one
    /// mounted; a different owner hook on the same node is rebound.
    pub fn set_content(&self, content: impl Into<Content>) -> Result<()> {
        let element = content.into().placeable();
        self.configure(|inner| inner.element = element)?;
        self.update()
    }

    pub fn set_anchor(&self, anchor: impl Into<AnchorSpec>) -> Result<()> {
        let anchor = anchor.into();
        self.configure(|inner| inner.anchor = anchor)?;
        self.update()
    }

    pub fn set_position(&self, position: Position) -> Result<()> {
        self.configure(|inner| inner.position = position)?;
        self.update()
    }

    /// Watch a different subtree. The previous observation stops.
    pub fn set_root(&self, root: NodeId) -> Result<()> {
        let mut changed = false;
        self.configure(|inner| {
            changed = inner.root != root;
            inner.root = root;
        })?;
        if changed {
            start_watcher(&self.inner, root);
        }
        self.update()
    }

    /// Stop watching, unmount the content, and fire `on_detach` if
    /// attached. Idempotent.
    pub fn teardown(&self) {
        let Ok(mut inner) = self.inner.try_borrow_mut() else {
            warn!("portal teardown skipped: state is borrowed");
            return;
        };
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.pair = ResolvedPair::DETACHED;
        let watcher = inner.watcher.take();
        let mounted = inner.mounted.take();
        let pending = inner.pending_attach;
        let last = inner.state.reset().filter(|_| !pending);
        let hooks = inner.hooks.clone();
        let host = Rc::clone(&inner.host);
        let doc = inner.doc.clone();
        drop(inner);

        if let Some(watcher) = watcher {
            watcher.stop();
        }
        if let Some(mounted) = mounted {
            unmount(&doc, host.as_ref(), mounted);
        }
        if let Some(pair) = last {
            hooks.notify_detach(pair);
        }
    }

    /// The anchor the last cycle resolved.
    #[must_use]
    pub fn anchor(&self) -> Option<NodeId> {
        self.inner.borrow().pair.anchor
    }

    /// The container the last cycle derived.
    #[must_use]
    pub fn container(&self) -> Option<NodeId> {
        self.inner.borrow().pair.container
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.inner.borrow().position
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    #[must_use]
    pub fn policy(&self) -> PortalPolicy {
        self.inner.borrow().policy
    }

    /// Whether a container is currently resolved.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.borrow().state.current().is_some()
    }

    /// The content node currently mounted in the container.
    #[must_use]
    pub fn content_node(&self) -> Option<NodeId> {
        self.inner.borrow().mounted.as_ref().map(|m| m.element.node)
    }

    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner
            .borrow()
            .watcher
            .as_ref()
            .is_some_and(MutationWatcher::is_active)
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.borrow().torn_down
    }

    /// The fault from the most recent watcher-triggered cycle, if any.
    pub fn take_fault(&self) -> Option<PortalError> {
        self.inner.borrow_mut().last_fault.take()
    }

    fn configure(&self, f: impl FnOnce(&mut PortalInner)) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.torn_down {
            return Err(PortalError::TornDown);
        }
        f(&mut inner);
        Ok(())
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Portal")
                .field("anchor", &inner.pair.anchor)
                .field("container", &inner.pair.container)
                .field("position", &inner.position)
                .field("content", &inner.mounted.as_ref().map(|m| m.element.node))
                .field("torn_down", &inner.torn_down)
                .finish(),
            Err(_) => f.write_str("Portal(<borrowed>)"),
        }
    }
}

// ============================================================================
// Cycle
// ============================================================================

fn run_cycle(this: &Shared) -> Result<()> {
    let start = Instant::now();
    let (doc, spec, position, fault_policy) = {
        let inner = this.borrow();
        if inner.torn_down {
            return Err(PortalError::TornDown);
        }
        (
            inner.doc.clone(),
            inner.anchor.clone(),
            inner.position,
            inner.policy.factory_faults,
        )
    };
    let span = info_span!(
        "mooring.resolve",
        anchor_kind = spec.kind(),
        position = position.as_str(),
        anchor_found = tracing::field::Empty,
        container_found = tracing::field::Empty,
        duration_us = tracing::field::Empty
    )
    .entered();

    let (anchor, fault) = match resolve_anchor(&doc, &spec) {
        Ok(anchor) => (anchor, None),
        Err(fault) => match fault_policy {
            FactoryFaultPolicy::Propagate => (None, Some(fault)),
            FactoryFaultPolicy::NotFound => {
                warn!(%fault, "anchor factory failed; treating anchor as not found");
                (None, None)
            }
        },
    };
    let pair = ResolvedPair::derive(&doc, anchor, position);
    span.record("anchor_found", pair.anchor.is_some());
    span.record("container_found", pair.container.is_some());

    let (plan, hooks, host) = {
        let mut inner = this.borrow_mut();
        let plan = inner.plan(pair);
        (plan, inner.hooks.clone(), Rc::clone(&inner.host))
    };
    let placed = execute(this, &doc, &hooks, host.as_ref(), plan);

    span.record("duration_us", start.elapsed().as_micros() as u64);
    match fault {
        Some(fault) => Err(fault.into()),
        None => placed,
    }
}

fn execute(
    this: &Shared,
    doc: &Document,
    hooks: &LifecycleHooks,
    host: &dyn PortalHost,
    plan: Plan,
) -> Result<()> {
    if let Some(mounted) = plan.unmount {
        unmount(doc, host, mounted);
    }
    if let Some(pair) = plan.transition.detached() {
        hooks.notify_detach(pair);
    }
    // Hooks may tear the portal down; nothing below may run after that.
    if is_torn_down(this) {
        return Ok(());
    }
    if let Some((element, previous)) = plan.rebind {
        if let Some(cleanup) = previous {
            cleanup.run();
        }
        if is_torn_down(this) {
            return Ok(());
        }
        let cleanup = composed_ref(this, &element).attach(element.node);
        store_cleanup(this, element.node, cleanup);
    }
    let mut result = Ok(());
    if let Some((element, pair)) = plan.mount {
        match host.insert(doc, pair.container, element.node) {
            Ok(()) => {
                let mounted = Mounted {
                    element: element.clone(),
                    anchor: pair.anchor,
                    container: pair.container,
                    position: this.borrow().position,
                    cleanup: None,
                };
                if is_torn_down(this) {
                    unmount(doc, host, mounted);
                    return Ok(());
                }
                this.borrow_mut().mounted = Some(mounted);
                let cleanup = composed_ref(this, &element).attach(element.node);
                store_cleanup(this, element.node, cleanup);
            }
            Err(err) => {
                warn!(node = %element.node, container = %pair.container, error = %err, "host rejected portal content");
                result = Err(err.into());
            }
        }
    }
    match plan.recheck {
        Some(Recheck::Anchor(node)) => place_content(this, node),
        Some(Recheck::Restore { node, container }) if doc.parent(node) != Some(container) => {
            place_content(this, node);
        }
        _ => {}
    }
    if is_torn_down(this) {
        return result;
    }
    this.borrow_mut().pending_attach = false;
    if let Some(pair) = plan.transition.attached() {
        hooks.notify_attach(pair);
    }
    result
}

fn is_torn_down(this: &Shared) -> bool {
    this.borrow().torn_down
}

fn unmount(doc: &Document, host: &dyn PortalHost, mounted: Mounted) {
    let Mounted {
        element,
        container,
        cleanup,
        ..
    } = mounted;
    if let Some(cleanup) = cleanup {
        cleanup.run();
    }
    if let Err(err) = host.remove(doc, container, element.node) {
        warn!(node = %element.node, container = %container, error = %err, "host failed to remove portal content");
    }
}

/// The owner's hook, then the engine's placement hook.
fn composed_ref(this: &Shared, element: &ContentElement) -> ComposedRef {
    let weak = Rc::downgrade(this);
    let engine = NodeRef::callback(move |node| {
        if let (Some(node), Some(inner)) = (node, weak.upgrade()) {
            place_content(&inner, node);
        }
    });
    compose_refs(element.owner_ref.iter().cloned().chain(std::iter::once(engine)))
}

fn store_cleanup(this: &Shared, node: NodeId, cleanup: RefCleanup) {
    let stale = {
        let mut inner = this.borrow_mut();
        match inner.mounted.as_mut() {
            Some(mounted) if mounted.element.node == node => {
                mounted.cleanup = Some(cleanup);
                None
            }
            _ => Some(cleanup),
        }
    };
    if let Some(cleanup) = stale {
        cleanup.run();
    }
}

fn place_content(this: &Shared, node: NodeId) {
    let (doc, pair, position) = {
        let inner = this.borrow();
        (inner.doc.clone(), inner.pair, inner.position)
    };
    let Some((anchor, container)) = pair.attached() else {
        return;
    };
    if let Err(err) = place(&doc, node, anchor, container, position) {
        warn!(node = %node, anchor = %anchor, %position, error = %err, "portal content placement failed");
    }
}

fn start_watcher(this: &Shared, root: NodeId) {
    let doc = this.borrow().doc.clone();
    let source = Rc::downgrade(this);
    let trigger = Rc::downgrade(this);
    let watcher = MutationWatcher::start(
        &doc,
        root,
        move || {
            source
                .upgrade()
                .and_then(|inner| inner.borrow().pair.container)
        },
        move || {
            if let Some(inner) = trigger.upgrade() {
                resolve_after_change(&inner);
            }
        },
    );
    let previous = this.borrow_mut().watcher.replace(watcher);
    if let Some(previous) = previous {
        previous.stop();
    }
}

fn resolve_after_change(this: &Shared) {
    if let Err(err) = run_cycle(this) {
        error!(error = %err, error_type = err.error_type(), "resolution after document change failed");
        this.borrow_mut().last_fault = Some(err);
    }
}
