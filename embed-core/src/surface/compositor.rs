//! In-memory compositor.
//!
//! Holds a surface tree, a display table and an input receiver table
//! behind a single lock, and implements every platform trait the
//! embedding service consumes. The most recent applied transactions are
//! kept so a caller can observe exactly which commits happened.
//!
//! Removed surfaces are pruned from the tree when the removal commits.
//! Ids are allocated in increasing order and never reused, so an
//! allocated id missing from the tree is a removed surface.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::TransactionError;
use crate::platform::{DisplayResolver, InputRegistry, MirrorPrimitive, SurfaceAllocator};
use crate::surface::transaction::{SurfaceOp, Transaction, TransactionApplier};
use crate::surface::types::{
    Display, DisplayId, InputEvent, InputReceiver, InputRoutingToken, SurfaceContent,
    SurfaceHandle, SurfaceId, SurfaceSpec, SurfaceState,
};

/// How many applied transactions are retained for inspection.
const APPLIED_HISTORY: usize = 256;

// ── MirrorPolicy ─────────────────────────────────────────────────

/// How the compositor answers a mirror request for a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorPolicy {
    /// A live mirror is produced.
    Allow,
    /// The request is refused outright.
    #[default]
    Deny,
    /// A handle is returned, but it is already dead (the display was
    /// reconfigured while the mirror was being set up).
    Stale,
}

// ── Node ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<SurfaceId>,
    state: SurfaceState,
    width: i32,
    height: i32,
    content: Option<SurfaceContent>,
    mirror_of: Option<DisplayId>,
}

struct Inner {
    next_id: u64,
    nodes: BTreeMap<SurfaceId, Node>,
    displays: BTreeMap<DisplayId, (Display, MirrorPolicy)>,
    receivers: HashMap<SurfaceId, (InputRoutingToken, InputReceiver)>,
    applied: VecDeque<Transaction>,
    applied_total: usize,
}

impl Inner {
    fn next_handle(&mut self) -> SurfaceHandle {
        self.next_id += 1;
        SurfaceHandle::from_id(SurfaceId(self.next_id))
    }

    fn alloc(&mut self, node: Node) -> SurfaceHandle {
        let handle = self.next_handle();
        self.nodes.insert(handle.id(), node);
        handle
    }

    fn state_of(&self, id: SurfaceId) -> Option<SurfaceState> {
        match self.nodes.get(&id) {
            Some(node) => Some(node.state),
            None if allocated(self.next_id, id) => Some(SurfaceState::Removed),
            None => None,
        }
    }

    /// Drop removed nodes and the input receivers registered on them.
    fn prune(&mut self) {
        self.nodes.retain(|_, node| node.state.is_live());
        self.receivers.retain(|id, _| self.nodes.contains_key(id));
    }

    fn record(&mut self, txn: Transaction) {
        if self.applied.len() == APPLIED_HISTORY {
            self.applied.pop_front();
        }
        self.applied.push_back(txn);
        self.applied_total += 1;
    }
}

fn allocated(next_id: u64, id: SurfaceId) -> bool {
    (1..=next_id).contains(&id.0)
}

// ── LocalCompositor ──────────────────────────────────────────────

/// Surface tree + displays + input routing, all in process memory.
pub struct LocalCompositor {
    inner: Mutex<Inner>,
}

impl LocalCompositor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                nodes: BTreeMap::new(),
                displays: BTreeMap::new(),
                receivers: HashMap::new(),
                applied: VecDeque::with_capacity(APPLIED_HISTORY),
                applied_total: 0,
            }),
        }
    }

    /// Builder form of [`add_display`](Self::add_display).
    pub fn with_display(self, display: Display, policy: MirrorPolicy) -> Self {
        self.add_display(display, policy);
        self
    }

    pub fn add_display(&self, display: Display, policy: MirrorPolicy) {
        self.lock().displays.insert(display.id, (display, policy));
    }

    /// Unplug a display. Every mirror of it is removed, together with
    /// its subtree and input receivers, and stays removed if the display
    /// comes back.
    pub fn remove_display(&self, id: DisplayId) -> Option<Display> {
        let mut inner = self.lock();
        let (display, _) = inner.displays.remove(&id)?;
        let mirrors: Vec<SurfaceId> = inner
            .nodes
            .iter()
            .filter(|(_, n)| n.mirror_of == Some(id))
            .map(|(surface, _)| *surface)
            .collect();
        for surface in &mirrors {
            remove_subtree(&mut inner.nodes, *surface);
        }
        inner.prune();
        debug!(display = %id, mirrors = mirrors.len(), "display removed");
        Some(display)
    }

    pub fn set_mirror_policy(&self, id: DisplayId, policy: MirrorPolicy) {
        if let Some(entry) = self.lock().displays.get_mut(&id) {
            entry.1 = policy;
        }
    }

    /// Create a visible top-level surface, as a host window would own.
    pub fn create_window(&self, name: &str, width: i32, height: i32) -> SurfaceHandle {
        let mut inner = self.lock();
        inner.alloc(Node {
            name: name.to_owned(),
            parent: None,
            state: SurfaceState::Shown,
            width: width.max(1),
            height: height.max(1),
            content: None,
            mirror_of: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────

    /// `None` only for ids this compositor never handed out.
    pub fn state(&self, surface: &SurfaceHandle) -> Option<SurfaceState> {
        self.lock().state_of(surface.id())
    }

    pub fn parent_of(&self, surface: &SurfaceHandle) -> Option<SurfaceId> {
        self.lock().nodes.get(&surface.id()).and_then(|n| n.parent)
    }

    /// Live direct children of a surface, in id order.
    pub fn children_of(&self, surface: &SurfaceHandle) -> Vec<SurfaceId> {
        let inner = self.lock();
        inner
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(surface.id()))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn size_of(&self, surface: &SurfaceHandle) -> Option<(i32, i32)> {
        self.lock()
            .nodes
            .get(&surface.id())
            .map(|n| (n.width, n.height))
    }

    pub fn content_of(&self, surface: &SurfaceHandle) -> Option<SurfaceContent> {
        self.lock()
            .nodes
            .get(&surface.id())
            .and_then(|n| n.content.clone())
    }

    pub fn name_of(&self, surface: &SurfaceHandle) -> Option<String> {
        self.lock().nodes.get(&surface.id()).map(|n| n.name.clone())
    }

    pub fn mirror_source(&self, surface: &SurfaceHandle) -> Option<DisplayId> {
        self.lock()
            .nodes
            .get(&surface.id())
            .and_then(|n| n.mirror_of)
    }

    /// Number of surfaces not yet removed.
    pub fn live_surface_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// The most recent committed transactions, oldest first.
    pub fn applied_transactions(&self) -> Vec<Transaction> {
        self.lock().applied.iter().cloned().collect()
    }

    /// Total number of commits, including those no longer retained.
    pub fn applied_count(&self) -> usize {
        self.lock().applied_total
    }

    pub fn input_token(&self, surface: &SurfaceHandle) -> Option<InputRoutingToken> {
        self.lock().receivers.get(&surface.id()).map(|(t, _)| *t)
    }

    pub fn receiver_count(&self) -> usize {
        self.lock().receivers.len()
    }

    /// Deliver an input event to the receiver registered on `surface`.
    /// Returns `None` when nothing is registered there.
    pub fn dispatch_input(&self, surface: &SurfaceHandle, event: InputEvent) -> Option<bool> {
        let mut inner = self.lock();
        let (_, receiver) = inner.receivers.get_mut(&surface.id())?;
        Some((*receiver)(&event))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a half-applied
        // transaction behind (commits swap in a fully staged tree).
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LocalCompositor {
    fn default() -> Self {
        Self::new()
    }
}

// ── Transaction application ──────────────────────────────────────

fn live_node(
    nodes: &mut BTreeMap<SurfaceId, Node>,
    next_id: u64,
    id: SurfaceId,
) -> Result<&mut Node, TransactionError> {
    match nodes.get_mut(&id) {
        Some(n) if !n.state.is_live() => Err(TransactionError::SurfaceRemoved(id)),
        Some(n) => Ok(n),
        None if allocated(next_id, id) => Err(TransactionError::SurfaceRemoved(id)),
        None => Err(TransactionError::UnknownSurface(id)),
    }
}

/// Mark `root` and every live descendant removed.
fn remove_subtree(nodes: &mut BTreeMap<SurfaceId, Node>, root: SurfaceId) {
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        pending.extend(
            nodes
                .iter()
                .filter(|(_, n)| n.parent == Some(id) && n.state.is_live())
                .map(|(child, _)| *child),
        );
        if let Some(node) = nodes.get_mut(&id) {
            node.state = SurfaceState::Removed;
        }
    }
}

fn apply_op(
    nodes: &mut BTreeMap<SurfaceId, Node>,
    next_id: u64,
    op: &SurfaceOp,
) -> Result<(), TransactionError> {
    match op {
        SurfaceOp::Show(h) => live_node(nodes, next_id, h.id())?.state = SurfaceState::Shown,
        SurfaceOp::Hide(h) => live_node(nodes, next_id, h.id())?.state = SurfaceState::Hidden,
        SurfaceOp::Reparent { child, parent } => {
            live_node(nodes, next_id, child.id())?;
            if let Some(parent) = parent {
                live_node(nodes, next_id, parent.id())?;
                // Walk up from the new parent; meeting the child means a cycle.
                let mut cursor = Some(parent.id());
                while let Some(id) = cursor {
                    if id == child.id() {
                        return Err(TransactionError::Cycle {
                            child: child.id(),
                            parent: parent.id(),
                        });
                    }
                    cursor = nodes.get(&id).and_then(|n| n.parent);
                }
            }
            live_node(nodes, next_id, child.id())?.parent = parent.as_ref().map(SurfaceHandle::id);
        }
        SurfaceOp::Resize {
            surface,
            width,
            height,
        } => {
            if *width <= 0 || *height <= 0 {
                return Err(TransactionError::InvalidSize {
                    width: *width,
                    height: *height,
                });
            }
            let node = live_node(nodes, next_id, surface.id())?;
            node.width = *width;
            node.height = *height;
        }
        SurfaceOp::Remove(h) => {
            live_node(nodes, next_id, h.id())?;
            remove_subtree(nodes, h.id());
        }
    }
    Ok(())
}

impl TransactionApplier for LocalCompositor {
    fn apply(&self, txn: Transaction) -> Result<(), TransactionError> {
        let mut inner = self.lock();
        let next_id = inner.next_id;
        let mut staged = inner.nodes.clone();
        for op in txn.ops() {
            apply_op(&mut staged, next_id, op)?;
        }
        inner.nodes = staged;
        inner.prune();
        debug!(ops = txn.len(), "transaction applied");
        inner.record(txn);
        Ok(())
    }
}

// ── Platform traits ──────────────────────────────────────────────

impl DisplayResolver for LocalCompositor {
    fn resolve_display(&self, id: DisplayId) -> Option<Display> {
        self.lock().displays.get(&id).map(|(d, _)| *d)
    }
}

impl SurfaceAllocator for LocalCompositor {
    fn create_surface(&self, spec: SurfaceSpec) -> Result<SurfaceHandle, TransactionError> {
        if spec.width <= 0 || spec.height <= 0 {
            return Err(TransactionError::InvalidSize {
                width: spec.width,
                height: spec.height,
            });
        }
        let mut inner = self.lock();
        if let Some(parent) = &spec.parent {
            let next_id = inner.next_id;
            live_node(&mut inner.nodes, next_id, parent.id())?;
        }
        let handle = inner.alloc(Node {
            name: spec.name,
            parent: spec.parent.as_ref().map(SurfaceHandle::id),
            state: SurfaceState::Unbound,
            width: spec.width,
            height: spec.height,
            content: None,
            mirror_of: None,
        });
        debug!(surface = %handle, "surface allocated");
        Ok(handle)
    }

    fn is_valid(&self, surface: &SurfaceHandle) -> bool {
        self.lock().nodes.contains_key(&surface.id())
    }

    fn draw(
        &self,
        surface: &SurfaceHandle,
        content: SurfaceContent,
    ) -> Result<(), TransactionError> {
        let mut inner = self.lock();
        let next_id = inner.next_id;
        live_node(&mut inner.nodes, next_id, surface.id())?.content = Some(content);
        Ok(())
    }
}

impl MirrorPrimitive for LocalCompositor {
    fn mirror_display(&self, id: DisplayId) -> Option<SurfaceHandle> {
        let mut inner = self.lock();
        let (source, policy) = *inner.displays.get(&id)?;
        match policy {
            MirrorPolicy::Deny => None,
            // Allocated but never in the tree: the handle is already dead.
            MirrorPolicy::Stale => Some(inner.next_handle()),
            MirrorPolicy::Allow => Some(inner.alloc(Node {
                name: format!("mirror of display {id}"),
                parent: None,
                state: SurfaceState::Unbound,
                width: i32::try_from(source.width).unwrap_or(i32::MAX),
                height: i32::try_from(source.height).unwrap_or(i32::MAX),
                content: None,
                mirror_of: Some(id),
            })),
        }
    }
}

impl InputRegistry for LocalCompositor {
    fn register_input_receiver(
        &self,
        token: InputRoutingToken,
        surface: &SurfaceHandle,
        receiver: InputReceiver,
    ) {
        self.lock().receivers.insert(surface.id(), (token, receiver));
    }

    fn unregister_input_receiver(&self, surface: &SurfaceHandle) {
        self.lock().receivers.remove(&surface.id());
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn compositor() -> LocalCompositor {
        LocalCompositor::new()
            .with_display(
                Display {
                    id: DisplayId::DEFAULT,
                    width: 1080,
                    height: 2400,
                },
                MirrorPolicy::Allow,
            )
            .with_display(
                Display {
                    id: DisplayId(5),
                    width: 1920,
                    height: 1080,
                },
                MirrorPolicy::Deny,
            )
    }

    #[test]
    fn show_and_reparent_in_one_commit() {
        let c = compositor();
        let parent = c.create_window("host", 1080, 2400);
        let child = c.create_surface(SurfaceSpec::new("child", 100, 100)).unwrap();
        assert_eq!(c.state(&child), Some(SurfaceState::Unbound));

        c.apply(Transaction::new().show(&child).reparent(&child, Some(&parent)))
            .unwrap();

        assert_eq!(c.state(&child), Some(SurfaceState::Shown));
        assert_eq!(c.children_of(&parent), vec![child.id()]);
        assert_eq!(c.applied_count(), 1);
    }

    #[test]
    fn failed_op_leaves_tree_untouched() {
        let c = compositor();
        let parent = c.create_window("host", 10, 10);
        let child = c.create_surface(SurfaceSpec::new("child", 10, 10)).unwrap();
        let ghost = SurfaceHandle::from_id(SurfaceId(999));

        let err = c
            .apply(Transaction::new().show(&child).reparent(&child, Some(&ghost)))
            .unwrap_err();

        assert_eq!(err, TransactionError::UnknownSurface(SurfaceId(999)));
        assert_eq!(c.state(&child), Some(SurfaceState::Unbound));
        assert!(c.children_of(&parent).is_empty());
        assert_eq!(c.applied_count(), 0);
    }

    #[test]
    fn remove_is_recursive_and_terminal() {
        let c = compositor();
        let root = c.create_window("host", 10, 10);
        let child = c
            .create_surface(SurfaceSpec::new("child", 10, 10).with_parent(&root))
            .unwrap();
        c.register_input_receiver(InputRoutingToken(1), &child, Box::new(|_: &InputEvent| false));

        c.apply(Transaction::new().remove(root.clone())).unwrap();

        assert_eq!(c.state(&child), Some(SurfaceState::Removed));
        assert!(!c.is_valid(&root));
        assert_eq!(c.receiver_count(), 0);
        assert_eq!(
            c.apply(Transaction::new().show(&child)),
            Err(TransactionError::SurfaceRemoved(child.id()))
        );
    }

    #[test]
    fn reparent_rejects_cycles() {
        let c = compositor();
        let a = c.create_window("a", 10, 10);
        let b = c
            .create_surface(SurfaceSpec::new("b", 10, 10).with_parent(&a))
            .unwrap();
        let err = c
            .apply(Transaction::new().reparent(&a, Some(&b)))
            .unwrap_err();
        assert!(matches!(err, TransactionError::Cycle { .. }));
    }

    #[test]
    fn mirror_policies() {
        let c = compositor();
        assert!(c.mirror_display(DisplayId(5)).is_none());
        assert!(c.mirror_display(DisplayId(42)).is_none());

        let live = c.mirror_display(DisplayId::DEFAULT).unwrap();
        assert!(c.is_valid(&live));
        assert_eq!(c.size_of(&live), Some((1080, 2400)));

        c.set_mirror_policy(DisplayId::DEFAULT, MirrorPolicy::Stale);
        let stale = c.mirror_display(DisplayId::DEFAULT).unwrap();
        assert!(!c.is_valid(&stale));
    }

    #[test]
    fn unplugging_display_invalidates_mirror() {
        let c = compositor();
        let mirror = c.mirror_display(DisplayId::DEFAULT).unwrap();
        assert!(c.is_valid(&mirror));
        c.remove_display(DisplayId::DEFAULT);
        assert!(!c.is_valid(&mirror));
    }

    #[test]
    fn replugged_display_does_not_revive_mirror() {
        let c = compositor();
        let parent = c.create_window("host", 1080, 1000);
        let mirror = c.mirror_display(DisplayId::DEFAULT).unwrap();
        c.apply(Transaction::new().show(&mirror).reparent(&mirror, Some(&parent)))
            .unwrap();
        c.register_input_receiver(InputRoutingToken(4), &mirror, Box::new(|_: &InputEvent| true));

        let display = c.remove_display(DisplayId::DEFAULT).unwrap();
        assert_eq!(c.state(&mirror), Some(SurfaceState::Removed));
        assert!(c.children_of(&parent).is_empty());
        assert_eq!(c.receiver_count(), 0);

        c.add_display(display, MirrorPolicy::Allow);
        assert!(!c.is_valid(&mirror));
        assert_eq!(c.state(&mirror), Some(SurfaceState::Removed));
        assert!(c.children_of(&parent).is_empty());
        assert_eq!(
            c.apply(Transaction::new().show(&mirror)),
            Err(TransactionError::SurfaceRemoved(mirror.id()))
        );
        assert!(c.is_valid(&parent));
    }

    #[test]
    fn hide_and_show_toggle_visibility() {
        let c = compositor();
        let parent = c.create_window("host", 10, 10);
        let child = c
            .create_surface(SurfaceSpec::new("child", 10, 10).with_parent(&parent))
            .unwrap();

        c.apply(Transaction::new().show(&child)).unwrap();
        assert_eq!(c.state(&child), Some(SurfaceState::Shown));

        c.apply(Transaction::new().hide(&child)).unwrap();
        assert_eq!(c.state(&child), Some(SurfaceState::Hidden));
        assert!(c.is_valid(&child));
        assert_eq!(c.children_of(&parent), vec![child.id()]);

        c.apply(Transaction::new().show(&child)).unwrap();
        assert_eq!(c.state(&child), Some(SurfaceState::Shown));

        c.apply(Transaction::new().remove(child.clone())).unwrap();
        assert_eq!(
            c.apply(Transaction::new().hide(&child)),
            Err(TransactionError::SurfaceRemoved(child.id()))
        );
    }

    #[test]
    fn removed_surfaces_are_pruned() {
        let c = compositor();
        let mut removed = Vec::new();
        for i in 0..64 {
            let root = c.create_window(&format!("w{i}"), 10, 10);
            c.create_surface(SurfaceSpec::new("child", 10, 10).with_parent(&root))
                .unwrap();
            c.apply(Transaction::new().remove(root.clone())).unwrap();
            removed.push(root);
        }

        assert_eq!(c.live_surface_count(), 0);
        assert!(c.lock().nodes.is_empty());
        for root in &removed {
            assert_eq!(c.state(root), Some(SurfaceState::Removed));
        }
        assert_eq!(c.state(&SurfaceHandle::from_id(SurfaceId(10_000))), None);
    }

    #[test]
    fn applied_history_is_bounded() {
        let c = compositor();
        let s = c.create_window("w", 10, 10);
        let commits = APPLIED_HISTORY + 10;
        for i in 0..commits {
            let size = 10 + i as i32;
            c.apply(Transaction::new().resize(&s, size, size)).unwrap();
        }

        assert_eq!(c.applied_count(), commits);
        let history = c.applied_transactions();
        assert_eq!(history.len(), APPLIED_HISTORY);
        let last = commits as i32 + 9;
        assert_eq!(c.size_of(&s), Some((last, last)));
    }

    #[test]
    fn oversized_display_mirror_saturates() {
        let c = LocalCompositor::new().with_display(
            Display {
                id: DisplayId(3),
                width: u32::MAX,
                height: 720,
            },
            MirrorPolicy::Allow,
        );
        let mirror = c.mirror_display(DisplayId(3)).unwrap();
        assert_eq!(c.size_of(&mirror), Some((i32::MAX, 720)));
    }

    #[test]
    fn input_dispatch_reaches_receiver() {
        let c = compositor();
        let s = c.create_window("w", 10, 10);
        c.register_input_receiver(InputRoutingToken(7), &s, Box::new(|_: &InputEvent| true));
        assert_eq!(c.input_token(&s), Some(InputRoutingToken(7)));
        assert_eq!(
            c.dispatch_input(&s, InputEvent::Motion { x: 1, y: 2 }),
            Some(true)
        );
        c.unregister_input_receiver(&s);
        assert_eq!(c.dispatch_input(&s, InputEvent::Motion { x: 1, y: 2 }), None);
    }

    #[test]
    fn rejects_bad_sizes() {
        let c = compositor();
        assert!(c.create_surface(SurfaceSpec::new("bad", 0, 10)).is_err());
        let s = c.create_window("w", 10, 10);
        assert!(c.apply(Transaction::new().resize(&s, 10, -2)).is_err());
        assert_eq!(c.size_of(&s), Some((10, 10)));
    }
}
