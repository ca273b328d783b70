//! Embedding service actor.
//!
//! All requests from the host are queued on one channel and executed in
//! submission order by a single task, the only code that touches the
//! remote view host, the held surface or the transaction applier.
//!
//! ```text
//! host ──[EmbeddingHandle]──► mpsc ──► EmbeddingService::run
//!                                        ├─ RemoteViewHost (session slot)
//!                                        ├─ DisplayMirror / child surface (surface slot)
//!                                        └─ Platform::apply
//! host ◄──────────── oneshot reply (never awaited by the service)
//! ```
//!
//! Replies are sent with the non-blocking `oneshot::send`. If the host
//! side is gone the failure is logged and counted; tree state that was
//! already committed stays committed.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::embed::mirror::{DisplayMirror, MirrorBinding};
use crate::embed::remote_view::{
    ContentRoot, LayoutParams, RemoteViewHost, SessionId, SurfacePackage,
};
use crate::error::{AttachError, CallbackDeliveryError, EmbedError, MirrorError, RelayoutError};
use crate::input::InputReceiverGuard;
use crate::platform::Platform;
use crate::surface::{
    Color, DisplayId, Geometry, InputEvent, InputRoutingToken, SurfaceContent, SurfaceHandle,
    SurfaceId, SurfaceSpec, TextRun, Transaction,
};

// ── Configuration ────────────────────────────────────────────────

/// The child surface drawn when a surface control is attached on the
/// service's own display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSurfaceConfig {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub background: Color,
    pub label: String,
    pub label_color: Color,
    pub label_size: u16,
    pub label_x: i32,
    pub label_y: i32,
}

impl Default for ChildSurfaceConfig {
    fn default() -> Self {
        Self {
            name: "Child SurfaceControl".into(),
            width: 1080,
            height: 1000,
            background: Color::BLUE,
            label: "Remote".into(),
            label_color: Color::WHITE,
            label_size: 40,
            label_x: 400,
            label_y: 500,
        }
    }
}

impl ChildSurfaceConfig {
    fn content(&self) -> SurfaceContent {
        SurfaceContent::solid(self.background).with_text(TextRun {
            text: self.label.clone(),
            x: self.label_x,
            y: self.label_y,
            size: self.label_size,
            color: self.label_color,
        })
    }
}

/// Configuration for [`EmbeddingService`].
#[derive(Debug, Clone)]
pub struct EmbeddingServiceConfig {
    /// Display remote views are bound to. Surface-control requests for
    /// this display draw a child surface; any other display is mirrored.
    pub own_display: DisplayId,
    /// Content of every remote view.
    pub content: ContentRoot,
    pub child_surface: ChildSurfaceConfig,
    /// Capacity of the request queue.
    pub queue_capacity: usize,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            own_display: DisplayId::DEFAULT,
            content: ContentRoot::default(),
            child_surface: ChildSurfaceConfig::default(),
            queue_capacity: 100,
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────

/// Result of a successful attach.
#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub package: SurfacePackage,
    /// The session this attach replaced. Its packages are now invalid.
    pub superseded: Option<SessionId>,
}

/// How the held surface was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Drawn child with an input receiver.
    Drawn,
    /// Mirror of the given display.
    Mirrored(DisplayId),
}

/// Result of a successful surface-control attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceControlOutcome {
    pub surface: SurfaceHandle,
    pub kind: SurfaceKind,
    /// Surface that occupied the slot before and was not torn down. It
    /// is left in the tree; its input receiver has been unregistered.
    pub replaced: Option<SurfaceId>,
}

/// The live session, as reported by [`EmbeddingHandle::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub display: DisplayId,
    pub token: InputRoutingToken,
    pub geometry: Geometry,
    pub root: Option<SurfaceId>,
}

/// Point-in-time view of the service state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceSnapshot {
    pub session: Option<SessionInfo>,
    pub surface: Option<SurfaceId>,
    pub surface_kind: Option<SurfaceKind>,
    /// Replies the host never received.
    pub delivery_failures: u64,
}

// ── Requests ─────────────────────────────────────────────────────

enum Request {
    Attach {
        token: InputRoutingToken,
        geometry: Geometry,
        reply: oneshot::Sender<Result<AttachOutcome, AttachError>>,
    },
    Relayout {
        geometry: Geometry,
        reply: oneshot::Sender<Result<(), RelayoutError>>,
    },
    AttachSurfaceControl {
        parent: SurfaceHandle,
        display: DisplayId,
        token: InputRoutingToken,
        reply: oneshot::Sender<Result<SurfaceControlOutcome, MirrorError>>,
    },
    TearDownSurfaceControl {
        reply: oneshot::Sender<bool>,
    },
    Detach {
        reply: oneshot::Sender<Option<SessionId>>,
    },
    Inspect {
        reply: oneshot::Sender<ServiceSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ── EmbeddingHandle ──────────────────────────────────────────────

/// Cloneable client for an [`EmbeddingService`]. Usable from any task
/// or thread; every call is queued behind the ones submitted before it.
#[derive(Debug, Clone)]
pub struct EmbeddingHandle {
    tx: mpsc::Sender<Request>,
}

impl EmbeddingHandle {
    /// Attach a new remote view bound to `token`, superseding the
    /// current one.
    pub async fn attach(
        &self,
        token: InputRoutingToken,
        geometry: Geometry,
    ) -> Result<AttachOutcome, EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Attach {
                token,
                geometry,
                reply,
            })
            .await?;
        Ok(rx.await??)
    }

    /// Apply new geometry to the live remote view.
    pub async fn relayout(&self, geometry: Geometry) -> Result<(), EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Relayout { geometry, reply }).await?;
        Ok(rx.await??)
    }

    /// Put a drawn child or a display mirror under `parent`.
    pub async fn attach_surface_control(
        &self,
        parent: SurfaceHandle,
        display: DisplayId,
        token: InputRoutingToken,
    ) -> Result<SurfaceControlOutcome, EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::AttachSurfaceControl {
                parent,
                display,
                token,
                reply,
            })
            .await?;
        Ok(rx.await??)
    }

    /// Remove the held surface, if any. Returns whether one was held.
    pub async fn tear_down_surface_control(&self) -> Result<bool, EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::TearDownSurfaceControl { reply }).await?;
        Ok(rx.await?)
    }

    /// Release the remote view. Returns the released session, if any.
    pub async fn detach(&self) -> Result<Option<SessionId>, EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Detach { reply }).await?;
        Ok(rx.await?)
    }

    pub async fn inspect(&self) -> Result<ServiceSnapshot, EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Inspect { reply }).await?;
        Ok(rx.await?)
    }

    /// Release everything and stop the service once queued requests
    /// ahead of this one have run.
    pub async fn shutdown(&self) -> Result<(), EmbedError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Request::Shutdown { reply }).await?;
        Ok(rx.await?)
    }

    /// Whether the service has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── EmbeddedSurface ──────────────────────────────────────────────

/// Occupant of the surface slot.
enum EmbeddedSurface {
    Drawn {
        surface: SurfaceHandle,
        input: InputReceiverGuard,
    },
    Mirrored(MirrorBinding),
}

impl EmbeddedSurface {
    fn surface(&self) -> &SurfaceHandle {
        match self {
            EmbeddedSurface::Drawn { surface, .. } => surface,
            EmbeddedSurface::Mirrored(binding) => &binding.surface,
        }
    }

    fn kind(&self) -> SurfaceKind {
        match self {
            EmbeddedSurface::Drawn { .. } => SurfaceKind::Drawn,
            EmbeddedSurface::Mirrored(binding) => SurfaceKind::Mirrored(binding.source),
        }
    }

    /// Unregister input, then remove the surface if it is still valid.
    fn tear_down(self, platform: &dyn Platform) {
        let surface = match self {
            EmbeddedSurface::Drawn { surface, input } => {
                drop(input);
                surface
            }
            EmbeddedSurface::Mirrored(binding) => {
                if binding.is_stale(platform) {
                    debug!(surface = %binding.surface, "mirror binding was stale at teardown");
                }
                binding.surface
            }
        };
        if !platform.is_valid(&surface) {
            debug!(%surface, "surface already gone; nothing to remove");
            return;
        }
        let id = surface.id();
        match platform.apply(Transaction::new().remove(surface)) {
            Ok(()) => info!(surface = %id, "surface control torn down"),
            Err(e) => warn!(surface = %id, "failed to remove surface: {e}"),
        }
    }
}

// ── EmbeddingService ─────────────────────────────────────────────

/// Single-slot embedding service: at most one remote view and one
/// attached surface at a time.
pub struct EmbeddingService {
    platform: Arc<dyn Platform>,
    mirror: DisplayMirror,
    config: EmbeddingServiceConfig,
    session: Option<RemoteViewHost>,
    embedded: Option<EmbeddedSurface>,
    next_session: u64,
    delivery_failures: u64,
    rx: mpsc::Receiver<Request>,
}

impl EmbeddingService {
    /// Build the service and the handle that talks to it. Nothing runs
    /// until [`run`](Self::run) is polled.
    pub fn new(
        platform: Arc<dyn Platform>,
        config: EmbeddingServiceConfig,
    ) -> (Self, EmbeddingHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let service = Self {
            mirror: DisplayMirror::new(Arc::clone(&platform)),
            platform,
            config,
            session: None,
            embedded: None,
            next_session: 0,
            delivery_failures: 0,
            rx,
        };
        (service, EmbeddingHandle { tx })
    }

    /// Build the service and spawn it on the Tokio runtime.
    pub fn spawn(
        platform: Arc<dyn Platform>,
        config: EmbeddingServiceConfig,
    ) -> (EmbeddingHandle, tokio::task::JoinHandle<()>) {
        let (service, handle) = Self::new(platform, config);
        (handle, tokio::spawn(service.run()))
    }

    /// Process requests until shut down or every handle is dropped.
    /// Everything still held is released on the way out.
    pub async fn run(mut self) {
        info!(display = %self.config.own_display, "embedding service started");
        while let Some(request) = self.rx.recv().await {
            if !self.handle(request) {
                break;
            }
        }
        self.release_all();
        info!("embedding service stopped");
    }

    /// Returns `false` when the service should stop.
    fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Attach {
                token,
                geometry,
                reply,
            } => {
                let result = self.attach(token, geometry);
                self.deliver("attach", reply, result);
            }
            Request::Relayout { geometry, reply } => {
                let result = self.relayout(geometry);
                self.deliver("relayout", reply, result);
            }
            Request::AttachSurfaceControl {
                parent,
                display,
                token,
                reply,
            } => {
                let result = self.attach_surface_control(parent, display, token);
                self.deliver("attach_surface_control", reply, result);
            }
            Request::TearDownSurfaceControl { reply } => {
                let removed = self.tear_down_surface_control();
                self.deliver("tear_down_surface_control", reply, removed);
            }
            Request::Detach { reply } => {
                let released = self.detach();
                self.deliver("detach", reply, released);
            }
            Request::Inspect { reply } => {
                let snapshot = self.snapshot();
                self.deliver("inspect", reply, snapshot);
            }
            Request::Shutdown { reply } => {
                self.release_all();
                self.deliver("shutdown", reply, ());
                return false;
            }
        }
        true
    }

    fn deliver<T>(&mut self, operation: &'static str, reply: oneshot::Sender<T>, value: T) {
        if reply.send(value).is_err() {
            self.delivery_failures += 1;
            warn!("{}", CallbackDeliveryError { operation });
        }
    }

    // ── Operations ───────────────────────────────────────────────

    fn attach(
        &mut self,
        token: InputRoutingToken,
        geometry: Geometry,
    ) -> Result<AttachOutcome, AttachError> {
        info!(%token, %geometry, "attach");
        self.next_session += 1;
        let session = SessionId(self.next_session);

        let mut host = RemoteViewHost::create(
            Arc::clone(&self.platform),
            session,
            self.config.own_display,
            token,
            geometry,
        )?;
        let built = host
            .set_content(self.config.content.clone(), LayoutParams::new(geometry))
            .and_then(|()| host.export_surface_package());
        let package = match built {
            Ok(package) => package,
            Err(e) => {
                host.release();
                return Err(e);
            }
        };

        let superseded = self.session.replace(host).map(|old| {
            let id = old.session();
            info!(old = %id, new = %session, "remote view superseded");
            old.release();
            id
        });

        Ok(AttachOutcome {
            package,
            superseded,
        })
    }

    fn relayout(&mut self, geometry: Geometry) -> Result<(), RelayoutError> {
        let host = self.session.as_mut().ok_or(RelayoutError::NoActiveHost)?;
        host.relayout(geometry)
    }

    fn attach_surface_control(
        &mut self,
        parent: SurfaceHandle,
        target: DisplayId,
        token: InputRoutingToken,
    ) -> Result<SurfaceControlOutcome, MirrorError> {
        info!(%parent, display = %target, %token, "attach surface control");
        if !self.platform.is_valid(&parent) {
            return Err(MirrorError::InvalidParent(parent.id()));
        }

        let embedded = if target == self.config.own_display {
            self.draw_child(&parent, token)?
        } else {
            self.mirror_into(parent, target)?
        };

        let outcome = SurfaceControlOutcome {
            surface: embedded.surface().clone(),
            kind: embedded.kind(),
            replaced: None,
        };
        let replaced = self.embedded.replace(embedded).map(|old| {
            let id = old.surface().id();
            warn!(surface = %id, "surface control replaced without teardown; left in tree");
            id
        });
        Ok(SurfaceControlOutcome { replaced, ..outcome })
    }

    fn draw_child(
        &self,
        parent: &SurfaceHandle,
        token: InputRoutingToken,
    ) -> Result<EmbeddedSurface, MirrorError> {
        let child = &self.config.child_surface;
        let surface = self.platform.create_surface(
            SurfaceSpec::new(child.name.clone(), child.width, child.height).with_parent(parent),
        )?;
        self.platform.draw(&surface, child.content())?;
        self.platform
            .apply(Transaction::new().show(&surface).reparent(&surface, Some(parent)))?;

        let input = InputReceiverGuard::register(
            Arc::clone(&self.platform),
            token,
            &surface,
            Box::new(|event: &InputEvent| {
                debug!(?event, "input event on remote surface");
                false
            }),
        );
        Ok(EmbeddedSurface::Drawn { surface, input })
    }

    fn mirror_into(
        &self,
        parent: SurfaceHandle,
        source: DisplayId,
    ) -> Result<EmbeddedSurface, MirrorError> {
        let mirrored = self.mirror.mirror(source).map_err(|e| {
            warn!(display = %source, "mirroring display failed: {e}");
            MirrorError::MirrorUnavailable(source)
        })?;
        // The display can go away between the mirror call and the commit.
        if !self.mirror.is_valid(&mirrored) {
            warn!(display = %source, "mirror became invalid before commit");
            return Err(MirrorError::MirrorUnavailable(source));
        }
        let surface = mirrored.into_surface();
        self.platform
            .apply(Transaction::new().show(&surface).reparent(&surface, Some(&parent)))?;
        Ok(EmbeddedSurface::Mirrored(MirrorBinding {
            source,
            surface,
            parent,
        }))
    }

    fn tear_down_surface_control(&mut self) -> bool {
        match self.embedded.take() {
            Some(embedded) => {
                embedded.tear_down(self.platform.as_ref());
                true
            }
            None => {
                debug!("tear down with no surface control; nothing to do");
                false
            }
        }
    }

    fn detach(&mut self) -> Option<SessionId> {
        let host = self.session.take()?;
        let id = host.session();
        host.release();
        Some(id)
    }

    fn release_all(&mut self) {
        self.tear_down_surface_control();
        self.detach();
    }

    fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            session: self.session.as_ref().map(|host| SessionInfo {
                id: host.session(),
                display: host.display().id,
                token: host.token(),
                geometry: host.geometry(),
                root: host.root_surface().map(SurfaceHandle::id),
            }),
            surface: self.embedded.as_ref().map(|e| e.surface().id()),
            surface_kind: self.embedded.as_ref().map(EmbeddedSurface::kind),
            delivery_failures: self.delivery_failures,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Display, LocalCompositor, MirrorPolicy, SurfaceState};

    fn compositor() -> Arc<LocalCompositor> {
        Arc::new(
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
                        id: DisplayId(2),
                        width: 1920,
                        height: 1080,
                    },
                    MirrorPolicy::Allow,
                ),
        )
    }

    fn service(c: &Arc<LocalCompositor>) -> EmbeddingService {
        EmbeddingService::new(c.clone(), EmbeddingServiceConfig::default()).0
    }

    #[test]
    fn invalid_geometry_creates_nothing() {
        let c = compositor();
        let mut svc = service(&c);
        let err = svc
            .attach(InputRoutingToken(1), Geometry::new(0, 100))
            .unwrap_err();
        assert!(matches!(err, AttachError::InvalidGeometry { .. }));
        assert!(svc.session.is_none());
        assert_eq!(c.live_surface_count(), 0);
    }

    #[test]
    fn attach_without_display_fails() {
        let c = Arc::new(LocalCompositor::new());
        let mut svc = service(&c);
        let err = svc
            .attach(InputRoutingToken(1), Geometry::new(10, 10))
            .unwrap_err();
        assert_eq!(err, AttachError::NoDisplay(DisplayId::DEFAULT));
        assert_eq!(c.applied_count(), 0);
    }

    #[test]
    fn failed_attach_keeps_previous_session() {
        let c = compositor();
        let mut svc = service(&c);
        let first = svc
            .attach(InputRoutingToken(1), Geometry::new(10, 10))
            .unwrap();
        assert!(svc
            .attach(InputRoutingToken(2), Geometry::new(-1, 10))
            .is_err());
        assert!(first.package.is_valid());
        assert_eq!(svc.snapshot().session.map(|s| s.id), Some(first.package.session()));
    }

    #[test]
    fn relayout_without_host() {
        let c = compositor();
        let mut svc = service(&c);
        assert_eq!(
            svc.relayout(Geometry::new(10, 10)),
            Err(RelayoutError::NoActiveHost)
        );
        assert_eq!(c.applied_count(), 0);
    }

    #[test]
    fn draw_path_registers_input() {
        let c = compositor();
        let mut svc = service(&c);
        let parent = c.create_window("host", 1080, 2400);

        let outcome = svc
            .attach_surface_control(parent.clone(), DisplayId::DEFAULT, InputRoutingToken(9))
            .unwrap();

        assert_eq!(outcome.kind, SurfaceKind::Drawn);
        assert_eq!(c.children_of(&parent), vec![outcome.surface.id()]);
        assert_eq!(c.state(&outcome.surface), Some(SurfaceState::Shown));
        assert_eq!(c.input_token(&outcome.surface), Some(InputRoutingToken(9)));
        let content = c.content_of(&outcome.surface).unwrap();
        assert_eq!(content.background, Color::BLUE);
        assert_eq!(content.text.map(|t| t.text).as_deref(), Some("Remote"));

        assert!(svc.tear_down_surface_control());
        assert_eq!(c.state(&outcome.surface), Some(SurfaceState::Removed));
        assert_eq!(c.receiver_count(), 0);
    }

    #[test]
    fn mirror_path_shows_and_reparents_atomically() {
        let c = compositor();
        let mut svc = service(&c);
        let parent = c.create_window("host", 100, 100);

        let outcome = svc
            .attach_surface_control(parent.clone(), DisplayId(2), InputRoutingToken(1))
            .unwrap();

        assert_eq!(outcome.kind, SurfaceKind::Mirrored(DisplayId(2)));
        assert_eq!(c.applied_count(), 1);
        assert_eq!(c.applied_transactions()[0].len(), 2);
        assert_eq!(c.parent_of(&outcome.surface), Some(parent.id()));
        assert_eq!(c.mirror_source(&outcome.surface), Some(DisplayId(2)));
        assert_eq!(c.receiver_count(), 0);
    }

    #[test]
    fn invalid_parent_is_rejected() {
        let c = compositor();
        let mut svc = service(&c);
        let ghost = SurfaceHandle::from_id(SurfaceId(77));
        assert_eq!(
            svc.attach_surface_control(ghost, DisplayId(2), InputRoutingToken(1))
                .unwrap_err(),
            MirrorError::InvalidParent(SurfaceId(77))
        );
    }

    #[test]
    fn teardown_of_unplugged_mirror_applies_nothing() {
        let c = compositor();
        let mut svc = service(&c);
        let parent = c.create_window("host", 100, 100);
        let outcome = svc
            .attach_surface_control(parent.clone(), DisplayId(2), InputRoutingToken(1))
            .unwrap();
        let commits = c.applied_count();

        let display = c.remove_display(DisplayId(2)).unwrap();

        assert!(svc.tear_down_surface_control());
        assert_eq!(c.applied_count(), commits);
        assert!(svc.embedded.is_none());

        // Re-plugging the display does not bring the old mirror back.
        c.add_display(display, MirrorPolicy::Allow);
        assert_eq!(c.state(&outcome.surface), Some(SurfaceState::Removed));
        assert!(c.children_of(&parent).is_empty());
    }

    #[test]
    fn dropped_reply_counts_delivery_failure() {
        let c = compositor();
        let mut svc = service(&c);
        let (reply, rx) = oneshot::channel();
        drop(rx);

        svc.handle(Request::Attach {
            token: InputRoutingToken(1),
            geometry: Geometry::new(10, 10),
            reply,
        });

        // The attach itself stays committed.
        let snapshot = svc.snapshot();
        assert_eq!(snapshot.delivery_failures, 1);
        assert!(snapshot.session.is_some());
    }
}
