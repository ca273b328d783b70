//! Host-side client of the embedding service.
//!
//! Tracks the host's two embedding slots: a "regular" surface that
//! receives the remote view's [`SurfacePackage`], and a parent surface
//! under which the service attaches a surface control. The package is
//! grafted only once the surface, the service connection and the
//! package are all present, and only once.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embed::remote_view::SurfacePackage;
use crate::embed::service::EmbeddingHandle;
use crate::error::TransactionError;
use crate::platform::Platform;
use crate::surface::{DisplayId, Geometry, InputRoutingToken, SurfaceHandle, Transaction};

/// Host window embedding remote content.
pub struct EmbeddedWindowHost {
    platform: Arc<dyn Platform>,
    display: DisplayId,
    token: InputRoutingToken,
    geometry: Geometry,
    service: Option<EmbeddingHandle>,
    regular: Option<SurfaceHandle>,
    control_parent: Option<SurfaceHandle>,
    package: Option<SurfacePackage>,
    attached: bool,
}

impl EmbeddedWindowHost {
    /// `display` is the display this host window lives on; `geometry`
    /// is the size requested for the remote view.
    pub fn new(
        platform: Arc<dyn Platform>,
        display: DisplayId,
        token: InputRoutingToken,
        geometry: Geometry,
    ) -> Self {
        Self {
            platform,
            display,
            token,
            geometry,
            service: None,
            regular: None,
            control_parent: None,
            package: None,
            attached: false,
        }
    }

    // ── Service connection ───────────────────────────────────────

    pub async fn on_service_connected(&mut self, service: EmbeddingHandle) {
        debug!("service connected");
        self.service = Some(service);
        self.load_surface_control().await;
        self.load_remote_view().await;
    }

    pub fn on_service_disconnected(&mut self) {
        debug!("service disconnected");
        self.service = None;
    }

    // ── Regular slot (remote view) ───────────────────────────────

    pub async fn on_regular_surface_created(&mut self, surface: SurfaceHandle) {
        self.regular = Some(surface);
        if self.package.is_none() {
            self.load_remote_view().await;
        }
        self.graft_package();
    }

    pub fn on_regular_surface_destroyed(&mut self) {
        self.regular = None;
    }

    // ── Surface-control slot ─────────────────────────────────────

    pub async fn on_control_surface_created(&mut self, surface: SurfaceHandle) {
        self.control_parent = Some(surface);
        self.load_surface_control().await;
    }

    pub async fn on_control_surface_destroyed(&mut self) {
        if let Some(service) = &self.service {
            if let Err(e) = service.tear_down_surface_control().await {
                warn!("failed to tear down embedded surface control: {e}");
            }
        }
        self.control_parent = None;
    }

    // ── State ────────────────────────────────────────────────────

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn package(&self) -> Option<&SurfacePackage> {
        self.package.as_ref()
    }

    fn is_ready_to_attach(&self) -> bool {
        if self.regular.is_none() {
            debug!("surface is not created");
        }
        if self.service.is_none() {
            debug!("service is not connected");
        }
        if self.attached {
            debug!("already attached");
        }
        self.regular.is_some() && self.service.is_some() && !self.attached && self.package.is_some()
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn load_remote_view(&mut self) {
        if self.regular.is_none() {
            return;
        }
        let Some(service) = &self.service else {
            return;
        };
        match service.attach(self.token, self.geometry).await {
            Ok(outcome) => {
                info!(session = %outcome.package.session(), "remote view attached");
                if let Some(old) = outcome.superseded {
                    debug!(%old, "previous package released; grafting the new one");
                }
                // The new package has not been grafted yet.
                self.attached = false;
                self.package = Some(outcome.package);
                self.graft_package();
            }
            Err(e) => warn!("failed to load remote view: {e}"),
        }
    }

    async fn load_surface_control(&mut self) {
        let (Some(parent), Some(service)) = (&self.control_parent, &self.service) else {
            return;
        };
        if let Err(e) = service
            .attach_surface_control(parent.clone(), self.display, self.token)
            .await
        {
            warn!("failed to load embedded surface control: {e}");
        }
    }

    fn graft_package(&mut self) {
        if !self.is_ready_to_attach() {
            debug!("not ready to attach");
            return;
        }
        let (Some(regular), Some(package)) = (&self.regular, &self.package) else {
            return;
        };
        match graft(self.platform.as_ref(), regular, package) {
            Ok(()) => {
                info!(session = %package.session(), "surface package attached");
                self.attached = true;
            }
            Err(e) => warn!("failed to attach surface package: {e}"),
        }
    }
}

/// Show the package's surface under `parent` in one transaction.
fn graft(
    platform: &dyn Platform,
    parent: &SurfaceHandle,
    package: &SurfacePackage,
) -> Result<(), TransactionError> {
    let surface = package.surface();
    if !package.is_valid() || !platform.is_valid(surface) {
        return Err(TransactionError::SurfaceRemoved(surface.id()));
    }
    platform.apply(Transaction::new().show(surface).reparent(surface, Some(parent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::service::{EmbeddingService, EmbeddingServiceConfig};
    use crate::surface::{Display, LocalCompositor, MirrorPolicy, SurfaceState};

    fn compositor() -> Arc<LocalCompositor> {
        Arc::new(LocalCompositor::new().with_display(
            Display {
                id: DisplayId::DEFAULT,
                width: 1080,
                height: 2400,
            },
            MirrorPolicy::Deny,
        ))
    }

    #[tokio::test]
    async fn grafts_once_everything_is_ready() {
        let c = compositor();
        let (service, _task) =
            EmbeddingService::spawn(c.clone(), EmbeddingServiceConfig::default());
        let mut host = EmbeddedWindowHost::new(
            c.clone(),
            DisplayId::DEFAULT,
            InputRoutingToken(11),
            Geometry::new(1080, 1000),
        );

        // No surface yet: connecting alone attaches nothing.
        host.on_service_connected(service.clone()).await;
        assert!(host.package().is_none());
        assert!(!host.is_attached());

        let window = c.create_window("regular", 1080, 1000);
        host.on_regular_surface_created(window.clone()).await;

        assert!(host.is_attached());
        let package = host.package().unwrap();
        assert_eq!(c.parent_of(package.surface()), Some(window.id()));
        assert_eq!(c.state(package.surface()), Some(SurfaceState::Shown));

        // A second surface event does not graft again.
        let commits = c.applied_count();
        host.on_regular_surface_created(window).await;
        assert_eq!(c.applied_count(), commits);
    }

    #[tokio::test]
    async fn reconnect_grafts_replacement_package() {
        let c = compositor();
        let (service, _task) =
            EmbeddingService::spawn(c.clone(), EmbeddingServiceConfig::default());
        let mut host = EmbeddedWindowHost::new(
            c.clone(),
            DisplayId::DEFAULT,
            InputRoutingToken(13),
            Geometry::new(1080, 1000),
        );
        let window = c.create_window("regular", 1080, 1000);
        host.on_regular_surface_created(window.clone()).await;
        host.on_service_connected(service.clone()).await;
        assert!(host.is_attached());
        let first = host.package().unwrap().clone();

        host.on_service_disconnected();
        host.on_service_connected(service.clone()).await;

        let second = host.package().unwrap();
        assert_ne!(second.session(), first.session());
        assert!(!first.is_valid());
        assert!(second.is_valid());
        assert!(host.is_attached());
        assert_eq!(c.parent_of(second.surface()), Some(window.id()));
        assert_eq!(c.state(second.surface()), Some(SurfaceState::Shown));
        assert_eq!(c.children_of(&window), vec![second.surface().id()]);
    }

    #[tokio::test]
    async fn control_surface_lifecycle() {
        let c = compositor();
        let (service, _task) =
            EmbeddingService::spawn(c.clone(), EmbeddingServiceConfig::default());
        let mut host = EmbeddedWindowHost::new(
            c.clone(),
            DisplayId::DEFAULT,
            InputRoutingToken(12),
            Geometry::new(100, 100),
        );
        host.on_service_connected(service.clone()).await;

        let parent = c.create_window("control", 1080, 1000);
        host.on_control_surface_created(parent.clone()).await;
        let children = c.children_of(&parent);
        assert_eq!(children.len(), 1);

        host.on_control_surface_destroyed().await;
        assert!(c.children_of(&parent).is_empty());
        assert_eq!(service.inspect().await.unwrap().surface, None);
    }
}
