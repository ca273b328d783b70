//! Service runner.
//!
//! Builds the in-memory compositor from configuration, spawns the
//! embedding service on it, and drives one host session through the
//! full protocol: attach, surface-control attach, relayout, teardown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use embed_core::embed::{EmbeddedWindowHost, EmbeddingService, ServiceSnapshot};
use embed_core::error::EmbedError;
use embed_core::surface::{DisplayId, Geometry, InputRoutingToken, LocalCompositor};

use crate::config::ServiceConfig;

/// What the host session observed.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The remote view package was grafted into the host window.
    pub attached: bool,
    /// Service state after relayout, before teardown.
    pub during: ServiceSnapshot,
    /// Service state after teardown.
    pub after: ServiceSnapshot,
}

// ── EmbeddingRunner ──────────────────────────────────────────────

/// Top-level runner for the embedding service.
pub struct EmbeddingRunner {
    config: ServiceConfig,
    target_display: DisplayId,
    running: Arc<AtomicBool>,
}

impl EmbeddingRunner {
    /// `target_display` is the display the host asks to have attached
    /// under its control surface.
    pub fn new(config: ServiceConfig, target_display: DisplayId) -> Self {
        Self {
            config,
            target_display,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the runner from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one host session. With `hold` set, the embedded content
    /// stays up until the runner is stopped.
    pub async fn run(&self, hold: bool) -> Result<SessionReport, EmbedError> {
        self.running.store(true, Ordering::SeqCst);

        let compositor = Arc::new(LocalCompositor::new());
        for (entry, policy) in self.config.displays() {
            info!(display = %entry.id, "{}x{} mirror={policy:?}", entry.width, entry.height);
            compositor.add_display(entry, policy);
        }

        let svc_config = self.config.to_service_config();
        let own_display = svc_config.own_display;
        let (service, task) = EmbeddingService::spawn(compositor.clone(), svc_config);

        // Host side: two windows, one per embedding slot.
        let host_cfg = &self.config.host;
        let regular = compositor.create_window("remote_view", host_cfg.width, host_cfg.height);
        let control = compositor.create_window("remote_surface", host_cfg.width, host_cfg.height);
        let mut host = EmbeddedWindowHost::new(
            compositor.clone(),
            self.target_display,
            InputRoutingToken(0x5EED),
            Geometry::new(host_cfg.width, host_cfg.height),
        );

        host.on_regular_surface_created(regular).await;
        host.on_control_surface_created(control).await;
        host.on_service_connected(service.clone()).await;
        if !host.is_attached() {
            warn!("remote view was not attached");
        }

        let relayout = Geometry::new(host_cfg.relayout_width, host_cfg.relayout_height);
        match service.relayout(relayout).await {
            Ok(()) => info!(%relayout, "relayout applied"),
            Err(e) => warn!("relayout failed: {e}"),
        }

        let during = service.inspect().await?;
        info!(
            session = ?during.session.as_ref().map(|s| s.id),
            surface = ?during.surface,
            kind = ?during.surface_kind,
            own = %own_display,
            "session established"
        );

        if hold {
            info!("holding embedded content; Ctrl-C to stop");
            Self::wait_for_stop(&self.running).await;
        }

        host.on_control_surface_destroyed().await;
        let after = service.inspect().await?;

        service.shutdown().await?;
        if let Err(e) = task.await {
            warn!("embedding service task failed: {e}");
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            live_surfaces = compositor.live_surface_count(),
            "embedding runner stopped"
        );
        Ok(SessionReport {
            attached: host.is_attached(),
            during,
            after,
        })
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
