//! Remote view hosting.
//!
//! A [`RemoteViewHost`] owns one embedded view hierarchy bound to a
//! display and a host input token. Its root surface is exported as a
//! [`SurfacePackage`] that the host grafts into its own tree.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, info, warn};

use crate::error::{AttachError, RelayoutError};
use crate::platform::Platform;
use crate::surface::{
    Color, Display, DisplayId, Geometry, InputRoutingToken, SurfaceContent, SurfaceHandle,
    SurfaceSpec, TextRun, Transaction,
};

// ── SessionId ────────────────────────────────────────────────────

/// Identifies one attach. A new attach always gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ── LayoutParams / ContentRoot ───────────────────────────────────

/// Window layout of the embedded view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutParams {
    pub geometry: Geometry,
    pub title: String,
    pub opaque: bool,
}

impl LayoutParams {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            title: "EmbeddedWindow".into(),
            opaque: true,
        }
    }
}

/// Root of the embedded view hierarchy: a centred label on a solid
/// background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRoot {
    pub label: String,
    pub background: Color,
    pub foreground: Color,
    pub text_size: u16,
}

impl Default for ContentRoot {
    fn default() -> Self {
        Self {
            label: "INSIDE TEXT".into(),
            background: Color::CYAN,
            foreground: Color::BLACK,
            text_size: 40,
        }
    }
}

impl ContentRoot {
    /// Render the hierarchy for a given size.
    fn render(&self, geometry: Geometry) -> SurfaceContent {
        SurfaceContent::solid(self.background).with_text(TextRun {
            text: self.label.clone(),
            x: geometry.width / 2,
            y: geometry.height / 2,
            size: self.text_size,
            color: self.foreground,
        })
    }
}

// ── SurfacePackage ───────────────────────────────────────────────

/// Transferable capability to graft a remote view into a host tree.
///
/// Only valid while the [`RemoteViewHost`] that exported it is alive.
#[derive(Debug, Clone)]
pub struct SurfacePackage {
    session: SessionId,
    surface: SurfaceHandle,
    token: InputRoutingToken,
    host: Weak<()>,
}

impl SurfacePackage {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn token(&self) -> InputRoutingToken {
        self.token
    }

    /// Whether the originating host is still alive.
    pub fn is_valid(&self) -> bool {
        self.host.strong_count() > 0
    }
}

// ── RemoteViewHost ───────────────────────────────────────────────

/// One embedded view hierarchy bound to a display and input token.
pub struct RemoteViewHost {
    session: SessionId,
    platform: Arc<dyn Platform>,
    display: Display,
    token: InputRoutingToken,
    layout: LayoutParams,
    content: Option<ContentRoot>,
    root: Option<SurfaceHandle>,
    alive: Arc<()>,
}

impl RemoteViewHost {
    /// Bind a new host. Fails before any surface work if the geometry
    /// is empty or the display cannot be resolved.
    pub fn create(
        platform: Arc<dyn Platform>,
        session: SessionId,
        display_id: DisplayId,
        token: InputRoutingToken,
        geometry: Geometry,
    ) -> Result<Self, AttachError> {
        if !geometry.is_valid() {
            return Err(AttachError::InvalidGeometry {
                width: geometry.width,
                height: geometry.height,
            });
        }
        let resolved = platform
            .resolve_display(display_id)
            .ok_or(AttachError::NoDisplay(display_id))?;

        debug!(%session, display = %resolved.id, %token, "remote view host bound");
        Ok(Self {
            session,
            platform,
            display: resolved,
            token,
            layout: LayoutParams::new(geometry),
            content: None,
            root: None,
            alive: Arc::new(()),
        })
    }

    /// Assign the content root and layout, producing a shown root
    /// surface sized to the layout.
    pub fn set_content(
        &mut self,
        content: ContentRoot,
        layout: LayoutParams,
    ) -> Result<(), AttachError> {
        let geometry = layout.geometry;
        if !geometry.is_valid() {
            return Err(AttachError::InvalidGeometry {
                width: geometry.width,
                height: geometry.height,
            });
        }

        let root = match &self.root {
            Some(root) => {
                self.platform
                    .apply(Transaction::new().resize(root, geometry.width, geometry.height))?;
                root.clone()
            }
            None => {
                let root = self.platform.create_surface(SurfaceSpec::new(
                    layout.title.clone(),
                    geometry.width,
                    geometry.height,
                ))?;
                self.root = Some(root.clone());
                root
            }
        };

        self.platform.draw(&root, content.render(geometry))?;
        self.platform.apply(Transaction::new().show(&root))?;

        self.content = Some(content);
        self.layout = layout;
        Ok(())
    }

    /// Update layout in place; the binding and token are unchanged.
    pub fn relayout(&mut self, geometry: Geometry) -> Result<(), RelayoutError> {
        if !geometry.is_valid() {
            return Err(RelayoutError::InvalidGeometry {
                width: geometry.width,
                height: geometry.height,
            });
        }
        if let (Some(root), Some(content)) = (&self.root, &self.content) {
            self.platform
                .apply(Transaction::new().resize(root, geometry.width, geometry.height))?;
            self.platform.draw(root, content.render(geometry))?;
        }
        self.layout.geometry = geometry;
        debug!(session = %self.session, %geometry, "relayout");
        Ok(())
    }

    /// Export the current root surface. Repeated calls reference the
    /// same surface.
    pub fn export_surface_package(&self) -> Result<SurfacePackage, AttachError> {
        let surface = self.root.clone().ok_or(AttachError::ContentNotSet)?;
        Ok(SurfacePackage {
            session: self.session,
            surface,
            token: self.token,
            host: Arc::downgrade(&self.alive),
        })
    }

    /// Tear down the host: its root surface is removed and every
    /// exported package becomes invalid.
    pub fn release(mut self) {
        if let Some(root) = self.root.take() {
            if self.platform.is_valid(&root) {
                if let Err(e) = self.platform.apply(Transaction::new().remove(root)) {
                    warn!(session = %self.session, "failed to remove root surface: {e}");
                }
            }
        }
        info!(session = %self.session, "remote view host released");
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn token(&self) -> InputRoutingToken {
        self.token
    }

    pub fn geometry(&self) -> Geometry {
        self.layout.geometry
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    pub fn root_surface(&self) -> Option<&SurfaceHandle> {
        self.root.as_ref()
    }
}

// ── Tests ────────────────────────────────────────────────────────
