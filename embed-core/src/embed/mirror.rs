//! Display mirroring.
//!
//! Wraps the platform's mirror primitive, which may hand back a handle
//! that is already dead, into one fallible constructor.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::MirrorError;
use crate::platform::Platform;
use crate::surface::{DisplayId, SurfaceHandle};

/// A live mirror of a display's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredSurface {
    source: DisplayId,
    surface: SurfaceHandle,
}

impl MirroredSurface {
    pub fn source(&self) -> DisplayId {
        self.source
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn into_surface(self) -> SurfaceHandle {
        self.surface
    }
}

/// A mirror attached under a host parent surface.
///
/// Only meaningful while both the source display and the parent are
/// valid; once either goes away the binding is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorBinding {
    pub source: DisplayId,
    pub surface: SurfaceHandle,
    pub parent: SurfaceHandle,
}

impl MirrorBinding {
    pub fn is_stale(&self, platform: &dyn Platform) -> bool {
        !platform.is_valid(&self.surface) || !platform.is_valid(&self.parent)
    }
}

/// Requests mirrors from the platform.
pub struct DisplayMirror {
    platform: Arc<dyn Platform>,
}

impl DisplayMirror {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Mirror display `source`. A refused request and a dead handle
    /// both come back as [`MirrorError::PlatformDenied`].
    ///
    /// The result is valid at the time of return only; check
    /// [`is_valid`](Self::is_valid) again before each use.
    pub fn mirror(&self, source: DisplayId) -> Result<MirroredSurface, MirrorError> {
        let Some(surface) = self.platform.mirror_display(source) else {
            warn!(display = %source, "platform refused to mirror display");
            return Err(MirrorError::PlatformDenied(source));
        };
        if !self.platform.is_valid(&surface) {
            warn!(display = %source, %surface, "mirror handle returned but invalid");
            return Err(MirrorError::PlatformDenied(source));
        }
        debug!(display = %source, %surface, "display mirrored");
        Ok(MirroredSurface { source, surface })
    }

    pub fn is_valid(&self, mirror: &MirroredSurface) -> bool {
        self.platform.is_valid(&mirror.surface)
    }
}
