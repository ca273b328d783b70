//! # Embedding
//!
//! Remote view hosting and display mirroring on behalf of a host
//! process.
//!
//! ## Sub-modules
//!
//! | Module        | Purpose                                               |
//! |---------------|-------------------------------------------------------|
//! | `remote_view` | Remote view host and the surface packages it exports  |
//! | `mirror`      | Display mirroring as one fallible constructor         |
//! | `service`     | Single-task actor serialising every host request      |
//! | `host`        | Host-side client that grafts packages when ready      |

pub mod host;
pub mod mirror;
pub mod remote_view;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────

pub use host::EmbeddedWindowHost;
pub use mirror::{DisplayMirror, MirrorBinding, MirroredSurface};
pub use remote_view::{ContentRoot, LayoutParams, RemoteViewHost, SessionId, SurfacePackage};
pub use service::{
    AttachOutcome, ChildSurfaceConfig, EmbeddingHandle, EmbeddingService, EmbeddingServiceConfig,
    ServiceSnapshot, SessionInfo, SurfaceControlOutcome, SurfaceKind,
};
