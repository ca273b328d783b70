//! # embed-core
//!
//! Core library for embedding remote content into a host's surface tree.
//!
//! This crate contains:
//! - **Surface model**: `SurfaceHandle`, `Transaction`, `TransactionApplier`,
//!   and `LocalCompositor`, an in-memory surface tree
//! - **Platform**: traits for display resolution, surface allocation,
//!   mirroring and input routing
//! - **Input**: `InputReceiverGuard`, scoped input-receiver registration
//! - **Embedding**: `RemoteViewHost`, `DisplayMirror`, the `EmbeddingService`
//!   actor and the host-side `EmbeddedWindowHost`
//! - **Error**: typed, `thiserror`-based errors per operation

pub mod embed;
pub mod error;
pub mod input;
pub mod platform;
pub mod surface;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use embed::{
    AttachOutcome, ContentRoot, DisplayMirror, EmbeddedWindowHost, EmbeddingHandle,
    EmbeddingService, EmbeddingServiceConfig, RemoteViewHost, ServiceSnapshot, SessionId,
    SurfaceControlOutcome, SurfaceKind, SurfacePackage,
};
pub use error::{
    AttachError, CallbackDeliveryError, EmbedError, MirrorError, RelayoutError, TransactionError,
};
pub use input::InputReceiverGuard;
pub use platform::Platform;
pub use surface::{
    Display, DisplayId, Geometry, InputRoutingToken, LocalCompositor, MirrorPolicy, SurfaceHandle,
    SurfaceId, SurfaceState, Transaction,
};
