//! Platform collaborators consumed by the embedding service.
//!
//! The service never talks to a compositor directly; it goes through
//! these traits. [`LocalCompositor`](crate::surface::LocalCompositor)
//! implements all of them in memory.

use crate::error::TransactionError;
use crate::surface::{
    Display, DisplayId, InputReceiver, InputRoutingToken, SurfaceContent, SurfaceHandle,
    SurfaceSpec, TransactionApplier,
};

/// Resolves display ids to displays.
pub trait DisplayResolver {
    fn resolve_display(&self, id: DisplayId) -> Option<Display>;
}

/// Allocates and draws surfaces. Allocation does not show anything;
/// visibility only changes through a transaction.
pub trait SurfaceAllocator {
    fn create_surface(&self, spec: SurfaceSpec) -> Result<SurfaceHandle, TransactionError>;

    /// Whether the handle still refers to a live surface. Must be asked
    /// again before every use; the answer can change at any time.
    fn is_valid(&self, surface: &SurfaceHandle) -> bool;

    /// Replace the surface's buffer content and post it.
    fn draw(&self, surface: &SurfaceHandle, content: SurfaceContent)
    -> Result<(), TransactionError>;
}

/// Low-level display mirroring primitive.
///
/// Returns `None` when the platform refuses. A returned handle may
/// still be invalid if the display went away concurrently.
pub trait MirrorPrimitive {
    fn mirror_display(&self, id: DisplayId) -> Option<SurfaceHandle>;
}

/// Input routing registration keyed by surface.
pub trait InputRegistry {
    fn register_input_receiver(
        &self,
        token: InputRoutingToken,
        surface: &SurfaceHandle,
        receiver: InputReceiver,
    );

    fn unregister_input_receiver(&self, surface: &SurfaceHandle);
}

/// Everything the embedding service needs from the platform.
pub trait Platform:
    DisplayResolver
    + SurfaceAllocator
    + MirrorPrimitive
    + InputRegistry
    + TransactionApplier
    + Send
    + Sync
{
}

impl<T> Platform for T where
    T: DisplayResolver
        + SurfaceAllocator
        + MirrorPrimitive
        + InputRegistry
        + TransactionApplier
        + Send
        + Sync
{
}
