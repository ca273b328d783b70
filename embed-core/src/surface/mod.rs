//! Surface model: handles, transactions and the in-memory compositor.

pub mod compositor;
pub mod transaction;
pub mod types;

pub use compositor::{LocalCompositor, MirrorPolicy};
pub use transaction::{SurfaceOp, Transaction, TransactionApplier};
pub use types::{
    Color, Display, DisplayId, Geometry, InputEvent, InputReceiver, InputRoutingToken,
    SurfaceContent, SurfaceHandle, SurfaceId, SurfaceSpec, SurfaceState, TextRun,
};
