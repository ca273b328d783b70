//! Domain-specific error types for the embedding service.
//!
//! Every operation directed at the service returns a typed error scoped to
//! that operation. Nothing here is fatal to the service itself.

use thiserror::Error;

use crate::surface::{DisplayId, SurfaceId};

/// Failure to attach a remote view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The display the remote view should live on could not be resolved.
    #[error("display {0} could not be resolved")]
    NoDisplay(DisplayId),

    /// Width or height was not strictly positive.
    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: i32, height: i32 },

    /// A surface package was requested before any content was set.
    #[error("remote view has no content yet")]
    ContentNotSet,

    /// The root surface could not be built or shown.
    #[error("surface setup failed: {0}")]
    Surface(#[from] TransactionError),
}

/// Failure to relayout the live remote view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayoutError {
    /// No remote view is currently attached.
    #[error("no active remote view host")]
    NoActiveHost,

    /// Width or height was not strictly positive.
    #[error("invalid geometry {width}x{height}")]
    InvalidGeometry { width: i32, height: i32 },

    /// The resize transaction was rejected.
    #[error("relayout transaction failed: {0}")]
    Surface(#[from] TransactionError),
}

/// Failure to attach a drawn or mirrored surface control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    /// Mirroring failed or produced an invalid handle. Nothing was applied.
    #[error("mirror of display {0} unavailable")]
    MirrorUnavailable(DisplayId),

    /// The platform refused to mirror the display.
    #[error("platform denied mirroring display {0}")]
    PlatformDenied(DisplayId),

    /// The host-supplied parent surface is not valid.
    #[error("parent surface {0} is not valid")]
    InvalidParent(SurfaceId),

    /// Creating, drawing or showing the child surface failed.
    #[error("surface transaction failed: {0}")]
    Surface(#[from] TransactionError),
}

/// A surface-tree transaction was rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The surface id is unknown to the tree.
    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),

    /// The surface was already removed; removed handles are terminal.
    #[error("surface {0} was already removed")]
    SurfaceRemoved(SurfaceId),

    /// Reparenting would make a surface its own ancestor.
    #[error("reparenting {child} under {parent} would create a cycle")]
    Cycle { child: SurfaceId, parent: SurfaceId },

    /// The buffer size is not strictly positive.
    #[error("invalid buffer size {width}x{height}")]
    InvalidSize { width: i32, height: i32 },
}

/// The host could not be notified of an outcome (its end is gone).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host unreachable while delivering {operation} result")]
pub struct CallbackDeliveryError {
    pub operation: &'static str,
}

/// Umbrella error returned by [`EmbeddingHandle`](crate::embed::EmbeddingHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    #[error(transparent)]
    Attach(#[from] AttachError),

    #[error(transparent)]
    Relayout(#[from] RelayoutError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    /// The service actor is no longer running.
    #[error("embedding service closed")]
    ServiceClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EmbedError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        EmbedError::ServiceClosed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for EmbedError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        EmbedError::ServiceClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = AttachError::InvalidGeometry {
            width: 0,
            height: 400,
        };
        assert!(e.to_string().contains("0x400"));

        let e = MirrorError::MirrorUnavailable(DisplayId(5));
        assert!(e.to_string().contains('5'));
    }

    #[test]
    fn from_transaction_error() {
        let e: MirrorError = TransactionError::UnknownSurface(SurfaceId(3)).into();
        assert!(matches!(e, MirrorError::Surface(_)));

        let e: EmbedError = RelayoutError::NoActiveHost.into();
        assert!(matches!(e, EmbedError::Relayout(RelayoutError::NoActiveHost)));
    }

    #[test]
    fn closed_channel_maps_to_service_closed() {
        let e: EmbedError = tokio::sync::mpsc::error::SendError(1u8).into();
        assert_eq!(e, EmbedError::ServiceClosed);
    }
}
