//! Atomic batches of surface-tree mutations.
//!
//! A [`Transaction`] is an ordered list of [`SurfaceOp`]s. The
//! [`TransactionApplier`] commits it as a whole: either every op is
//! applied or none is, and no reader of the tree observes a partial
//! commit. Callers must not put a removed handle into a transaction.

use crate::error::TransactionError;
use crate::surface::types::SurfaceHandle;

/// A single mutation on one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Show(SurfaceHandle),
    Hide(SurfaceHandle),
    /// Move `child` under `parent`, or detach it when `parent` is `None`.
    Reparent {
        child: SurfaceHandle,
        parent: Option<SurfaceHandle>,
    },
    /// Change the buffer size of a surface.
    Resize {
        surface: SurfaceHandle,
        width: i32,
        height: i32,
    },
    /// Remove the surface and its subtree. Terminal.
    Remove(SurfaceHandle),
}

impl SurfaceOp {
    /// The surface this op mutates.
    pub fn target(&self) -> &SurfaceHandle {
        match self {
            SurfaceOp::Show(h) | SurfaceOp::Hide(h) | SurfaceOp::Remove(h) => h,
            SurfaceOp::Reparent { child, .. } => child,
            SurfaceOp::Resize { surface, .. } => surface,
        }
    }
}

/// Ordered, atomic batch of surface ops.
///
/// ```
/// # use embed_core::surface::{SurfaceHandle, SurfaceId, Transaction};
/// let child = SurfaceHandle::from_id(SurfaceId(2));
/// let parent = SurfaceHandle::from_id(SurfaceId(1));
/// let txn = Transaction::new().show(&child).reparent(&child, Some(&parent));
/// assert_eq!(txn.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    ops: Vec<SurfaceOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(mut self, surface: &SurfaceHandle) -> Self {
        self.ops.push(SurfaceOp::Show(surface.clone()));
        self
    }

    pub fn hide(mut self, surface: &SurfaceHandle) -> Self {
        self.ops.push(SurfaceOp::Hide(surface.clone()));
        self
    }

    pub fn reparent(mut self, child: &SurfaceHandle, parent: Option<&SurfaceHandle>) -> Self {
        self.ops.push(SurfaceOp::Reparent {
            child: child.clone(),
            parent: parent.cloned(),
        });
        self
    }

    pub fn resize(mut self, surface: &SurfaceHandle, width: i32, height: i32) -> Self {
        self.ops.push(SurfaceOp::Resize {
            surface: surface.clone(),
            width,
            height,
        });
        self
    }

    /// Remove a surface. Takes the handle by value: once removed it must
    /// not be used again.
    pub fn remove(mut self, surface: SurfaceHandle) -> Self {
        self.ops.push(SurfaceOp::Remove(surface));
        self
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The sole mutator of surface-tree state.
pub trait TransactionApplier {
    /// Commit every op in order, atomically.
    fn apply(&self, txn: Transaction) -> Result<(), TransactionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::types::SurfaceId;

    #[test]
    fn builder_preserves_order() {
        let a = SurfaceHandle::from_id(SurfaceId(1));
        let b = SurfaceHandle::from_id(SurfaceId(2));
        let txn = Transaction::new()
            .show(&b)
            .reparent(&b, Some(&a))
            .resize(&b, 10, 20)
            .remove(b.clone());

        let targets: Vec<_> = txn.ops().iter().map(|op| op.target().id()).collect();
        assert_eq!(targets, vec![SurfaceId(2); 4]);
        assert!(matches!(txn.ops()[0], SurfaceOp::Show(_)));
        assert!(matches!(txn.ops()[3], SurfaceOp::Remove(_)));
    }

    #[test]
    fn empty_transaction() {
        assert!(Transaction::new().is_empty());
    }
}
