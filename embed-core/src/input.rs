//! Scoped input-receiver registration.

use std::sync::Arc;

use tracing::debug;

use crate::platform::Platform;
use crate::surface::{InputReceiver, InputRoutingToken, SurfaceHandle};

/// Keeps an input receiver registered on a surface for as long as the
/// guard lives. Dropping the guard unregisters it, on every path.
pub struct InputReceiverGuard {
    platform: Arc<dyn Platform>,
    surface: SurfaceHandle,
    token: InputRoutingToken,
}

impl InputReceiverGuard {
    /// Register `receiver` for events routed by `token` to `surface`.
    pub fn register(
        platform: Arc<dyn Platform>,
        token: InputRoutingToken,
        surface: &SurfaceHandle,
        receiver: InputReceiver,
    ) -> Self {
        platform.register_input_receiver(token, surface, receiver);
        debug!(%surface, %token, "input receiver registered");
        Self {
            platform,
            surface: surface.clone(),
            token,
        }
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn token(&self) -> InputRoutingToken {
        self.token
    }
}

impl Drop for InputReceiverGuard {
    fn drop(&mut self) {
        self.platform.unregister_input_receiver(&self.surface);
        debug!(surface = %self.surface, "input receiver unregistered");
    }
}
