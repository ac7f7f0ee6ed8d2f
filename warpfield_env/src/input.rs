//! Host input abstraction for the Warpfield render loop.

use crate::error::EnvError;
use crate::types::HostEvent;

/// Source of pointer and window events for one application instance.
///
/// # Implementations
///
/// - **Production**: `ChannelInput` - drained from a tokio channel fed by the host window
/// - **Simulation**: `ScriptedInput` - events released at virtual timestamps
///
/// # Event Flow
///
/// ```text
/// Host window                 HostEvents                  WarpApp::frame
///   |                             |                             |
///   |-- click(x, y) ------------->|                             |
///   |-- resize(w, h) ------------>|                             |
///   |                             |<-- poll() ------------------|
///   |                             |--- [Click, Resize] -------->|
/// ```
///
/// Events are handled synchronously at the start of the frame that polls
/// them, in arrival order.
pub trait HostEvents: Send {
    /// Drains every event that arrived since the previous poll.
    fn poll(&self) -> Vec<HostEvent>;
}

/// Marker trait for input sources that accept injected events.
///
/// Used by tests and the simulation harness to drive the app without a window.
pub trait InputInjector: Send + Sync {
    /// Queues an event for the next poll.
    fn inject(&self, event: HostEvent) -> Result<(), EnvError>;
}
