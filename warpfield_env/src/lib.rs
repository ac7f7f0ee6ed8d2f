//! Warpfield Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction that lets the Warpfield
//! application run against both a **Production** host (tokio, wall clock,
//! channel-fed pointer events) and a **Simulation** host (virtual clock,
//! scripted pointer events).
//!
//! # Core Concept: The Frame Reactor
//!
//! The application never touches a global clock or an event queue directly.
//! Everything that would introduce non-determinism is routed through here:
//! - Time (`now()`, `sleep()`)
//! - Host input (`poll()` for clicks, pointer moves, drags, resizes)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any warp layout
//! becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use warpfield_env::{WarpContext, HostEvents};
//!
//! async fn frame_loop<Ctx: WarpContext, In: HostEvents>(ctx: &Ctx, input: &In) {
//!     loop {
//!         for event in input.poll() {
//!             handle(event);
//!         }
//!         draw(ctx.now());
//!         ctx.sleep(Duration::from_millis(16)).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod input;
mod tokio_impl;
mod types;

pub use context::WarpContext;
pub use error::EnvError;
pub use input::{HostEvents, InputInjector};
pub use tokio_impl::{channel_input, ChannelInput, EventSender, TokioContext};
pub use types::{HostEvent, NodeId, Viewport};
