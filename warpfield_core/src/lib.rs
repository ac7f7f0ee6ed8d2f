//! Warpfield Core - interactive 3D node field with a three-phase space warp
//!
//! Clicking a node makes it the **anchor**. Every other node is reassigned
//! to a random point on a shell around the origin, the anchor moves to the
//! origin, and the whole field animates there in three timed phases:
//! 1. **Pullback**: nodes hold, the camera recoils away from the anchor
//! 2. **Release**: nodes and camera snap most of the way in
//! 3. **Ease-out**: both settle slowly onto their final positions
//!
//! The camera follows rigidly, so the anchor ends framed at the center.
//!
//! Host concerns (clock, input, drawing) go through `warpfield_env` and the
//! [`Renderer`] trait, so the same application runs live or under the
//! deterministic simulator.

pub mod app;
pub mod camera;
pub mod easing;
pub mod embedding;
pub mod error;
pub mod layout;
pub mod node;
pub mod picking;
pub mod scene;
pub mod warp;

#[cfg(feature = "visualization")]
pub mod visualization;

// Re-export key types for convenience
pub use app::{AppConfig, WarpApp};
pub use camera::{Camera, OrbitControls};
pub use embedding::{
    generate_embedding_nodes, local_embedding, nearest_neighbors, EmbeddingError, EmbeddingNode,
    Reducer, Umap,
};
pub use error::WarpError;
pub use layout::{RandomShellLayout, TargetLayout};
pub use node::{Node, NodeSet};
pub use picking::{pick_nearest, Hit, Ray};
pub use scene::{Cursor, FrameView, NodeStyle, NullRenderer, Renderer, Scene};
pub use warp::{phase_at, Phase, PhaseSample, WarpController, WarpFrame, WarpTiming};

#[cfg(feature = "visualization")]
pub use visualization::RerunRenderer;
