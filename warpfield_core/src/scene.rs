//! Presentation layer: node handles, styles, and the renderer seam.
//!
//! The scene holds one [`NodeHandle`] per node, in node order. The
//! application mirrors node state onto the handles; a [`Renderer`] draws
//! them. Nothing in here feeds back into the simulation.

use crate::camera::Camera;
use crate::error::WarpError;
use crate::node::{Node, NodeSet};
use crate::warp::WarpFrame;

use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warpfield_env::Viewport;

/// Dark blue-black space color.
pub const BACKGROUND_COLOR: u32 = 0x080217;

/// 24-bit color of a node in the default state.
pub const DEFAULT_COLOR: u32 = 0xffffff;

/// 24-bit color of the anchor.
pub const ANCHOR_COLOR: u32 = 0xff4444;

/// 24-bit color of a hovered node.
pub const HOVER_COLOR: u32 = 0x66bb6a;

/// Half-extent of the starfield cube.
const STARFIELD_EXTENT: f64 = 1000.0;

/// Visual state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStyle {
    #[default]
    Default,
    Anchor,
    Hover,
}

impl NodeStyle {
    pub fn color(&self) -> u32 {
        match self {
            NodeStyle::Default => DEFAULT_COLOR,
            NodeStyle::Anchor => ANCHOR_COLOR,
            NodeStyle::Hover => HOVER_COLOR,
        }
    }

    /// Color split into `[r, g, b]`.
    pub fn rgb(&self) -> [u8; 3] {
        let c = self.color();
        [(c >> 16) as u8, (c >> 8) as u8, c as u8]
    }
}

/// Pointer cursor shown over the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    #[default]
    Default,
    /// Something pickable is under the pointer
    Pointer,
}

/// Drawable counterpart of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHandle {
    pub position: Vector3<f64>,
    pub style: NodeStyle,
}

/// Everything a renderer draws.
#[derive(Debug, Clone)]
pub struct Scene {
    handles: Vec<NodeHandle>,
    stars: Vec<Vector3<f64>>,
    node_radius: f64,
    viewport: Viewport,
    cursor: Cursor,
}

impl Scene {
    /// Builds one default-styled handle per node.
    pub fn new(nodes: &NodeSet, node_radius: f64, viewport: Viewport) -> Self {
        let handles = nodes
            .iter()
            .map(|n| NodeHandle {
                position: n.position,
                style: NodeStyle::Default,
            })
            .collect();
        Self {
            handles,
            stars: Vec::new(),
            node_radius,
            viewport,
            cursor: Cursor::Default,
        }
    }

    /// Scatters `count` background stars in a large cube.
    pub fn with_starfield<R: Rng + ?Sized>(mut self, count: usize, rng: &mut R) -> Self {
        self.stars = (0..count)
            .map(|_| {
                Vector3::new(
                    (rng.gen::<f64>() - 0.5) * 2.0 * STARFIELD_EXTENT,
                    (rng.gen::<f64>() - 0.5) * 2.0 * STARFIELD_EXTENT,
                    (rng.gen::<f64>() - 0.5) * 2.0 * STARFIELD_EXTENT,
                )
            })
            .collect();
        self
    }

    /// Copies a node's position onto its handle.
    pub fn sync_node(&mut self, index: usize, node: &Node) {
        if let Some(handle) = self.handles.get_mut(index) {
            handle.position = node.position;
        }
    }

    pub fn set_style(&mut self, index: usize, style: NodeStyle) {
        if let Some(handle) = self.handles.get_mut(index) {
            handle.style = style;
        }
    }

    pub fn handles(&self) -> &[NodeHandle] {
        &self.handles
    }

    pub fn handle(&self, index: usize) -> Option<&NodeHandle> {
        self.handles.get(index)
    }

    pub fn stars(&self) -> &[Vector3<f64>] {
        &self.stars
    }

    pub fn node_radius(&self) -> f64 {
        self.node_radius
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }
}

/// What a renderer sees for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Frame counter, starting at 0
    pub frame: u64,

    /// Context time of the frame
    pub time: Duration,

    pub scene: &'a Scene,
    pub camera: &'a Camera,

    /// Orbit target the camera looks at
    pub look_at: Vector3<f64>,

    /// Warp state after this frame's update, if a warp ran
    pub warp: Option<WarpFrame>,
}

/// Draws frames. One call per display refresh.
pub trait Renderer {
    fn render(&mut self, view: &FrameView<'_>) -> Result<(), WarpError>;
}

/// Renderer that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _view: &FrameView<'_>) -> Result<(), WarpError> {
        Ok(())
    }
}
