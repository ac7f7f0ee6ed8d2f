//! Common types for the Warpfield environment abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Identifier of a node in the field.
///
/// Nodes created in a startup batch are named `node-<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a NodeId from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the id of the `index`-th node in a batch.
    pub fn indexed(index: usize) -> Self {
        Self(format!("node-{}", index))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Size of the rendering surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport, rejecting zero-sized surfaces.
    pub fn new(width: u32, height: u32) -> Result<Self, EnvError> {
        if width == 0 || height == 0 {
            return Err(EnvError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width divided by height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Maps pixel coordinates to normalized device coordinates.
    ///
    /// `x` grows to the right, `y` grows upward; both span `[-1, 1]`
    /// across the surface.
    pub fn to_ndc(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x / self.width as f64) * 2.0 - 1.0,
            -(y / self.height as f64) * 2.0 + 1.0,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A window or pointer event delivered by the host.
///
/// Pointer coordinates are in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    /// Primary button click (select / anchor)
    Click { x: f64, y: f64 },

    /// Pointer moved without a button held (hover)
    PointerMove { x: f64, y: f64 },

    /// Pointer moved with the primary button held (orbit)
    PointerDrag { dx: f64, dy: f64 },

    /// Scroll wheel, positive away from the user (dolly in)
    Wheel { delta: f64 },

    /// Surface resized
    Resize { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_node_id() {
        assert_eq!(NodeId::indexed(7).as_str(), "node-7");
        assert_eq!(NodeId::indexed(7), NodeId::from("node-7"));
    }

    #[test]
    fn test_viewport_rejects_zero() {
        assert!(Viewport::new(0, 10).is_err());
        assert!(Viewport::new(10, 0).is_err());
        assert!(Viewport::new(10, 10).is_ok());
    }

    #[test]
    fn test_ndc_corners() {
        let vp = Viewport::new(800, 600).unwrap();
        assert_eq!(vp.to_ndc(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(vp.to_ndc(800.0, 600.0), (1.0, -1.0));
        assert_eq!(vp.to_ndc(400.0, 300.0), (0.0, 0.0));
    }

    #[test]
    fn test_host_event_json_shape() {
        let json = r#"{"kind":"click","x":12.0,"y":34.0}"#;
        let event: HostEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, HostEvent::Click { x: 12.0, y: 34.0 });
    }
}
