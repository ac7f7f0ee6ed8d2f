//! Node records and the anchor-exclusive node set.
//!
//! A [`Node`] is plain simulation state. Its on-screen counterpart lives in
//! the [`Scene`](crate::scene::Scene) at the same index and is kept in sync
//! by the application.

use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use warpfield_env::NodeId;

/// A point in the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,

    /// Current position (what gets drawn)
    pub position: Vector3<f64>,

    /// Position the active warp interpolates from
    pub original_position: Vector3<f64>,

    /// Position the active warp interpolates to
    pub target_position: Vector3<f64>,

    /// Whether this node is the camera's focal anchor
    pub is_anchor: bool,

    /// Whether this node is moving under the active warp
    pub is_warping: bool,
}

impl Node {
    /// Creates a resting node at the given position.
    pub fn new(id: NodeId, position: Vector3<f64>) -> Self {
        Self {
            id,
            position,
            original_position: position,
            target_position: position,
            is_anchor: false,
            is_warping: false,
        }
    }

    /// Moves the node along its warp path.
    ///
    /// `t = 0` is the original position, `t = 1` the target. Values outside
    /// `[0, 1]` extrapolate.
    pub fn interpolate(&mut self, t: f64) {
        self.position = self.original_position.lerp(&self.target_position, t);
    }

    /// Snaps to the target and makes it the new resting position.
    pub fn settle(&mut self) {
        self.position = self.target_position;
        self.original_position = self.position;
        self.is_warping = false;
    }
}

/// The fixed batch of nodes with at most one anchor.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: Vec<Node>,
    anchor: Option<usize>,
}

impl NodeSet {
    /// Wraps existing nodes. Any anchor flags already set are cleared.
    pub fn new(mut nodes: Vec<Node>) -> Self {
        for node in &mut nodes {
            node.is_anchor = false;
        }
        Self {
            nodes,
            anchor: None,
        }
    }

    /// Generates `count` nodes uniformly inside a cube of side `space`
    /// centred on the origin.
    pub fn generate<R: Rng + ?Sized>(count: usize, space: f64, rng: &mut R) -> Self {
        let nodes = (0..count)
            .map(|i| {
                let position = Vector3::new(
                    (rng.gen::<f64>() - 0.5) * space,
                    (rng.gen::<f64>() - 0.5) * space,
                    (rng.gen::<f64>() - 0.5) * space,
                );
                Node::new(NodeId::indexed(i), position)
            })
            .collect();
        Self::new(nodes)
    }

    /// Marks `index` as the anchor, clearing the previous one.
    ///
    /// Returns the index of the previous anchor, if it changed.
    /// Out-of-range indices leave the set untouched and return `None`.
    pub fn set_anchor(&mut self, index: usize) -> Option<usize> {
        if index >= self.nodes.len() {
            return None;
        }
        let previous = self.anchor.filter(|&prev| prev != index);
        if let Some(prev) = previous {
            self.nodes[prev].is_anchor = false;
        }
        self.nodes[index].is_anchor = true;
        self.anchor = Some(index);
        previous
    }

    /// Index of the current anchor.
    pub fn anchor_index(&self) -> Option<usize> {
        self.anchor
    }

    /// The current anchor.
    pub fn anchor(&self) -> Option<&Node> {
        self.anchor.map(|i| &self.nodes[i])
    }

    /// Number of nodes flagged anchor (0 or 1 by construction).
    pub fn anchor_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_anchor).count()
    }

    /// Number of nodes still moving.
    pub fn warping_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_warping).count()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Finds a node by id.
    pub fn position_of(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| &n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Mutable access to node state.
    ///
    /// Anchor flags must go through [`set_anchor`](Self::set_anchor); this is
    /// for positions and warp flags.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    pub fn as_slice(&self) -> &[Node] {
        &self.nodes
    }
}
