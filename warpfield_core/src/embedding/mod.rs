//! Embedding helpers: nearest-neighbor search and local UMAP projection.
//!
//! Standalone from the warp engine. A caller picks a query node, finds its
//! neighbors in the high-dimensional space, and projects those neighbors
//! down to 2D/3D with a [`Reducer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use warpfield_core::embedding::{generate_embedding_nodes, local_embedding, log_epoch, Umap};
//!
//! let nodes = generate_embedding_nodes(200, 32, &mut rng);
//! let projected = local_embedding(&nodes, &nodes[0], 20, Umap::default(), log_epoch).await?;
//! assert_eq!(projected.len(), 20);
//! ```

mod knn;
mod umap;

pub use knn::{euclidean_distance, nearest_neighbors, ranked_neighbors, Neighbor};
pub use umap::{Umap, UmapBuilder};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use warpfield_env::NodeId;

/// Error types for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Empty input: no vectors provided")]
    EmptyInput,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Insufficient data: need at least {min} samples, got {got}")]
    InsufficientData { min: usize, got: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Embedding worker interrupted: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// A point in the high-dimensional embedding space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingNode {
    pub id: NodeId,
    pub vector: Vec<f64>,
}

impl EmbeddingNode {
    pub fn new(id: NodeId, vector: Vec<f64>) -> Self {
        Self { id, vector }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Generates `count` nodes with `dimension` components uniform in `[-1, 1)`.
///
/// Ids are `node-0`, `node-1`, ...
pub fn generate_embedding_nodes<R: Rng + ?Sized>(
    count: usize,
    dimension: usize,
    rng: &mut R,
) -> Vec<EmbeddingNode> {
    (0..count)
        .map(|i| {
            let vector = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
            EmbeddingNode::new(NodeId::indexed(i), vector)
        })
        .collect()
}

/// Contract for iterative dimensionality reduction backends.
pub trait Reducer {
    /// Fits on `data` and returns one low-dimensional row per input row.
    ///
    /// `on_epoch` is called after every optimization epoch, 1-based.
    fn fit_transform(
        &mut self,
        data: &[Vec<f64>],
        on_epoch: &mut dyn FnMut(usize),
    ) -> Result<Vec<Vec<f64>>>;

    /// Output dimensionality.
    fn n_components(&self) -> usize;
}

/// Default epoch callback.
pub fn log_epoch(epoch: usize) {
    debug!("UMAP epoch {}", epoch);
}

/// Projects the `k` nearest neighbors of `query` with `reducer`.
///
/// The fit runs on a blocking worker. Rows come back in neighbor order
/// (nearest first). Once the worker has started it runs to completion even
/// if this future is dropped.
pub async fn local_embedding<R, F>(
    nodes: &[EmbeddingNode],
    query: &EmbeddingNode,
    k: usize,
    mut reducer: R,
    mut on_epoch: F,
) -> Result<Vec<Vec<f64>>>
where
    R: Reducer + Send + 'static,
    F: FnMut(usize) + Send + 'static,
{
    let vectors: Vec<Vec<f64>> = nearest_neighbors(nodes, query, k)
        .into_iter()
        .map(|n| n.vector.clone())
        .collect();

    debug!(
        "Local embedding for {}: {} neighbors -> {}D",
        query.id,
        vectors.len(),
        reducer.n_components()
    );

    tokio::task::spawn_blocking(move || reducer.fit_transform(&vectors, &mut on_epoch)).await?
}
