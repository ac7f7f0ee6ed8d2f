//! Uniform Manifold Approximation and Projection (UMAP).
//!
//! Builds a fuzzy simplicial set over the k-NN graph, initializes the
//! embedding with neighbor-smoothed random positions, then optimizes with
//! negative-sampling SGD. One callback per epoch.

use super::knn::{euclidean_distance, squared_euclidean_distance};
use super::{EmbeddingError, Reducer, Result};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gradient components are clipped to this magnitude.
const GRADIENT_CLIP: f64 = 4.0;

/// Smallest membership kept in the graph.
const MIN_MEMBERSHIP: f64 = 1e-10;

/// UMAP reducer.
#[derive(Debug, Clone)]
pub struct Umap {
    config: UmapBuilder,
    /// Last fitted embedding
    embedding: Option<Vec<Vec<f64>>>,
}

/// Weighted, symmetric k-NN graph.
#[derive(Debug, Clone)]
struct FuzzyGraph {
    n_points: usize,
    /// Directed edges (both directions present): (from, to, weight)
    edges: Vec<(usize, usize, f64)>,
    /// k nearest neighbors of each point
    neighbors: Vec<Vec<usize>>,
}

impl Default for Umap {
    fn default() -> Self {
        UmapBuilder::default().build()
    }
}

impl Umap {
    pub fn builder() -> UmapBuilder {
        UmapBuilder::default()
    }

    pub fn n_neighbors(&self) -> usize {
        self.config.n_neighbors
    }

    pub fn n_epochs(&self) -> usize {
        self.config.n_epochs
    }

    /// Embedding from the last successful fit.
    pub fn embedding(&self) -> Option<&[Vec<f64>]> {
        self.embedding.as_deref()
    }

    /// Fits without progress reporting.
    pub fn fit(&mut self, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fit_transform(data, &mut |_| {})
    }

    fn validate(&self, data: &[Vec<f64>]) -> Result<()> {
        let c = &self.config;
        if c.n_components == 0 {
            return Err(EmbeddingError::InvalidParameter(
                "n_components must be at least 1".to_string(),
            ));
        }
        if c.n_neighbors == 0 {
            return Err(EmbeddingError::InvalidParameter(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if c.n_epochs == 0 {
            return Err(EmbeddingError::InvalidParameter(
                "n_epochs must be at least 1".to_string(),
            ));
        }
        if !(c.min_dist > 0.0) || !(c.spread > 0.0) || c.min_dist > c.spread {
            return Err(EmbeddingError::InvalidParameter(format!(
                "need 0 < min_dist <= spread, got min_dist={} spread={}",
                c.min_dist, c.spread
            )));
        }
        if !(c.learning_rate > 0.0) {
            return Err(EmbeddingError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                c.learning_rate
            )));
        }

        if data.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let n = data.len();
        if n < c.n_neighbors + 1 {
            return Err(EmbeddingError::InsufficientData {
                min: c.n_neighbors + 1,
                got: n,
            });
        }
        let dim = data[0].len();
        if let Some(row) = data.iter().find(|row| row.len() != dim) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        Ok(())
    }

    /// Builds the fuzzy simplicial set (weighted k-NN graph).
    fn build_fuzzy_graph(&self, data: &[Vec<f64>]) -> FuzzyGraph {
        let n = data.len();
        let k = self.config.n_neighbors;

        let mut neighbors = vec![Vec::with_capacity(k); n];
        let mut knn_distances = vec![Vec::with_capacity(k); n];

        for i in 0..n {
            let mut dists: Vec<(usize, f64)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (j, euclidean_distance(&data[i], &data[j])))
                .collect();
            dists.sort_by(|a, b| a.1.total_cmp(&b.1));

            for &(j, d) in dists.iter().take(k) {
                neighbors[i].push(j);
                knn_distances[i].push(d);
            }
        }

        // Local connectivity: distance to the nearest neighbor
        let rho: Vec<f64> = knn_distances
            .iter()
            .map(|dists| dists.first().copied().unwrap_or(0.0))
            .collect();

        let target = (k as f64).log2();
        let sigma: Vec<f64> = (0..n)
            .map(|i| find_sigma(&knn_distances[i], rho[i], target))
            .collect();

        // Symmetrize with the fuzzy union a + b - ab
        let mut memberships: HashMap<(usize, usize), (f64, f64)> = HashMap::new();
        for i in 0..n {
            for (idx, &j) in neighbors[i].iter().enumerate() {
                let d = knn_distances[i][idx];
                let w = if d <= rho[i] {
                    1.0
                } else {
                    (-(d - rho[i]) / sigma[i]).exp()
                };
                if w <= MIN_MEMBERSHIP {
                    continue;
                }
                let entry = memberships.entry((i.min(j), i.max(j))).or_default();
                if i < j {
                    entry.0 = w;
                } else {
                    entry.1 = w;
                }
            }
        }

        let mut edges: Vec<(usize, usize, f64)> = memberships
            .into_iter()
            .filter_map(|((i, j), (w1, w2))| {
                let combined = w1 + w2 - w1 * w2;
                (combined > MIN_MEMBERSHIP).then_some((i, j, combined))
            })
            .flat_map(|(i, j, w)| [(i, j, w), (j, i, w)])
            .collect();
        // HashMap order is random; keep the SGD schedule reproducible
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        FuzzyGraph {
            n_points: n,
            edges,
            neighbors,
        }
    }

    /// Fits the curve 1 / (1 + a d^(2b)) to min_dist and spread.
    fn find_ab_params(&self) -> (f64, f64) {
        let UmapBuilder {
            min_dist, spread, ..
        } = self.config;
        let b = 1.0;
        let a = ((spread / min_dist).powf(b) - 1.0) / spread.powf(2.0 * b);
        (a.max(0.001), b)
    }

    /// Random positions smoothed toward neighbor averages.
    fn smoothed_init(&self, graph: &FuzzyGraph, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
        let dims = self.config.n_components;
        let mut embedding: Vec<Vec<f64>> = (0..graph.n_points)
            .map(|_| (0..dims).map(|_| rng.gen_range(-5.0..5.0)).collect())
            .collect();

        for _ in 0..10 {
            let previous = embedding.clone();
            for (i, point) in embedding.iter_mut().enumerate() {
                let neighbors = &graph.neighbors[i];
                if neighbors.is_empty() {
                    continue;
                }
                for (d, value) in point.iter_mut().enumerate() {
                    let avg = neighbors.iter().map(|&j| previous[j][d]).sum::<f64>()
                        / neighbors.len() as f64;
                    *value = 0.5 * previous[i][d] + 0.5 * avg;
                }
            }
        }
        embedding
    }

    /// Negative-sampling SGD, reporting each finished epoch.
    fn optimize(
        &self,
        embedding: &mut [Vec<f64>],
        graph: &FuzzyGraph,
        (a, b): (f64, f64),
        rng: &mut ChaCha8Rng,
        on_epoch: &mut dyn FnMut(usize),
    ) {
        let n = graph.n_points;
        let n_epochs = self.config.n_epochs;
        let negative_rate = self.config.negative_sample_rate;

        let max_w = graph.edges.iter().map(|e| e.2).fold(0.0, f64::max);
        let epochs_per_sample: Vec<f64> = graph.edges.iter().map(|&(_, _, w)| max_w / w).collect();
        let epochs_per_negative: Vec<f64> = epochs_per_sample
            .iter()
            .map(|&e| e / negative_rate.max(1) as f64)
            .collect();
        let mut next_sample = epochs_per_sample.clone();
        let mut next_negative = epochs_per_negative.clone();

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
            let now = epoch as f64;

            for (e, &(i, j, _)) in graph.edges.iter().enumerate() {
                if next_sample[e] > now {
                    continue;
                }

                // Attract along the edge
                let dist_sq = squared_euclidean_distance(&embedding[i], &embedding[j]);
                let dist = dist_sq.sqrt().max(0.001);
                let coeff = -2.0 * a * b * dist.powf(2.0 * b - 2.0) / (1.0 + a * dist.powf(2.0 * b));
                for d in 0..self.config.n_components {
                    let grad = (coeff * (embedding[i][d] - embedding[j][d]))
                        .clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                    embedding[i][d] += alpha * grad;
                    embedding[j][d] -= alpha * grad;
                }
                next_sample[e] += epochs_per_sample[e];

                // Repel from random points
                for _ in 0..negative_rate {
                    if next_negative[e] > now {
                        break;
                    }
                    let other = rng.gen_range(0..n);
                    if other == i {
                        continue;
                    }
                    let dist_sq = squared_euclidean_distance(&embedding[i], &embedding[other]);
                    let dist = dist_sq.sqrt().max(0.001);
                    let coeff = 2.0 * b / ((0.001 + dist_sq) * (1.0 + a * dist.powf(2.0 * b)));
                    for d in 0..self.config.n_components {
                        let grad = (coeff * (embedding[i][d] - embedding[other][d]))
                            .clamp(-GRADIENT_CLIP, GRADIENT_CLIP);
                        embedding[i][d] += alpha * grad;
                    }
                    next_negative[e] += epochs_per_negative[e];
                }
            }

            on_epoch(epoch + 1);
        }
    }
}

impl Reducer for Umap {
    fn fit_transform(
        &mut self,
        data: &[Vec<f64>],
        on_epoch: &mut dyn FnMut(usize),
    ) -> Result<Vec<Vec<f64>>> {
        self.validate(data)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let graph = self.build_fuzzy_graph(data);
        let mut embedding = self.smoothed_init(&graph, &mut rng);
        let ab = self.find_ab_params();

        self.optimize(&mut embedding, &graph, ab, &mut rng, on_epoch);

        if embedding.iter().flatten().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NumericalError(
                "embedding contains non-finite values".to_string(),
            ));
        }

        self.embedding = Some(embedding.clone());
        Ok(embedding)
    }

    fn n_components(&self) -> usize {
        self.config.n_components
    }
}

/// Binary search for the sigma whose membership sum matches `target`.
fn find_sigma(distances: &[f64], rho: f64, target: f64) -> f64 {
    let mut lo = 1e-10;
    let mut hi = 1e10;
    let mut sigma = 1.0;

    for _ in 0..64 {
        let sum: f64 = distances
            .iter()
            .map(|&d| if d > rho { (-(d - rho) / sigma).exp() } else { 1.0 })
            .sum();

        if (sum - target).abs() < 1e-5 {
            break;
        }
        if sum > target {
            hi = sigma;
        } else {
            lo = sigma;
        }
        sigma = (lo + hi) / 2.0;
    }
    sigma
}

/// UMAP configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapBuilder {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    pub seed: u64,
}

impl Default for UmapBuilder {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            n_epochs: 500,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            seed: 42,
        }
    }
}

impl UmapBuilder {
    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = n;
        self
    }

    pub fn n_neighbors(mut self, n: usize) -> Self {
        self.n_neighbors = n;
        self
    }

    pub fn min_dist(mut self, d: f64) -> Self {
        self.min_dist = d;
        self
    }

    pub fn spread(mut self, s: f64) -> Self {
        self.spread = s;
        self
    }

    pub fn n_epochs(mut self, n: usize) -> Self {
        self.n_epochs = n;
        self
    }

    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn negative_sample_rate(mut self, rate: usize) -> Self {
        self.negative_sample_rate = rate;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn build(self) -> Umap {
        Umap {
            config: self,
            embedding: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Uniform};

    fn clustered(n_clusters: usize, per_cluster: usize, dim: usize) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(12345);
        let noise = Uniform::new(-0.5, 0.5);
        (0..n_clusters)
            .flat_map(|c| {
                let center: Vec<f64> = (0..dim).map(|d| (c * 10 + d) as f64).collect();
                (0..per_cluster)
                    .map(|_| center.iter().map(|v| v + noise.sample(&mut rng)).collect())
                    .collect::<Vec<Vec<f64>>>()
            })
            .collect()
    }

    #[test]
    fn test_umap_basic() {
        let data = clustered(3, 30, 10);
        let mut umap = Umap::builder().n_neighbors(10).n_epochs(50).build();

        let result = umap.fit(&data).unwrap();

        assert_eq!(result.len(), 90);
        assert!(result.iter().all(|p| p.len() == 2));
        assert!(result.iter().flatten().all(|v| v.is_finite()));
        assert_eq!(umap.embedding().map(|e| e.len()), Some(90));
    }

    #[test]
    fn test_umap_3d() {
        let data = clustered(2, 30, 8);
        let mut umap = Umap::builder().n_components(3).n_neighbors(10).n_epochs(50).build();

        let result = umap.fit(&data).unwrap();
        assert!(result.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn test_epoch_callback_sequence() {
        let data = clustered(2, 20, 4);
        let mut umap = Umap::builder().n_neighbors(5).n_epochs(12).build();
        let mut epochs = Vec::new();

        umap.fit_transform(&data, &mut |e| epochs.push(e)).unwrap();

        assert_eq!(epochs, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_embedding() {
        let data = clustered(2, 20, 4);
        let a = Umap::builder().n_neighbors(5).n_epochs(20).seed(9).build().fit(&data).unwrap();
        let b = Umap::builder().n_neighbors(5).n_epochs(20).seed(9).build().fit(&data).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_epochs_for_small_inputs() {
        let umap = Umap::default();
        assert_eq!(umap.n_epochs(), 500);
        assert_eq!(umap.n_components(), 2);
    }

    #[test]
    fn test_umap_insufficient_data() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert!(matches!(
            Umap::default().fit(&data),
            Err(EmbeddingError::InsufficientData { min: 16, got: 2 })
        ));
    }

    #[test]
    fn test_umap_rejects_bad_input() {
        assert!(matches!(Umap::default().fit(&[]), Err(EmbeddingError::EmptyInput)));

        let mut data = clustered(1, 20, 3);
        data[7].push(1.0);
        assert!(matches!(
            Umap::builder().n_neighbors(5).build().fit(&data),
            Err(EmbeddingError::DimensionMismatch { expected: 3, got: 4 })
        ));

        let data = clustered(1, 20, 3);
        for mut umap in [
            Umap::builder().n_neighbors(5).n_components(0).build(),
            Umap::builder().n_neighbors(5).min_dist(2.0).build(),
            Umap::builder().n_neighbors(5).n_epochs(0).build(),
        ] {
            assert!(matches!(umap.fit(&data), Err(EmbeddingError::InvalidParameter(_))));
        }
    }

    #[test]
    fn test_find_sigma_hits_target() {
        let distances = [1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5];
        let target = (distances.len() as f64).log2();
        let sigma = find_sigma(&distances, 1.0, target);

        let sum: f64 = distances
            .iter()
            .map(|&d| if d > 1.0 { (-(d - 1.0) / sigma).exp() } else { 1.0 })
            .sum();
        assert!((sum - target).abs() < 1e-3);
    }
}
