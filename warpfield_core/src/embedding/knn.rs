//! Brute-force nearest-neighbor search.

use super::EmbeddingNode;

/// A neighbor and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub node: &'a EmbeddingNode,
    pub distance: f64,
}

/// Euclidean distance; NaN when the lengths differ.
#[inline]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::NAN;
    }
    squared_euclidean_distance(a, b).sqrt()
}

#[inline]
pub(crate) fn squared_euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// The `k` nodes closest to `query`, nearest first, with distances.
///
/// The query itself (same id) is never returned. Ties keep input order and
/// NaN distances sort last. Returns every other node when fewer than `k`
/// exist.
pub fn ranked_neighbors<'a>(
    nodes: &'a [EmbeddingNode],
    query: &EmbeddingNode,
    k: usize,
) -> Vec<Neighbor<'a>> {
    let mut ranked: Vec<Neighbor<'a>> = nodes
        .iter()
        .filter(|node| node.id != query.id)
        .map(|node| Neighbor {
            node,
            distance: euclidean_distance(&node.vector, &query.vector),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked.truncate(k);
    ranked
}

/// The `k` nodes closest to `query`, nearest first.
pub fn nearest_neighbors<'a>(
    nodes: &'a [EmbeddingNode],
    query: &EmbeddingNode,
    k: usize,
) -> Vec<&'a EmbeddingNode> {
    ranked_neighbors(nodes, query, k)
        .into_iter()
        .map(|n| n.node)
        .collect()
}
