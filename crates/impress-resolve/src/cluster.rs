//! Average-linkage agglomerative clustering
//!
//! The dendrogram is built with the nearest-neighbor chain algorithm, which
//! is exact for average linkage and runs in O(n²) time over an n×n working
//! matrix. Cutting at a distance threshold keeps every merge whose linkage
//! distance is `<= threshold` and drops the rest, the same flat clustering
//! as scipy's `fcluster(..., criterion="distance")`.
//!
//! # Labels
//!
//! Flat labels are 0-based and numbered by the first leaf (in batch order)
//! that belongs to each cluster. They are local to one batch; callers remap
//! them to global cluster ids.

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::similarity::DistanceMatrix;

/// One row of a linkage: two nodes joined at a distance.
///
/// Node ids follow scipy: leaves are `0..n`, the node created by merge `k`
/// is `n + k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Number of leaves under the new node
    pub size: usize,
}

/// Dendrogram for one batch, kept for diagnostics and visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linkage {
    leaves: usize,
    merges: Vec<Merge>,
}

impl Linkage {
    /// Build the average-linkage (UPGMA) dendrogram of a distance matrix.
    pub fn average(matrix: &DistanceMatrix) -> Result<Self> {
        let n = matrix.len();
        if n == 0 {
            return Err(ResolveError::EmptyMatrix);
        }

        // Working distances between active clusters, indexed by slot. A slot
        // always contains the leaf with the same index.
        let mut dist = matrix.to_square();
        let mut size = vec![1usize; n];
        let mut height = vec![0.0f64; n];
        let mut active = vec![true; n];
        let mut joins: Vec<(usize, usize, f64)> = Vec::with_capacity(n.saturating_sub(1));
        let mut chain: Vec<usize> = Vec::with_capacity(n);

        for _ in 1..n {
            if chain.is_empty() {
                let first = active
                    .iter()
                    .position(|&a| a)
                    .ok_or(ResolveError::EmptyMatrix)?;
                chain.push(first);
            }

            let (x, y) = loop {
                let x = chain[chain.len() - 1];
                let prev = if chain.len() >= 2 {
                    Some(chain[chain.len() - 2])
                } else {
                    None
                };

                // Prefer the previous chain element on ties so the chain terminates
                let (mut nearest, mut best) = match prev {
                    Some(p) => (p, dist[x][p]),
                    None => (x, f64::INFINITY),
                };
                for k in 0..n {
                    if k != x && active[k] && dist[x][k] < best {
                        best = dist[x][k];
                        nearest = k;
                    }
                }

                if nearest == x {
                    return Err(ResolveError::DimensionMismatch {
                        expected: n,
                        actual: joins.len() + 1,
                    });
                }
                if Some(nearest) == prev {
                    chain.truncate(chain.len() - 2);
                    break (x, nearest);
                }
                chain.push(nearest);
            };

            // Monotone heights keep children ahead of parents after sorting
            let joined_at = dist[x][y].max(height[x]).max(height[y]);
            joins.push((x, y, joined_at));

            let (sx, sy) = (size[x] as f64, size[y] as f64);
            for k in 0..n {
                if k != x && k != y && active[k] {
                    let updated = (sx * dist[x][k] + sy * dist[y][k]) / (sx + sy);
                    dist[y][k] = updated;
                    dist[k][y] = updated;
                }
            }
            active[x] = false;
            size[y] += size[x];
            height[y] = joined_at;
        }

        joins.sort_by(|a, b| a.2.total_cmp(&b.2));
        Ok(Self::from_joins(n, &joins))
    }

    /// Assign scipy node ids to leaf-level joins sorted by distance.
    fn from_joins(n: usize, joins: &[(usize, usize, f64)]) -> Self {
        let mut parent: Vec<usize> = (0..n).collect();
        let mut node: Vec<usize> = (0..n).collect();
        let mut members = vec![1usize; n];
        let mut merges = Vec::with_capacity(joins.len());

        for (k, &(a, b, distance)) in joins.iter().enumerate() {
            let ra = find(&mut parent, a);
            let rb = find(&mut parent, b);
            let (na, nb) = (node[ra], node[rb]);

            parent[ra] = rb;
            members[rb] += members[ra];
            node[rb] = n + k;

            merges.push(Merge {
                left: na.min(nb),
                right: na.max(nb),
                distance,
                size: members[rb],
            });
        }

        Self { leaves: n, merges }
    }

    /// Number of leaves (batch size).
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Merges in non-decreasing distance order.
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat cluster labels with every merge at distance `<= threshold` applied.
    pub fn cut(&self, threshold: f64) -> Vec<usize> {
        let n = self.leaves;
        let mut parent: Vec<usize> = (0..n).collect();

        // Any leaf under each node, used as its union-find handle
        let mut handle: Vec<usize> = (0..n).collect();
        handle.reserve(self.merges.len());

        for merge in &self.merges {
            let (a, b) = (handle[merge.left], handle[merge.right]);
            handle.push(a);
            if merge.distance <= threshold {
                let ra = find(&mut parent, a);
                let rb = find(&mut parent, b);
                if ra != rb {
                    parent[ra] = rb;
                }
            }
        }

        let mut label_of_root = vec![usize::MAX; n];
        let mut next_label = 0;
        (0..n)
            .map(|leaf| {
                let root = find(&mut parent, leaf);
                if label_of_root[root] == usize::MAX {
                    label_of_root[root] = next_label;
                    next_label += 1;
                }
                label_of_root[root]
            })
            .collect()
    }

    /// Number of flat clusters produced by `cut(threshold)`.
    pub fn cluster_count(&self, threshold: f64) -> usize {
        let merged = self
            .merges
            .iter()
            .filter(|m| m.distance <= threshold)
            .count();
        self.leaves - merged
    }

    /// Rows in scipy's `(left, right, distance, size)` layout.
    pub fn to_rows(&self) -> Vec<[f64; 4]> {
        self.merges
            .iter()
            .map(|m| [m.left as f64, m.right as f64, m.distance, m.size as f64])
            .collect()
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Reject thresholds that cannot cut a dendrogram.
pub(crate) fn check_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(ResolveError::InvalidThreshold(threshold))
    }
}

/// Average-linkage clusterer cut at a fixed distance threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HierarchicalClusterer {
    threshold: f64,
}

impl HierarchicalClusterer {
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            threshold: check_threshold(threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Label every item of the batch; an empty batch yields no labels.
    pub fn cluster(&self, matrix: &DistanceMatrix) -> Result<Vec<usize>> {
        Ok(self.cluster_with_linkage(matrix)?.0)
    }

    /// Like [`cluster`](Self::cluster), also returning the dendrogram.
    pub fn cluster_with_linkage(
        &self,
        matrix: &DistanceMatrix,
    ) -> Result<(Vec<usize>, Option<Linkage>)> {
        if matrix.is_empty() {
            return Ok((Vec::new(), None));
        }
        let linkage = Linkage::average(matrix)?;
        Ok((linkage.cut(self.threshold), Some(linkage)))
    }
}

/// Cluster a batch at `threshold`, see [`HierarchicalClusterer`].
pub fn cluster(matrix: &DistanceMatrix, threshold: f64) -> Result<Vec<usize>> {
    HierarchicalClusterer::new(threshold)?.cluster(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::pairwise_distance_matrix;

    /// Points 0, 1, 5, 6 on a line, distances scaled by 1/10.
    fn line_matrix() -> DistanceMatrix {
        let points = [0.0f64, 1.0, 5.0, 6.0];
        DistanceMatrix::from_fn(points.len(), |i, j| (points[i] - points[j]).abs() / 10.0)
    }

    #[test]
    fn test_linkage_matches_scipy_layout() {
        let linkage = Linkage::average(&line_matrix()).unwrap();
        let rows = linkage.to_rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], [0.0, 1.0, 0.1, 2.0]);
        assert_eq!(rows[1], [2.0, 3.0, 0.1, 2.0]);
        assert_eq!(rows[2][0], 4.0);
        assert_eq!(rows[2][1], 5.0);
        assert!((rows[2][2] - 0.5).abs() < 1e-12);
        assert_eq!(rows[2][3], 4.0);
    }

    #[test]
    fn test_cut_levels() {
        let linkage = Linkage::average(&line_matrix()).unwrap();
        assert_eq!(linkage.cut(0.05), vec![0, 1, 2, 3]);
        assert_eq!(linkage.cut(0.2), vec![0, 0, 1, 1]);
        assert_eq!(linkage.cut(0.5), vec![0, 0, 0, 0]);
        assert_eq!(linkage.cluster_count(0.2), 2);
    }

    #[test]
    fn test_merge_at_exact_threshold() {
        let linkage = Linkage::average(&line_matrix()).unwrap();
        assert_eq!(linkage.cut(0.1), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_average_not_single_linkage() {
        // Single linkage would chain a-b-c at 0.2; the average of a-c is 0.6
        let rows = vec![
            vec![0.0, 0.2, 1.0],
            vec![0.2, 0.0, 0.2],
            vec![1.0, 0.2, 0.0],
        ];
        let matrix = DistanceMatrix::from_square(&rows).unwrap();
        let labels = cluster(&matrix, 0.3).unwrap();
        assert_eq!(labels.iter().filter(|&&l| l == labels[1]).count(), 2);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_empty_and_single_batches() {
        let clusterer = HierarchicalClusterer::new(0.15).unwrap();
        let empty = DistanceMatrix::from_fn(0, |_, _| 0.0);
        assert_eq!(clusterer.cluster(&empty).unwrap(), Vec::<usize>::new());
        let single = DistanceMatrix::from_fn(1, |_, _| 0.0);
        assert_eq!(clusterer.cluster(&single).unwrap(), vec![0]);
    }

    #[test]
    fn test_linkage_of_empty_matrix_fails() {
        let empty = DistanceMatrix::from_fn(0, |_, _| 0.0);
        assert_eq!(Linkage::average(&empty), Err(ResolveError::EmptyMatrix));
    }

    #[test]
    fn test_identical_names_single_cluster() {
        let matrix = pairwise_distance_matrix(&["paris", "paris", "paris", "paris"]);
        assert_eq!(cluster(&matrix, 0.0).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_invalid_threshold() {
        assert_eq!(
            HierarchicalClusterer::new(-0.1),
            Err(ResolveError::InvalidThreshold(-0.1))
        );
        assert!(HierarchicalClusterer::new(f64::NAN).is_err());
    }

    #[test]
    fn test_labels_follow_first_occurrence() {
        let matrix = pairwise_distance_matrix(&["berlin", "paris", "berlin", "paris"]);
        assert_eq!(cluster(&matrix, 0.2).unwrap(), vec![0, 1, 0, 1]);
    }
}
