//! Similarity scoring for name matching
//!
//! Scores are on a 0-100 scale. Distances are `1 - score / 100`.

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::error::{ResolveError, Result};

/// Tolerance used when checking a supplied matrix for symmetry.
const SYMMETRY_EPSILON: f64 = 1e-9;

/// String similarity metric used to compare normalized names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Best-aligning substring match; tolerant of titles, initials and
    /// extra name parts. Token order matters.
    #[default]
    PartialRatio,
    /// Indel-normalized similarity of the whole strings
    Ratio,
    /// `Ratio` after sorting whitespace-separated tokens
    TokenSortRatio,
    /// Jaro-Winkler similarity
    JaroWinkler,
    /// 1 - Levenshtein distance / longer length
    NormalizedLevenshtein,
}

impl Scorer {
    /// Similarity in [0, 100].
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Scorer::PartialRatio => partial_ratio(a, b),
            Scorer::Ratio => ratio(a, b),
            Scorer::TokenSortRatio => token_sort_ratio(a, b),
            Scorer::JaroWinkler => jaro_winkler(a, b) * 100.0,
            Scorer::NormalizedLevenshtein => normalized_levenshtein(a, b) * 100.0,
        }
    }

    /// Distance in [0, 1].
    pub fn distance(self, a: &str, b: &str) -> f64 {
        (1.0 - self.score(a, b) / 100.0).clamp(0.0, 1.0)
    }

    /// Build the condensed pairwise distance matrix for a batch of names.
    ///
    /// Quadratic in the batch size; callers bound batches by partitioning.
    pub fn distance_matrix<S: AsRef<str>>(self, names: &[S]) -> DistanceMatrix {
        DistanceMatrix::from_fn(names.len(), |i, j| {
            self.distance(names[i].as_ref(), names[j].as_ref())
        })
    }
}

/// Partial-ratio similarity in [0, 100] between two normalized names.
pub fn similarity(a: &str, b: &str) -> f64 {
    Scorer::PartialRatio.score(a, b)
}

/// Partial-ratio distance matrix for a batch of normalized names.
pub fn pairwise_distance_matrix<S: AsRef<str>>(names: &[S]) -> DistanceMatrix {
    Scorer::PartialRatio.distance_matrix(names)
}

/// Indel-normalized similarity: `200 * LCS / (len(a) + len(b))`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    indel_ratio(&a, &b)
}

/// Best `ratio` of the shorter string against every same-length window of
/// the longer one, including windows clipped at either end.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Less => best_window_ratio(&a, &b),
        std::cmp::Ordering::Greater => best_window_ratio(&b, &a),
        std::cmp::Ordering::Equal => best_window_ratio(&a, &b).max(best_window_ratio(&b, &a)),
    }
}

/// `ratio` after sorting the whitespace-separated tokens of both strings.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn best_window_ratio(needle: &[char], haystack: &[char]) -> f64 {
    let m = needle.len();
    let n = haystack.len();

    let windows = (1..m)
        .map(|end| &haystack[..end])
        .chain((0..=n - m).map(|start| &haystack[start..start + m]))
        .chain((n - m + 1..n).map(|start| &haystack[start..]));

    let mut best: f64 = 0.0;
    for window in windows {
        best = best.max(indel_ratio(needle, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Longest common subsequence length, two-row dynamic programming.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Symmetric distance matrix with zero diagonal, stored condensed
/// (upper triangle, row-major) like scipy's `squareform` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrix {
    size: usize,
    condensed: Vec<f64>,
}

impl DistanceMatrix {
    /// Build from a distance function evaluated once per unordered pair.
    ///
    /// Values are clamped to [0, 1].
    pub fn from_fn(size: usize, mut distance: impl FnMut(usize, usize) -> f64) -> Self {
        let mut condensed = Vec::with_capacity(condensed_len(size));
        for i in 0..size {
            for j in (i + 1)..size {
                condensed.push(distance(i, j).clamp(0.0, 1.0));
            }
        }
        Self { size, condensed }
    }

    /// Validate and wrap a condensed vector for `size` items.
    pub fn from_condensed(size: usize, condensed: Vec<f64>) -> Result<Self> {
        let expected = condensed_len(size);
        if condensed.len() != expected {
            return Err(ResolveError::DimensionMismatch {
                expected,
                actual: condensed.len(),
            });
        }
        let matrix = Self { size, condensed };
        for i in 0..size {
            for j in (i + 1)..size {
                check_distance(i, j, matrix.get(i, j))?;
            }
        }
        Ok(matrix)
    }

    /// Validate and convert a square matrix.
    pub fn from_square(rows: &[Vec<f64>]) -> Result<Self> {
        let size = rows.len();
        for row in rows {
            if row.len() != size {
                return Err(ResolveError::DimensionMismatch {
                    expected: size,
                    actual: row.len(),
                });
            }
        }

        let mut condensed = Vec::with_capacity(condensed_len(size));
        for i in 0..size {
            if rows[i][i] != 0.0 {
                return Err(ResolveError::InvalidDistance {
                    row: i,
                    col: i,
                    value: rows[i][i],
                });
            }
            for j in (i + 1)..size {
                let value = check_distance(i, j, rows[i][j])?;
                if (value - rows[j][i]).abs() > SYMMETRY_EPSILON {
                    return Err(ResolveError::InvalidDistance {
                        row: j,
                        col: i,
                        value: rows[j][i],
                    });
                }
                condensed.push(value);
            }
        }

        Ok(Self { size, condensed })
    }

    /// Number of items (rows) in the matrix.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance between items `i` and `j`.
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            assert!(i < self.size, "index {} out of bounds for {}", i, self.size);
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.condensed[self.size * i - i * (i + 1) / 2 + (j - i - 1)]
    }

    pub fn condensed(&self) -> &[f64] {
        &self.condensed
    }

    /// Expand to a full square matrix.
    pub fn to_square(&self) -> Vec<Vec<f64>> {
        (0..self.size)
            .map(|i| (0..self.size).map(|j| self.get(i, j)).collect())
            .collect()
    }
}

fn condensed_len(size: usize) -> usize {
    size * size.saturating_sub(1) / 2
}

fn check_distance(row: usize, col: usize, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ResolveError::InvalidDistance { row, col, value })
    }
}
