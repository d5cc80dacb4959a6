//! Exact f32 metrics for brute-force matching.
//!
//! Distances are ranked ascending, similarities descending. [`Metric::rank_key`]
//! folds both into a single "lower is better" key.

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance or similarity function used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\]. Zero vectors give 1.
    Cosine,
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
    /// Squared Euclidean distance (L2²). Range: \[0, ∞).
    Sqeuclidean,
    /// Inner product. A similarity: higher ranks first.
    #[serde(alias = "inner_product")]
    Dot,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Cosine,
        Metric::Euclidean,
        Metric::Sqeuclidean,
        Metric::Dot,
    ];

    /// Name used as the default score key on match documents.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Sqeuclidean => "sqeuclidean",
            Metric::Dot => "dot",
        }
    }

    /// True when larger scores mean closer documents.
    pub fn is_similarity(&self) -> bool {
        matches!(self, Metric::Dot)
    }

    /// Score of `b` against `a`. Both slices must have the same length.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Metric::Cosine => cosine_distance(a, b),
            Metric::Euclidean => squared_euclidean(a, b).sqrt(),
            Metric::Sqeuclidean => squared_euclidean(a, b),
            Metric::Dot => dot_product(a, b),
        }
    }

    /// Sort key where lower always ranks first.
    #[inline]
    pub fn rank_key(&self, score: f32) -> f32 {
        if self.is_similarity() {
            -score
        } else {
            score
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "sqeuclidean" => Ok(Metric::Sqeuclidean),
            "dot" | "inner_product" => Ok(Metric::Dot),
            other => Err(IndexError::InvalidParameter(format!(
                "unknown metric '{}'",
                other
            ))),
        }
    }
}

#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        1.0
    } else {
        1.0 - dot / denom
    }
}
