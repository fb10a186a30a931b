//! Hierarchical clustering module

pub mod dendrogram;
pub mod ward;

use serde::{Deserialize, Serialize};

pub use ward::{euclidean_rows, ward};

/// One merge of a hierarchical clustering.
///
/// Observations are clusters `0..n`; the merge at step `i` creates cluster
/// `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkageStep {
    /// Smaller of the two merged cluster ids
    pub left: usize,
    /// Larger of the two merged cluster ids
    pub right: usize,
    /// Dissimilarity at which the merge happened
    pub distance: f64,
    /// Number of observations in the new cluster
    pub size: usize,
}

/// Merge sequence of an agglomerative clustering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linkage {
    /// Number of original observations
    pub observations: usize,
    pub steps: Vec<LinkageStep>,
}

impl Linkage {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Rows of `[left, right, distance, size]`, the usual linkage matrix layout
    pub fn to_matrix(&self) -> ndarray::Array2<f64> {
        let mut matrix = ndarray::Array2::zeros((self.steps.len(), 4));
        for (i, step) in self.steps.iter().enumerate() {
            matrix[[i, 0]] = step.left as f64;
            matrix[[i, 1]] = step.right as f64;
            matrix[[i, 2]] = step.distance;
            matrix[[i, 3]] = step.size as f64;
        }
        matrix
    }
}
