//! Ward minimum-variance agglomerative clustering
//!
//! The merge sequence comes from `kodama`; this module prepares its input
//! and maps the result into [`Linkage`].

use crate::cluster::{Linkage, LinkageStep};
use crate::error::GraphError;
use kodama::{linkage, Method};
use ndarray::{Array2, ArrayView2};

/// Pairwise Euclidean distances between the rows of `observations`
pub fn euclidean_rows(observations: ArrayView2<f64>) -> Array2<f64> {
    let n = observations.nrows();
    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let diff = &observations.row(i) - &observations.row(j);
            let dist = diff.dot(&diff).sqrt();
            out[[i, j]] = dist;
            out[[j, i]] = dist;
        }
    }
    out
}

/// Ward linkage over a square, symmetric dissimilarity matrix.
///
/// Only the upper triangle is read. Distances of the returned steps are
/// non-decreasing and each step's `left` is the smaller cluster id.
pub fn ward(dissimilarity: ArrayView2<f64>) -> Result<Linkage, GraphError> {
    let (n, m) = dissimilarity.dim();
    if n != m {
        return Err(GraphError::InvalidMatrix(format!(
            "dissimilarity matrix must be square, got {}x{}",
            n, m
        )));
    }
    if n < 2 {
        return Err(GraphError::EmptyClusterInput { found: n });
    }
    if dissimilarity.iter().any(|d| !d.is_finite()) {
        return Err(GraphError::InvalidMatrix(
            "dissimilarity matrix contains non-finite values".to_string(),
        ));
    }

    let mut condensed = condense(dissimilarity);
    let dendrogram = linkage(&mut condensed, n, Method::Ward);

    let steps = dendrogram
        .steps()
        .iter()
        .map(|step| LinkageStep {
            left: step.cluster1.min(step.cluster2),
            right: step.cluster1.max(step.cluster2),
            distance: step.dissimilarity,
            size: step.size,
        })
        .collect();

    Ok(Linkage {
        observations: n,
        steps,
    })
}

/// Row-major upper triangle without the diagonal
fn condense(matrix: ArrayView2<f64>) -> Vec<f64> {
    let n = matrix.nrows();
    let mut condensed = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            condensed.push(matrix[[i, j]]);
        }
    }
    condensed
}
