//! Configuration management for the skeleton graph analyzer

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How distances to the root are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    /// Compute the full all-pairs matrix, then read the root's row
    FullMatrix,
    /// Run a single Dijkstra search from the root
    SingleSource,
}

/// What the synapse-restricted distance matrix represents to Ward clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WardInput {
    /// Each row is an observation vector; rows are compared by Euclidean distance
    Observations,
    /// The matrix is used directly as pairwise dissimilarities
    Dissimilarity,
}

/// Default configuration for the analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Network edges weaker than this are dropped
    pub threshold: u32,

    /// Network edge weights above this are capped (matrix input only)
    pub cutoff: Option<u32>,

    /// Only report distances for synapse-bearing nodes
    pub synapses_only: bool,

    /// Distance-to-root strategy
    pub distance_method: DistanceMethod,

    /// Interpretation of the clustering input
    pub ward_input: WardInput,

    /// Render a dendrogram + heatmap after clustering
    pub plot: bool,

    /// Maximum number of vertices on an enumerated path
    pub max_path_len: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: 1,
            cutoff: None,
            synapses_only: false,
            distance_method: DistanceMethod::SingleSource,
            ward_input: WardInput::Observations,
            plot: false,
            max_path_len: None,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}
