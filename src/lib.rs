//! Graph conversion and analysis of neuron skeletons

pub mod analysis;
pub mod cluster;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod intersect;
pub mod storage;
pub mod viz;

pub use anyhow::{anyhow, Result};
pub use error::GraphError;
