//! Graph representation and algorithms module

pub mod algorithms;
pub mod builder;
pub mod cache;
pub mod network;
pub mod skeleton;

pub use cache::GraphCache;
pub use network::{NetworkGraph, NeuronVertex};
pub use skeleton::{SkeletonGraph, TreeVertex};
