pub mod geographic;
pub mod kmeans;

pub use geographic::{GeographicCluster, GeographicClusterer};
