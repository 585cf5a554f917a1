//! Partitioning errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the graph partitioning back-ends.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionerError {
    /// The resulting part sizes exceed the balance tolerance.
    #[error("partition unbalanced: largest part has {max_part} elements, limit is {limit}")]
    Unbalanced { max_part: usize, limit: usize },
    /// The configuration cannot be satisfied (zero parts, negative tolerance, ...).
    #[error("invalid partitioner configuration: {0}")]
    InvalidConfig(String),
    /// The external back-end (e.g. METIS) reported a failure.
    #[error("partitioner back-end failed: {0}")]
    Backend(String),
}
