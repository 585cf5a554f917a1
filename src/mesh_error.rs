//! MeshError: unified error type for mesh construction, partitioning and extraction.
//!
//! Every fallible public API returns `Result<_, MeshError>`. Errors raised inside a
//! collective operation are turned into a single group-wide verdict (see
//! [`crate::algs::collective::agree`]) so all ranks observe the same failure.

use crate::partitioning::error::PartitionerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unified error type for distributed mesh operations.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshError {
    /// The mesh descriptor or a scalar parameter failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// External mesh input is malformed.
    #[error("parse error: {0}")]
    Parse(String),
    /// The graph partitioner could not produce an acceptable partition.
    #[error("partitioning error: {0}")]
    Partitioning(#[from] PartitionerError),
    /// A collective exchange was missing data or violated the protocol.
    #[error("communication error (rank {rank}): {message}")]
    Communication { rank: usize, message: String },
}

impl MeshError {
    pub fn config(message: impl Into<String>) -> Self {
        MeshError::Configuration(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        MeshError::Parse(message.into())
    }

    pub fn comm(rank: usize, message: impl Into<String>) -> Self {
        MeshError::Communication {
            rank,
            message: message.into(),
        }
    }

    /// True for errors a caller may recover from by retrying with other settings.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MeshError::Partitioning(_))
    }
}

/// Stage of mesh construction an error is attributed to in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Ingest,
    HashScatter,
    Repartition,
    Overlap,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Generate => "mesh generation",
            Stage::Ingest => "mesh ingestion",
            Stage::HashScatter => "hash scatter",
            Stage::Repartition => "graph repartition",
            Stage::Overlap => "overlap extraction",
            Stage::Verify => "mesh verification",
        };
        f.write_str(name)
    }
}
