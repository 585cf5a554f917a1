//! Entry-point for graph partitioning of the element dual graph.
//!
//! [`partition`] dispatches to the native graph-growing partitioner or to
//! METIS, then checks the balance of the result. The distributed driver in
//! [`crate::algs::distribute`] runs it on one rank and relabels the result
//! with [`remap::remap_to_current`] before migrating elements.

pub mod error;
pub mod graph_growing;
pub mod metrics;
pub mod remap;

pub use self::error::PartitionerError;
pub use self::metrics::{balance_limit, edge_cut, imbalance, part_sizes};

use crate::algs::dual_graph::DualGraph;
use serde::{Deserialize, Serialize};

pub type PartitionId = usize;

/// Partitioning back-end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionerKind {
    /// Deterministic graph growing plus boundary refinement (pure Rust).
    #[default]
    Native,
    /// METIS k-way; requires the `metis-support` feature.
    Metis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionerConfig {
    pub kind: PartitionerKind,
    /// Allowed imbalance: the largest part may hold `(1 + tolerance) · n / P`
    /// elements (rounded up).
    pub tolerance: f64,
    /// Boundary refinement passes of the native back-end.
    pub refinement_passes: usize,
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        Self {
            kind: PartitionerKind::Native,
            tolerance: 0.05,
            refinement_passes: 4,
        }
    }
}

impl PartitionerConfig {
    pub fn validate(&self) -> Result<(), PartitionerError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(PartitionerError::InvalidConfig(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Same settings with the tolerance widened to `tolerance`.
    pub fn relaxed(&self, tolerance: f64) -> Self {
        Self {
            tolerance,
            ..self.clone()
        }
    }
}

/// Partition `graph` into `n_parts` parts.
///
/// # Errors
/// `InvalidConfig` for zero parts or a bad tolerance, `Backend` when METIS
/// fails or is not compiled in, `Unbalanced` when the largest part exceeds
/// [`balance_limit`].
pub fn partition(
    graph: &DualGraph,
    n_parts: usize,
    cfg: &PartitionerConfig,
) -> Result<Vec<PartitionId>, PartitionerError> {
    cfg.validate()?;
    if n_parts == 0 {
        return Err(PartitionerError::InvalidConfig(
            "number of parts must be at least 1".into(),
        ));
    }
    let n = graph.num_vertices();
    if n_parts == 1 {
        return Ok(vec![0; n]);
    }

    let parts = match cfg.kind {
        PartitionerKind::Native => {
            graph_growing::partition(graph, n_parts, cfg.tolerance, cfg.refinement_passes)?
        }
        PartitionerKind::Metis => metis_parts(graph, n_parts, cfg.tolerance)?,
    };

    let limit = balance_limit(n, n_parts, cfg.tolerance);
    let max_part = part_sizes(&parts, n_parts).into_iter().max().unwrap_or(0);
    if max_part > limit {
        return Err(PartitionerError::Unbalanced { max_part, limit });
    }
    log::info!(
        "partitioned {n} elements into {n_parts} parts: edge cut {}, imbalance {:.3}",
        edge_cut(graph, &parts),
        imbalance(&parts, n_parts)
    );
    Ok(parts)
}

#[cfg(feature = "metis-support")]
fn metis_parts(
    graph: &DualGraph,
    n_parts: usize,
    tolerance: f64,
) -> Result<Vec<PartitionId>, PartitionerError> {
    Ok(graph.metis_partition(n_parts, tolerance)?.part)
}

#[cfg(not(feature = "metis-support"))]
fn metis_parts(
    _graph: &DualGraph,
    _n_parts: usize,
    _tolerance: f64,
) -> Result<Vec<PartitionId>, PartitionerError> {
    Err(PartitionerError::Backend(
        "METIS back-end requested but the crate was built without `metis-support`".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::point::ElementId;

    /// 4x4 grid graph, row-major.
    fn grid4() -> DualGraph {
        let e = |r: u64, c: u64| ElementId::new(r * 4 + c);
        DualGraph::from_rows((0..4).flat_map(|r| {
            (0..4).map(move |c| {
                let mut nbrs = Vec::new();
                if r > 0 {
                    nbrs.push(e(r - 1, c));
                }
                if r < 3 {
                    nbrs.push(e(r + 1, c));
                }
                if c > 0 {
                    nbrs.push(e(r, c - 1));
                }
                if c < 3 {
                    nbrs.push(e(r, c + 1));
                }
                (e(r, c), nbrs)
            })
        }))
        .unwrap()
    }

    #[test]
    fn native_partition_is_balanced() {
        let g = grid4();
        let cfg = PartitionerConfig::default();
        let parts = partition(&g, 4, &cfg).unwrap();
        assert_eq!(parts.len(), 16);
        let sizes = part_sizes(&parts, 4);
        assert!(sizes.iter().all(|&s| s <= balance_limit(16, 4, cfg.tolerance)));
        // any 4-way split of a 4x4 grid cuts at least 8 edges
        assert!(edge_cut(&g, &parts) >= 8);
    }

    #[test]
    fn single_part_is_trivial() {
        let parts = partition(&grid4(), 1, &PartitionerConfig::default()).unwrap();
        assert!(parts.iter().all(|&p| p == 0));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let cfg = PartitionerConfig {
            tolerance: -0.5,
            ..Default::default()
        };
        assert!(matches!(
            partition(&grid4(), 2, &cfg),
            Err(PartitionerError::InvalidConfig(_))
        ));
    }

    #[cfg(not(feature = "metis-support"))]
    #[test]
    fn metis_without_feature_is_a_backend_error() {
        let cfg = PartitionerConfig {
            kind: PartitionerKind::Metis,
            ..Default::default()
        };
        assert!(matches!(
            partition(&grid4(), 2, &cfg),
            Err(PartitionerError::Backend(_))
        ));
    }

    #[test]
    fn config_from_json() {
        let cfg: PartitionerConfig =
            serde_json::from_str(r#"{ "kind": "metis", "tolerance": 0.1 }"#).unwrap();
        assert_eq!(cfg.kind, PartitionerKind::Metis);
        assert_eq!(cfg.refinement_passes, 4);
    }
}
