//! METIS k-way partition of a [`DualGraph`] (feature `metis-support`).

use crate::algs::dual_graph::DualGraph;
#[cfg(feature = "metis-support")]
use crate::partitioning::error::PartitionerError;

/// A METIS partition of a dual graph.
pub struct MetisPartition {
    /// for each vertex i, part[i] ∈ [0..nparts)
    pub part: Vec<usize>,
    /// Edge cut reported by METIS.
    pub objval: usize,
}

impl DualGraph {
    /// Partition this graph into `nparts` parts using METIS k-way.
    ///
    /// `tolerance` is the allowed load imbalance (0.05 = 5%).
    #[cfg(feature = "metis-support")]
    pub fn metis_partition(
        &self,
        nparts: usize,
        tolerance: f64,
    ) -> Result<MetisPartition, PartitionerError> {
        use metis::{Graph, Idx, Real};

        let n = self.num_vertices();
        if nparts <= 1 || n == 0 {
            return Ok(MetisPartition {
                part: vec![0; n],
                objval: 0,
            });
        }
        let to_idx = |x: usize| {
            Idx::try_from(x).map_err(|_| {
                PartitionerError::Backend(format!("{x} does not fit METIS index type"))
            })
        };
        let xadj = self.xadj.iter().map(|&u| to_idx(u)).collect::<Result<Vec<_>, _>>()?;
        let adjncy = self.adjncy.iter().map(|&v| to_idx(v)).collect::<Result<Vec<_>, _>>()?;
        let vwgt: Vec<Idx> = self.vwgt.iter().map(|&w| w as Idx).collect();
        let ubvec = [(1.0 + tolerance) as Real];
        let mut part: Vec<Idx> = vec![0; n];

        let objval = Graph::new(1, to_idx(nparts)?, &xadj, &adjncy)
            .map_err(|e| PartitionerError::Backend(e.to_string()))?
            .set_vwgt(&vwgt)
            .set_ubvec(&ubvec)
            .part_kway(&mut part)
            .map_err(|e| PartitionerError::Backend(e.to_string()))?;

        Ok(MetisPartition {
            part: part.into_iter().map(|p| p.max(0) as usize).collect(),
            objval: objval.max(0) as usize,
        })
    }
}
