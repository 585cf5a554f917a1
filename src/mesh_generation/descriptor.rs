//! Declarative description of a structured simplex mesh.
//!
//! ```json
//! {
//!   "intercepts": [[0.0, 1.0], [0.0, 0.5, 1.0]],
//!   "bcs": [
//!     [{ "bc": "dirichlet", "plane": 0 }],
//!     [{ "bc": "neumann", "plane": 2, "region": [[0, 1]] }]
//!   ]
//! }
//! ```
//!
//! `intercepts[d]` are the coordinates along axis `d` that must be grid lines.
//! `bcs[d]` tags facets on the plane `x_d = intercepts[d][plane]`, optionally
//! restricted to a sub-rectangle given as one `[lo, hi]` intercept index range
//! per other axis, in increasing axis order.

use crate::mesh_error::MeshError;
use crate::topology::boundary::BoundaryCondition;
use serde::{Deserialize, Serialize};

/// Boundary-condition region on one axis-aligned plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BcRegion {
    pub bc: BoundaryCondition,
    /// Index into the intercepts of the region's axis.
    pub plane: usize,
    /// `[lo, hi]` intercept indices per other axis; `None` = whole plane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Vec<[usize; 2]>>,
}

impl BcRegion {
    pub fn whole_plane(bc: BoundaryCondition, plane: usize) -> Self {
        Self {
            bc,
            plane,
            region: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescriptor {
    pub intercepts: Vec<Vec<f64>>,
    #[serde(default)]
    pub bcs: Vec<Vec<BcRegion>>,
}

impl MeshDescriptor {
    pub fn new(intercepts: Vec<Vec<f64>>) -> Self {
        Self {
            intercepts,
            bcs: Vec::new(),
        }
    }

    /// Add a region on `axis`, growing `bcs` as needed.
    pub fn with_region(mut self, axis: usize, region: BcRegion) -> Self {
        if self.bcs.len() <= axis {
            self.bcs.resize(axis + 1, Vec::new());
        }
        self.bcs[axis].push(region);
        self
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.intercepts.len()
    }

    /// Regions configured on `axis` (empty when `bcs` is shorter).
    pub fn regions(&self, axis: usize) -> &[BcRegion] {
        self.bcs.get(axis).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        let dim = self.dim();
        if dim == 0 {
            return Err(MeshError::config("mesh descriptor has no axes"));
        }
        for (d, line) in self.intercepts.iter().enumerate() {
            if line.len() < 2 {
                return Err(MeshError::config(format!(
                    "axis {d} needs at least 2 intercepts, got {}",
                    line.len()
                )));
            }
            if let Some(x) = line.iter().find(|x| !x.is_finite()) {
                return Err(MeshError::config(format!(
                    "axis {d} has non-finite intercept {x}"
                )));
            }
            if line.windows(2).any(|w| w[0] >= w[1]) {
                return Err(MeshError::config(format!(
                    "intercepts of axis {d} are not strictly increasing"
                )));
            }
        }
        if self.bcs.len() > dim {
            return Err(MeshError::config(format!(
                "boundary conditions given for {} axes, mesh has {dim}",
                self.bcs.len()
            )));
        }
        for (d, regions) in self.bcs.iter().enumerate() {
            for r in regions {
                self.validate_region(d, r)?;
            }
        }
        Ok(())
    }

    fn validate_region(&self, axis: usize, r: &BcRegion) -> Result<(), MeshError> {
        let n = self.intercepts[axis].len();
        if r.plane >= n {
            return Err(MeshError::config(format!(
                "plane {} on axis {axis} is out of range (axis has {n} intercepts)",
                r.plane
            )));
        }
        let Some(ranges) = &r.region else {
            return Ok(());
        };
        let others: Vec<usize> = (0..self.dim()).filter(|&a| a != axis).collect();
        if ranges.len() != others.len() {
            return Err(MeshError::config(format!(
                "region on axis {axis} needs {} ranges, got {}",
                others.len(),
                ranges.len()
            )));
        }
        for (&a, &[lo, hi]) in others.iter().zip(ranges) {
            let len = self.intercepts[a].len();
            if lo >= hi || hi >= len {
                return Err(MeshError::config(format!(
                    "region range [{lo}, {hi}] on axis {a} must satisfy lo < hi < {len}"
                )));
            }
        }
        Ok(())
    }
}

/// Grid spacing must be a positive finite number.
pub fn validate_resolution(resolution: f64) -> Result<(), MeshError> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(MeshError::config(format!(
            "resolution must be positive and finite, got {resolution}"
        )))
    }
}
