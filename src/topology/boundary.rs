//! Boundary-condition tags attached to element facets.

use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Boundary-condition kind of a facet.
///
/// The set is closed: generation and ingestion match on it exhaustively. The
/// numeric codes double as Gmsh physical-group tags and as the on-wire value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryCondition {
    /// Unset; the default for every facet.
    #[default]
    None,
    /// Internal fault surface.
    Fault,
    Dirichlet,
    /// Natural (flux) condition.
    #[serde(alias = "natural")]
    Neumann,
}

impl BoundaryCondition {
    pub const fn code(self) -> u64 {
        match self {
            BoundaryCondition::None => 0,
            BoundaryCondition::Fault => 3,
            BoundaryCondition::Dirichlet => 5,
            BoundaryCondition::Neumann => 6,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(BoundaryCondition::None),
            3 => Some(BoundaryCondition::Fault),
            5 => Some(BoundaryCondition::Dirichlet),
            6 => Some(BoundaryCondition::Neumann),
            _ => None,
        }
    }

    /// Map a mesh-file physical tag to a boundary condition.
    pub fn from_physical_tag(tag: i64) -> Result<Self, MeshError> {
        u64::try_from(tag)
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| {
                MeshError::parse(format!(
                    "physical tag {tag} is not a boundary condition (expected 0, 3, 5 or 6)"
                ))
            })
    }

    pub fn is_set(self) -> bool {
        self != BoundaryCondition::None
    }
}

impl fmt::Display for BoundaryCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoundaryCondition::None => "none",
            BoundaryCondition::Fault => "fault",
            BoundaryCondition::Dirichlet => "dirichlet",
            BoundaryCondition::Neumann => "neumann",
        };
        f.write_str(s)
    }
}
