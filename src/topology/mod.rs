//! Identifiers, boundary tags and simplex facet bookkeeping.

pub mod boundary;
pub mod point;
pub mod simplex;

pub use boundary::BoundaryCondition;
pub use point::{ElementId, VertexId};
