//! Element records and the distributed global mesh.

pub mod element;
pub mod global;

pub use element::{Element, Facet};
pub use global::GlobalSimplexMesh;
