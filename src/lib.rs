#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dist-simplex-mesh
//!
//! Distributed construction of unstructured simplex meshes for parallel
//! finite-element codes. A mesh is either generated (structured box, Kuhn
//! split, boundary-condition regions) or ingested on one rank from a Gmsh
//! file, then distributed over a group of processes, repartitioned along its
//! element dual graph and finally extracted per rank as a local mesh with
//! `k` layers of ghost elements.
//!
//! ## Features
//! - Closed-form structured generation, no communication needed
//! - Ingestion on a root rank with group-wide error reporting
//! - Hash scatter and graph repartitioning (native partitioner or METIS)
//! - Ghost layers of any depth via a distributed owner directory
//! - Pluggable communication backends: serial, in-process threads, MPI
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! dist-simplex-mesh = "0.1"
//! # features = ["mpi-support", "metis-support"]
//! ```
//!
//! Every operation that takes a communicator is collective: all ranks of
//! the group call it in the same order, and a failure on any rank is
//! reported on all of them.

pub mod algs;
pub mod io;
pub mod mesh;
pub mod mesh_error;
pub mod mesh_generation;
pub mod mesh_source;
pub mod overlap;
pub mod partitioning;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::io::{GlobalMeshBuilder, GmshReader, MeshReader, ingest_on_root};
    pub use crate::mesh::{Element, Facet, GlobalSimplexMesh};
    pub use crate::mesh_error::{MeshError, Stage};
    pub use crate::mesh_generation::{BcRegion, MeshDescriptor, StructuredMeshGenerator};
    pub use crate::mesh_source::{MeshSource, build_global_mesh, build_local_mesh};
    pub use crate::overlap::{LocalNeighbor, LocalSimplexMesh};
    pub use crate::partitioning::{PartitionerConfig, PartitionerKind};
    pub use crate::topology::{BoundaryCondition, ElementId, VertexId};
}
