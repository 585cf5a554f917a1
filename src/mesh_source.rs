//! End-to-end construction: where the mesh comes from and how it is
//! distributed.
//!
//! ```text
//! Generate ──────────────────────────────┐
//!                                         ├─> repartition ─> get_local_mesh
//! GmshFile ─> ingest on rank 0 ─> hash ──┘
//! ```

use crate::algs::communicator::Communicator;
use crate::io::builder::ingest_on_root;
use crate::io::{GmshReader, MeshReader};
use crate::mesh::global::GlobalSimplexMesh;
use crate::mesh_error::MeshError;
use crate::mesh_generation::StructuredMeshGenerator;
use crate::mesh_generation::descriptor::MeshDescriptor;
use crate::overlap::LocalSimplexMesh;
use crate::partitioning::PartitionerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Rank that reads external mesh files.
pub const INGEST_ROOT: usize = 0;

/// Where the global mesh comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshSource {
    /// Structured simplex mesh over a box.
    Generate {
        descriptor: MeshDescriptor,
        resolution: f64,
    },
    /// ASCII Gmsh 2.2 file, read on rank 0.
    GmshFile(PathBuf),
}

/// Build and partition the global mesh (collective).
///
/// A generated mesh starts out in contiguous blocks; an ingested one is
/// first scattered by hash so the partitioner never runs against a single
/// rank holding everything. Both then go through graph repartitioning.
pub fn build_global_mesh<C>(
    source: &MeshSource,
    comm: &C,
    cfg: &PartitionerConfig,
) -> Result<GlobalSimplexMesh, MeshError>
where
    C: Communicator,
{
    let mut mesh = match source {
        MeshSource::Generate {
            descriptor,
            resolution,
        } => StructuredMeshGenerator::new(descriptor.clone(), *resolution)?.uniform_mesh(comm)?,
        MeshSource::GmshFile(path) => {
            let mut mesh = ingest_on_root(comm, INGEST_ROOT, |builder| {
                GmshReader.read_path(path, builder)
            })?;
            if comm.size() > 1 {
                mesh.repartition_by_hash(comm)?;
            }
            mesh
        }
    };
    mesh.repartition(comm, cfg)?;
    Ok(mesh)
}

/// [`build_global_mesh`] followed by extraction of `overlap` ghost layers.
pub fn build_local_mesh<C>(
    source: &MeshSource,
    comm: &C,
    cfg: &PartitionerConfig,
    overlap: usize,
) -> Result<LocalSimplexMesh, MeshError>
where
    C: Communicator,
{
    build_global_mesh(source, comm, cfg)?.get_local_mesh(comm, overlap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    #[test]
    fn source_from_json() {
        let src: MeshSource = serde_json::from_str(
            r#"{ "generate": {
                    "descriptor": { "intercepts": [[0.0, 1.0], [0.0, 1.0]] },
                    "resolution": 0.5 } }"#,
        )
        .unwrap();
        assert!(matches!(src, MeshSource::Generate { resolution, .. } if resolution == 0.5));

        let src: MeshSource = serde_json::from_str(r#"{ "gmsh_file": "box.msh" }"#).unwrap();
        assert_eq!(src, MeshSource::GmshFile(PathBuf::from("box.msh")));
    }

    #[test]
    fn generated_square_on_one_rank() {
        let src = MeshSource::Generate {
            descriptor: MeshDescriptor::new(vec![vec![0.0, 1.0], vec![0.0, 1.0]]),
            resolution: 0.5,
        };
        let local = build_local_mesh(&src, &NoComm, &PartitionerConfig::default(), 1).unwrap();
        assert_eq!(local.num_owned(), 8);
        assert_eq!(local.num_ghosts(), 0);
        assert_eq!(local.num_vertices(), 9);
    }

    #[test]
    fn missing_file_is_a_parse_error() {
        let src = MeshSource::GmshFile(PathBuf::from("/nonexistent/mesh.msh"));
        let err = build_global_mesh(&src, &NoComm, &PartitionerConfig::default()).unwrap_err();
        assert!(matches!(err, MeshError::Parse(_)));
    }

    #[test]
    fn bad_resolution_is_a_configuration_error() {
        let src = MeshSource::Generate {
            descriptor: MeshDescriptor::new(vec![vec![0.0, 1.0]]),
            resolution: -1.0,
        };
        let err = build_global_mesh(&src, &NoComm, &PartitionerConfig::default()).unwrap_err();
        assert!(matches!(err, MeshError::Configuration(_)));
    }
}
