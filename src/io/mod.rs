//! Mesh ingestion from external descriptions.
//!
//! Readers replay a file as a sequence of [`GlobalMeshBuilder`] calls; the
//! builder validates and assembles the mesh. Use [`ingest_on_root`] to read
//! on one rank of a group.

pub mod builder;
pub mod gmsh;

pub use builder::{GlobalMeshBuilder, ingest_on_root};
pub use gmsh::GmshReader;

use crate::mesh_error::MeshError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Trait for mesh readers that declare a mesh into a builder.
pub trait MeshReader {
    /// Parse mesh data from a reader into `builder`.
    fn read_into<R: Read>(&self, reader: R, builder: &mut GlobalMeshBuilder) -> Result<(), MeshError>;

    /// Parse the file at `path`.
    fn read_path(&self, path: &Path, builder: &mut GlobalMeshBuilder) -> Result<(), MeshError> {
        let file = File::open(path)
            .map_err(|e| MeshError::parse(format!("cannot open {}: {e}", path.display())))?;
        self.read_into(BufReader::new(file), builder)
    }
}
