//! Gmsh `.msh` reader.
//!
//! # Supported format
//! - ASCII `.msh` version **2.2**.
//! - Element types: 1 (line), 2 (triangle), 4 (tet), 15 (point, skipped).
//!
//! The domain dimension is the highest simplex dimension in the file.
//! Elements of that dimension become mesh elements, with their first tag
//! (the physical group) as region. Elements one dimension lower are boundary
//! facets whose physical group is a boundary-condition code (0 none, 3 fault,
//! 5 Dirichlet, 6 Neumann). Coordinates are truncated to the domain dimension.
//!
//! # Limitations
//! - Binary files are not supported.
//! - `.msh` v4.x (block-based) is not supported.
//! - Non-simplex and higher-order elements are rejected.

use crate::io::MeshReader;
use crate::io::builder::GlobalMeshBuilder;
use crate::mesh_error::MeshError;
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use std::io::Read;

/// Gmsh `.msh` reader for ASCII v2.2 meshes.
#[derive(Debug, Default, Clone)]
pub struct GmshReader;

/// One `$Elements` line.
#[derive(Debug, Clone)]
struct RawElement {
    id: u64,
    dim: usize,
    tags: Vec<i64>,
    nodes: Vec<u64>,
}

impl GmshReader {
    fn parse_version(line: &str) -> Result<&str, MeshError> {
        let mut parts = line.split_whitespace();
        let version = parts
            .next()
            .ok_or_else(|| MeshError::parse("missing mesh format version"))?;
        let file_type = parts
            .next()
            .ok_or_else(|| MeshError::parse("missing mesh format type"))?;
        if file_type != "0" {
            return Err(MeshError::parse("binary .msh files are not supported"));
        }
        Ok(version)
    }

    /// (node count, simplex dimension) of a Gmsh element type.
    fn element_shape(elem_type: u32) -> Option<(usize, usize)> {
        match elem_type {
            1 => Some((2, 1)),  // line
            2 => Some((3, 2)),  // triangle
            4 => Some((4, 3)),  // tet
            15 => Some((1, 0)), // point
            _ => None,
        }
    }

    fn parse_id(raw: &str, what: &str) -> Result<u64, MeshError> {
        raw.parse::<u64>()
            .map_err(|_| MeshError::parse(format!("invalid {what}: {raw}")))
    }

    fn parse_coord(raw: &str) -> Result<f64, MeshError> {
        raw.parse::<f64>()
            .map_err(|_| MeshError::parse(format!("invalid coordinate: {raw}")))
    }

    fn parse_count(line: Option<&str>, what: &str) -> Result<usize, MeshError> {
        let line = line.ok_or_else(|| MeshError::parse(format!("missing {what}")))?;
        line.trim()
            .parse::<usize>()
            .map_err(|_| MeshError::parse(format!("invalid {what}: {line}")))
    }

    fn expect_end(line: Option<&str>, marker: &str) -> Result<(), MeshError> {
        match line {
            Some(l) if l.trim() == marker => Ok(()),
            _ => Err(MeshError::parse(format!("missing {marker}"))),
        }
    }

    fn parse_node(line: &str) -> Result<(u64, [f64; 3]), MeshError> {
        let mut parts = line.split_whitespace();
        let id = Self::parse_id(
            parts
                .next()
                .ok_or_else(|| MeshError::parse("missing node id"))?,
            "node id",
        )?;
        let mut xyz = [0.0; 3];
        for (axis, c) in xyz.iter_mut().enumerate() {
            let raw = parts
                .next()
                .ok_or_else(|| MeshError::parse(format!("node {id}: missing coordinate {axis}")))?;
            *c = Self::parse_coord(raw)?;
        }
        Ok((id, xyz))
    }

    fn parse_element(line: &str) -> Result<RawElement, MeshError> {
        let mut parts = line.split_whitespace();
        let mut next = |what: &str| {
            parts
                .next()
                .ok_or_else(|| MeshError::parse(format!("missing element {what}")))
        };
        let id = Self::parse_id(next("id")?, "element id")?;
        let raw_type = next("type")?;
        let elem_type = raw_type
            .parse::<u32>()
            .map_err(|_| MeshError::parse(format!("invalid element type: {raw_type}")))?;
        let (node_count, dim) = Self::element_shape(elem_type).ok_or_else(|| {
            MeshError::parse(format!("element {id}: unsupported element type {elem_type}"))
        })?;
        let num_tags = Self::parse_id(next("tag count")?, "element tag count")? as usize;
        let mut tags = Vec::with_capacity(num_tags);
        for _ in 0..num_tags {
            let raw = next("tag")?;
            tags.push(
                raw.parse::<i64>()
                    .map_err(|_| MeshError::parse(format!("element {id}: invalid tag {raw}")))?,
            );
        }
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            nodes.push(Self::parse_id(next("node id")?, "element node id")?);
        }
        Ok(RawElement {
            id,
            dim,
            tags,
            nodes,
        })
    }
}

impl MeshReader for GmshReader {
    fn read_into<R: Read>(&self, mut reader: R, builder: &mut GlobalMeshBuilder) -> Result<(), MeshError> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|e| MeshError::parse(format!("cannot read mesh: {e}")))?;
        let mut lines = contents.lines();

        let mut version: Option<String> = None;
        let mut nodes: Vec<(u64, [f64; 3])> = Vec::new();
        let mut elements: Vec<RawElement> = Vec::new();

        while let Some(line) = lines.next() {
            match line.trim() {
                "$MeshFormat" => {
                    let format_line = lines
                        .next()
                        .ok_or_else(|| MeshError::parse("missing MeshFormat"))?;
                    version = Some(Self::parse_version(format_line)?.to_string());
                    Self::expect_end(lines.next(), "$EndMeshFormat")?;
                }
                "$Nodes" => {
                    let node_count = Self::parse_count(lines.next(), "node count")?;
                    for _ in 0..node_count {
                        let node_line = lines
                            .next()
                            .ok_or_else(|| MeshError::parse("unexpected end of node list"))?;
                        nodes.push(Self::parse_node(node_line)?);
                    }
                    Self::expect_end(lines.next(), "$EndNodes")?;
                }
                "$Elements" => {
                    let elem_count = Self::parse_count(lines.next(), "element count")?;
                    for _ in 0..elem_count {
                        let elem_line = lines
                            .next()
                            .ok_or_else(|| MeshError::parse("unexpected end of element list"))?;
                        elements.push(Self::parse_element(elem_line)?);
                    }
                    Self::expect_end(lines.next(), "$EndElements")?;
                }
                _ => {
                    // ignore other sections
                }
            }
        }

        let version = version.unwrap_or_else(|| "2.2".to_string());
        if version != "2.2" {
            return Err(MeshError::parse(format!("unsupported gmsh version: {version}")));
        }

        let dim = elements.iter().map(|e| e.dim).max().unwrap_or(0);
        if dim == 0 {
            return Err(MeshError::parse("mesh contains no simplex elements"));
        }
        log::debug!(
            "gmsh: {} nodes, {} elements, domain dimension {dim}",
            nodes.len(),
            elements.len()
        );

        for (id, xyz) in nodes {
            builder.add_vertex(VertexId::new(id), xyz[..dim].to_vec())?;
        }
        for e in elements {
            let first_tag = e.tags.first().copied().unwrap_or(0);
            let verts: Vec<VertexId> = e.nodes.into_iter().map(VertexId::new).collect();
            if e.dim == dim {
                let region = u64::try_from(first_tag).map_err(|_| {
                    MeshError::parse(format!("element {}: negative physical tag {first_tag}", e.id))
                })?;
                builder.add_element(ElementId::new(e.id), verts, region)?;
            } else if e.dim + 1 == dim {
                builder.add_facet(verts, BoundaryCondition::from_physical_tag(first_tag)?);
            }
        }
        Ok(())
    }
}
