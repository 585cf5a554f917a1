//! Call-sequence builder for externally described meshes.
//!
//! A format reader declares vertices, elements and tagged facets one call at
//! a time; [`GlobalMeshBuilder::finish`] validates the whole set and computes
//! facet adjacency. [`ingest_on_root`] runs a reader on one rank and makes its
//! verdict known to the whole group.

use crate::algs::collective::{broadcast, tags};
use crate::algs::communicator::Communicator;
use crate::mesh::element::{Element, Facet};
use crate::mesh::global::GlobalSimplexMesh;
use crate::mesh_error::{MeshError, Stage};
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use crate::topology::simplex::{facet_key, is_degenerate, match_facets};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Accumulates one mesh declaration; nothing is checked against the rest of
/// the mesh until [`finish`](Self::finish).
#[derive(Debug, Default, Clone)]
pub struct GlobalMeshBuilder {
    dim: Option<usize>,
    vertices: BTreeMap<VertexId, Vec<f64>>,
    elements: Vec<(ElementId, Vec<VertexId>, u64)>,
    element_ids: HashSet<ElementId>,
    boundary_facets: Vec<(ElementId, usize, BoundaryCondition)>,
    facets: Vec<(Vec<VertexId>, BoundaryCondition)>,
}

impl GlobalMeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a mesh of known spatial dimension.
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim: Some(dim),
            ..Self::default()
        }
    }

    /// Dimension fixed so far (by `with_dim` or the first vertex).
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn add_vertex(&mut self, id: VertexId, coords: Vec<f64>) -> Result<(), MeshError> {
        let dim = *self.dim.get_or_insert(coords.len());
        if coords.len() != dim {
            return Err(MeshError::parse(format!(
                "vertex {id} has {} coordinates, mesh is {dim}-dimensional",
                coords.len()
            )));
        }
        if dim == 0 {
            return Err(MeshError::parse(format!("vertex {id} has no coordinates")));
        }
        if let Some(x) = coords.iter().find(|x| !x.is_finite()) {
            return Err(MeshError::parse(format!(
                "vertex {id} has non-finite coordinate {x}"
            )));
        }
        if self.vertices.insert(id, coords).is_some() {
            return Err(MeshError::parse(format!("vertex {id} declared twice")));
        }
        Ok(())
    }

    /// Declare a simplex. `region` is its physical group (0 when unknown).
    pub fn add_element(&mut self, id: ElementId, vertices: Vec<VertexId>, region: u64) -> Result<(), MeshError> {
        if id.get() == u64::MAX {
            return Err(MeshError::parse(format!("element id {id} is reserved")));
        }
        if !self.element_ids.insert(id) {
            return Err(MeshError::parse(format!("element {id} declared twice")));
        }
        self.elements.push((id, vertices, region));
        Ok(())
    }

    /// Tag facet `facet` (opposite local vertex `facet`) of element `element`.
    ///
    /// If the facet turns out to be interior, `finish` tags the neighbour's
    /// side as well.
    pub fn add_boundary_facet(&mut self, element: ElementId, facet: usize, bc: BoundaryCondition) {
        self.boundary_facets.push((element, facet, bc));
    }

    /// Tag the facet with the given vertices on every element that has it.
    pub fn add_facet(&mut self, vertices: Vec<VertexId>, bc: BoundaryCondition) {
        self.facets.push((vertices, bc));
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Validate the declarations and build the mesh with facet adjacency.
    pub fn finish(self) -> Result<GlobalSimplexMesh, MeshError> {
        let dim = self
            .dim
            .ok_or_else(|| MeshError::parse("mesh declares no vertices"))?;
        if self.elements.is_empty() {
            return Err(MeshError::parse("mesh declares no elements"));
        }

        // 1) element shape and references
        for (id, verts, _) in &self.elements {
            if verts.len() != dim + 1 {
                return Err(MeshError::parse(format!(
                    "element {id} has {} vertices, a {dim}-simplex has {}",
                    verts.len(),
                    dim + 1
                )));
            }
            if let Some(v) = verts.iter().find(|v| !self.vertices.contains_key(v)) {
                return Err(MeshError::parse(format!(
                    "element {id} references missing vertex {v}"
                )));
            }
            if is_degenerate(verts) {
                return Err(MeshError::parse(format!(
                    "element {id} is degenerate (repeated vertex)"
                )));
            }
        }

        // 2) adjacency
        let neighbours = match_facets(
            self.elements
                .iter()
                .map(|(id, verts, _)| (*id, verts.as_slice())),
        )
        .map_err(|nm| {
            MeshError::parse(format!(
                "facet {:?} is shared by more than two elements: {:?}",
                nm.facet.iter().map(|v| v.get()).collect::<Vec<_>>(),
                nm.elements.iter().map(|e| e.get()).collect::<Vec<_>>()
            ))
        })?;
        let mut elements: Vec<Element> = self
            .elements
            .iter()
            .zip(neighbours)
            .map(|((id, verts, region), nbrs)| {
                let facets = nbrs
                    .into_iter()
                    .map(|n| Facet {
                        neighbor: n,
                        bc: BoundaryCondition::None,
                    })
                    .collect();
                Element::new(*id, verts.clone(), facets, *region)
            })
            .collect();

        // 3) tags by (element, facet index)
        let index: HashMap<ElementId, usize> =
            elements.iter().enumerate().map(|(i, e)| (e.id, i)).collect();
        for &(id, f, bc) in &self.boundary_facets {
            let &i = index
                .get(&id)
                .ok_or_else(|| MeshError::parse(format!("boundary facet on unknown element {id}")))?;
            let facet = elements[i].facets.get_mut(f).ok_or_else(|| {
                MeshError::parse(format!(
                    "element {id} has no facet {f} (a {dim}-simplex has {})",
                    dim + 1
                ))
            })?;
            facet.bc = bc;
            let Some(other) = facet.neighbor else { continue };
            // an interior facet carries the same tag on both sides
            let mirror = index
                .get(&other)
                .and_then(|&j| elements[j].facet_towards(id).map(|g| (j, g)))
                .ok_or_else(|| {
                    MeshError::parse(format!("element {other} does not link back to {id}"))
                })?;
            elements[mirror.0].facets[mirror.1].bc = bc;
        }

        // 4) tags by facet vertices
        if !self.facets.is_empty() {
            let mut owners: HashMap<Vec<VertexId>, Vec<(usize, usize)>> = HashMap::new();
            for (i, e) in elements.iter().enumerate() {
                for f in 0..=dim {
                    owners
                        .entry(facet_key(&e.vertices, f))
                        .or_default()
                        .push((i, f));
                }
            }
            for (verts, bc) in self.facets {
                let mut key = verts;
                key.sort_unstable();
                let sides = owners.get(&key).ok_or_else(|| {
                    MeshError::parse(format!(
                        "tagged facet {:?} belongs to no element",
                        key.iter().map(|v| v.get()).collect::<Vec<_>>()
                    ))
                })?;
                for &(i, f) in sides {
                    elements[i].facets[f].bc = bc;
                }
            }
        }

        let n = elements.len();
        let mesh = GlobalSimplexMesh::assemble(dim, elements, self.vertices).map_err(MeshError::parse)?;
        log::info!("built {dim}D mesh with {n} elements and {} vertices", mesh.num_vertices());
        Ok(mesh)
    }
}

/// Run `parse` on `root` only and share the outcome with the whole group.
///
/// Collective. On success `root` holds the whole mesh and every other rank
/// an empty mesh of the same dimension; on failure every rank returns the
/// root's error.
pub fn ingest_on_root<C, F>(comm: &C, root: usize, parse: F) -> Result<GlobalSimplexMesh, MeshError>
where
    C: Communicator,
    F: FnOnce(&mut GlobalMeshBuilder) -> Result<(), MeshError>,
{
    let me = comm.rank();
    let built = if me == root {
        let mut builder = GlobalMeshBuilder::new();
        Some(parse(&mut builder).and_then(|()| builder.finish()))
    } else {
        None
    };

    let verdict: Option<Result<usize, MeshError>> = built.as_ref().map(|r| match r {
        Ok(mesh) => Ok(mesh.dim()),
        Err(e) => Err(e.clone()),
    });
    let payload = match &verdict {
        Some(v) => bincode::serialize(v)
            .map_err(|e| MeshError::comm(me, format!("cannot encode ingest verdict: {e}")))?,
        None => Vec::new(),
    };
    let bytes = broadcast(comm, tags::INGEST, root, payload)?;
    let verdict: Result<usize, MeshError> = bincode::deserialize(&bytes)
        .map_err(|e| MeshError::comm(me, format!("cannot decode ingest verdict: {e}")))?;

    match (verdict, built) {
        (Err(e), _) => {
            log::error!("{} failed on rank {root}: {e}", Stage::Ingest);
            Err(e)
        }
        (Ok(_), Some(mesh)) => mesh,
        (Ok(dim), None) => Ok(GlobalSimplexMesh::empty(dim)),
    }
}
