//! The local mesh handed to assembly: owned elements plus ghost layers.
//!
//! Local element indices run over owned elements first, then ghosts, each
//! group in ascending global ID. Local vertex indices follow ascending global
//! vertex ID. Adjacency is stored as [`LocalNeighbor`] per facet, next to the
//! facet's tag.

use crate::mesh::element::Element;
use crate::mesh_error::MeshError;
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

/// What lies across one facet of a local element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalNeighbor {
    /// Another local element, by local index.
    Element(usize),
    /// No neighbour: a boundary facet with its tag.
    Boundary(BoundaryCondition),
    /// A neighbour outside the overlap (only on the outermost ghost layer).
    Exterior(ElementId),
}

/// Where a ghost came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Remote {
    /// Owning rank.
    pub rank: usize,
    /// Breadth-first layer (1 = facet neighbour of an owned element).
    pub layer: usize,
}

#[derive(Debug, Clone)]
pub struct LocalSimplexMesh {
    dim: usize,
    num_owned: usize,
    l2g: Vec<ElementId>,
    g2l: HashMap<ElementId, usize>,
    remotes: Vec<Remote>,
    regions: Vec<u64>,
    /// `dim + 1` local vertex indices per element.
    cells: Vec<usize>,
    /// `dim + 1` entries per element.
    adjacency: Vec<LocalNeighbor>,
    /// Facet tags, parallel to `adjacency`. Interior facets keep theirs too.
    facet_bcs: Vec<BoundaryCondition>,
    vertex_l2g: Vec<VertexId>,
    vertex_g2l: HashMap<VertexId, usize>,
    /// `dim` coordinates per vertex.
    coords: Vec<f64>,
}

impl LocalSimplexMesh {
    /// Number the owned elements and ghosts, resolve adjacency to local
    /// indices and gather coordinates.
    ///
    /// `ghosts` maps each ghost to its owner and layer. Every referenced
    /// vertex needs coordinates in `coords`.
    pub(crate) fn assemble(
        dim: usize,
        owned: &[Element],
        ghosts: &BTreeMap<ElementId, (Element, Remote)>,
        coords: &HashMap<VertexId, Vec<f64>>,
        rank: usize,
    ) -> Result<Self, MeshError> {
        let all: Vec<&Element> = owned.iter().chain(ghosts.values().map(|(e, _)| e)).collect();
        let l2g: Vec<ElementId> = all.iter().map(|e| e.id).collect();
        let g2l: HashMap<ElementId, usize> = l2g.iter().enumerate().map(|(i, &g)| (g, i)).collect();
        if g2l.len() != l2g.len() {
            return Err(MeshError::comm(rank, "a ghost duplicates an owned element"));
        }
        let mut remotes: Vec<Remote> = vec![Remote { rank, layer: 0 }; owned.len()];
        remotes.extend(ghosts.values().map(|(_, r)| *r));

        let vertex_l2g: Vec<VertexId> = all
            .iter()
            .flat_map(|e| e.vertices.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let vertex_g2l: HashMap<VertexId, usize> =
            vertex_l2g.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut flat_coords = Vec::with_capacity(vertex_l2g.len() * dim);
        for v in &vertex_l2g {
            let c = coords
                .get(v)
                .ok_or_else(|| MeshError::comm(rank, format!("no coordinates for vertex {v}")))?;
            flat_coords.extend_from_slice(c);
        }

        let mut cells = Vec::with_capacity(all.len() * (dim + 1));
        let mut adjacency = Vec::with_capacity(all.len() * (dim + 1));
        let mut facet_bcs = Vec::with_capacity(all.len() * (dim + 1));
        for e in &all {
            cells.extend(e.vertices.iter().map(|v| vertex_g2l[v]));
            adjacency.extend(e.facets.iter().map(|f| match f.neighbor {
                None => LocalNeighbor::Boundary(f.bc),
                Some(n) => g2l
                    .get(&n)
                    .map_or(LocalNeighbor::Exterior(n), |&l| LocalNeighbor::Element(l)),
            }));
            facet_bcs.extend(e.facets.iter().map(|f| f.bc));
        }

        Ok(Self {
            dim,
            num_owned: owned.len(),
            regions: all.iter().map(|e| e.region).collect(),
            l2g,
            g2l,
            remotes,
            cells,
            adjacency,
            facet_bcs,
            vertex_l2g,
            vertex_g2l,
            coords: flat_coords,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_owned(&self) -> usize {
        self.num_owned
    }

    pub fn num_ghosts(&self) -> usize {
        self.l2g.len() - self.num_owned
    }

    pub fn num_elements(&self) -> usize {
        self.l2g.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_l2g.len()
    }

    /// Local indices of owned elements.
    pub fn owned(&self) -> Range<usize> {
        0..self.num_owned
    }

    /// Local indices of ghost elements.
    pub fn ghosts(&self) -> Range<usize> {
        self.num_owned..self.l2g.len()
    }

    pub fn is_ghost(&self, local: usize) -> bool {
        local >= self.num_owned
    }

    pub fn local_to_global(&self, local: usize) -> ElementId {
        self.l2g[local]
    }

    pub fn global_to_local(&self, id: ElementId) -> Option<usize> {
        self.g2l.get(&id).copied()
    }

    /// Local → global map for every element.
    pub fn l2g(&self) -> &[ElementId] {
        &self.l2g
    }

    /// Owning rank and layer of a local element (layer 0 for owned ones).
    pub fn remote(&self, local: usize) -> Remote {
        self.remotes[local]
    }

    pub fn layer(&self, local: usize) -> usize {
        self.remotes[local].layer
    }

    pub fn region(&self, local: usize) -> u64 {
        self.regions[local]
    }

    /// Local vertex indices of an element, in the element's vertex order.
    pub fn element_vertices(&self, local: usize) -> &[usize] {
        let n = self.dim + 1;
        &self.cells[local * n..(local + 1) * n]
    }

    /// What lies across each facet; entry `i` is opposite vertex `i`.
    pub fn facets(&self, local: usize) -> &[LocalNeighbor] {
        let n = self.dim + 1;
        &self.adjacency[local * n..(local + 1) * n]
    }

    /// Tag of each facet, including interior ones (e.g. a fault surface
    /// between two elements). Entry `i` is opposite vertex `i`.
    pub fn facet_bcs(&self, local: usize) -> &[BoundaryCondition] {
        let n = self.dim + 1;
        &self.facet_bcs[local * n..(local + 1) * n]
    }

    pub fn vertex_coords(&self, vertex: usize) -> &[f64] {
        &self.coords[vertex * self.dim..(vertex + 1) * self.dim]
    }

    pub fn vertex_global(&self, vertex: usize) -> VertexId {
        self.vertex_l2g[vertex]
    }

    pub fn vertex_local(&self, id: VertexId) -> Option<usize> {
        self.vertex_g2l.get(&id).copied()
    }

    /// Coordinates of the vertices of an element.
    pub fn element_coords(&self, local: usize) -> impl Iterator<Item = &[f64]> + '_ {
        self.element_vertices(local)
            .iter()
            .map(move |&v| self.vertex_coords(v))
    }
}
