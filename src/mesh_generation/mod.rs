//! Structured simplex mesh generator with boundary-condition regions.
//!
//! The box spanned by the descriptor intercepts is refined into a Cartesian
//! grid and every grid cell is split into D! simplices by the Kuhn
//! (Freudenthal) rule: for each permutation π of the axes the simplex walks
//! from the cell corner `v0` along `e(π(0))`, `e(π(1))`, ... to the opposite
//! corner. The split is the same in every cell, so neighbouring cells share
//! whole facets.
//!
//! Numbering is closed-form, which lets each rank generate its own block of
//! elements without talking to anybody:
//!
//! * element ID = `cell_linear_index · D! + permutation_index`
//! * vertex ID  = linear grid-point index, axis 0 fastest

pub mod descriptor;

pub use descriptor::{BcRegion, MeshDescriptor, validate_resolution};

use crate::algs::communicator::Communicator;
use crate::mesh::element::{Element, Facet};
use crate::mesh::global::GlobalSimplexMesh;
use crate::mesh_error::MeshError;
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use crate::topology::simplex::{facet_key, local_facet_of};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::ops::Range;

/// Generator for one validated descriptor at one resolution.
#[derive(Debug, Clone)]
pub struct StructuredMeshGenerator {
    descriptor: MeshDescriptor,
    resolution: f64,
    /// Refined grid lines per axis.
    lines: Vec<Vec<f64>>,
    /// Grid-line index of every descriptor intercept, per axis.
    intercept_at: Vec<Vec<usize>>,
    /// Axis permutations in lexicographic order.
    perms: Vec<Vec<usize>>,
}

impl StructuredMeshGenerator {
    /// Validate the inputs and lay out the grid. Nothing is generated yet.
    pub fn new(descriptor: MeshDescriptor, resolution: f64) -> Result<Self, MeshError> {
        descriptor.validate()?;
        validate_resolution(resolution)?;
        let dim = descriptor.dim();

        let mut lines = Vec::with_capacity(dim);
        let mut intercept_at = Vec::with_capacity(dim);
        for intercepts in &descriptor.intercepts {
            let mut line = Vec::new();
            let mut at = Vec::with_capacity(intercepts.len());
            for (a, b) in intercepts.iter().copied().tuple_windows() {
                at.push(line.len());
                let segments = ((b - a) / resolution).ceil().max(1.0) as usize;
                line.extend((0..segments).map(|j| a + (b - a) * j as f64 / segments as f64));
            }
            at.push(line.len());
            line.extend(intercepts.last().copied());
            lines.push(line);
            intercept_at.push(at);
        }
        let perms = (0..dim).permutations(dim).collect();
        Ok(Self {
            descriptor,
            resolution,
            lines,
            intercept_at,
            perms,
        })
    }

    pub fn descriptor(&self) -> &MeshDescriptor {
        &self.descriptor
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn dim(&self) -> usize {
        self.lines.len()
    }

    /// Grid-line coordinates along `axis`.
    pub fn grid_lines(&self, axis: usize) -> &[f64] {
        &self.lines[axis]
    }

    pub fn cells_per_axis(&self) -> Vec<usize> {
        self.lines.iter().map(|l| l.len() - 1).collect()
    }

    pub fn simplices_per_cell(&self) -> u64 {
        self.perms.len() as u64
    }

    pub fn num_cells(&self) -> u64 {
        self.cells_per_axis().iter().map(|&n| n as u64).product()
    }

    pub fn num_elements(&self) -> u64 {
        self.num_cells() * self.simplices_per_cell()
    }

    pub fn num_vertices(&self) -> u64 {
        self.lines.iter().map(|l| l.len() as u64).product()
    }

    /// Element IDs initially owned by `rank`: a contiguous block.
    pub fn element_range(&self, rank: usize, size: usize) -> Range<u64> {
        let n = self.num_elements() as u128;
        let size = size.max(1) as u128;
        let lo = n * rank as u128 / size;
        let hi = n * (rank as u128 + 1) / size;
        lo as u64..hi as u64
    }

    /// Generate this rank's block of the mesh.
    ///
    /// Every rank of `comm` calls this; no messages are exchanged because
    /// neighbours and tags follow from the numbering.
    pub fn uniform_mesh<C>(&self, comm: &C) -> Result<GlobalSimplexMesh, MeshError>
    where
        C: Communicator,
    {
        let range = self.element_range(comm.rank(), comm.size());
        let mut elements = Vec::with_capacity((range.end - range.start) as usize);
        let mut coords: BTreeMap<VertexId, Vec<f64>> = BTreeMap::new();
        for raw in range {
            let element = self.record(ElementId::new(raw));
            for &v in &element.vertices {
                coords
                    .entry(v)
                    .or_insert_with(|| self.vertex_coords(v));
            }
            elements.push(element);
        }
        log::info!(
            "rank {}: generated {} of {} elements ({}D, {} cells)",
            comm.rank(),
            elements.len(),
            self.num_elements(),
            self.dim(),
            self.num_cells()
        );
        GlobalSimplexMesh::assemble(self.dim(), elements, coords).map_err(MeshError::config)
    }

    /// Full record of element `id`, including neighbours and facet tags.
    /// `None` for IDs at or beyond [`Self::num_elements`].
    pub fn element(&self, id: ElementId) -> Option<Element> {
        (id.get() < self.num_elements()).then(|| self.record(id))
    }

    /// Record of an ID known to be in range.
    fn record(&self, id: ElementId) -> Element {
        let per_cell = self.simplices_per_cell();
        let cell = self.cell_index(id.get() / per_cell);
        let perm = (id.get() % per_cell) as usize;
        let corners = self.simplex_corners(&cell, perm);
        let vertices: Vec<VertexId> = corners.iter().map(|c| self.vertex_id(c)).collect();

        let dim = self.dim();
        let facets = (0..=dim)
            .map(|f| {
                let key = facet_key(&vertices, f);
                let neighbor = self.neighbor_cell(&cell, perm, f).and_then(|other| {
                    (0..self.perms.len())
                        .filter(|&p| other != cell || p != perm)
                        .find(|&p| {
                            let vs: Vec<VertexId> = self
                                .simplex_corners(&other, p)
                                .iter()
                                .map(|c| self.vertex_id(c))
                                .collect();
                            local_facet_of(&vs, &key).is_some()
                        })
                        .map(|p| self.element_id(&other, p))
                });
                let on_facet: Vec<&Vec<usize>> = corners
                    .iter()
                    .enumerate()
                    .filter_map(|(i, c)| (i != f).then_some(c))
                    .collect();
                Facet {
                    neighbor,
                    bc: self.facet_bc(&on_facet),
                }
            })
            .collect();
        Element::new(id, vertices, facets, 0)
    }

    /// Cell holding the neighbour across facet `f` of simplex `perm` of `cell`,
    /// or `None` when that facet is on the outer boundary.
    fn neighbor_cell(&self, cell: &[usize], perm: usize, f: usize) -> Option<Vec<usize>> {
        let dim = self.dim();
        let pi = &self.perms[perm];
        let cells = self.cells_per_axis();
        let mut other = cell.to_vec();
        if f == 0 {
            // opposite the corner: on the upper face along π(0)
            let axis = pi[0];
            other[axis] += 1;
            (other[axis] < cells[axis]).then_some(other)
        } else if f == dim {
            // opposite the far corner: on the lower face along π(D-1)
            let axis = pi[dim - 1];
            other[axis] = other[axis].checked_sub(1)?;
            Some(other)
        } else {
            Some(other)
        }
    }

    fn cell_index(&self, mut linear: u64) -> Vec<usize> {
        self.cells_per_axis()
            .into_iter()
            .map(|n| {
                let i = (linear % n as u64) as usize;
                linear /= n as u64;
                i
            })
            .collect()
    }

    fn element_id(&self, cell: &[usize], perm: usize) -> ElementId {
        let cells = self.cells_per_axis();
        let mut linear = 0u64;
        for d in (0..cell.len()).rev() {
            linear = linear * cells[d] as u64 + cell[d] as u64;
        }
        ElementId::new(linear * self.simplices_per_cell() + perm as u64)
    }

    /// Grid-point multi-indices of the Kuhn simplex `perm` of `cell`.
    fn simplex_corners(&self, cell: &[usize], perm: usize) -> Vec<Vec<usize>> {
        let mut corner = cell.to_vec();
        let mut corners = Vec::with_capacity(cell.len() + 1);
        corners.push(corner.clone());
        for &axis in &self.perms[perm] {
            corner[axis] += 1;
            corners.push(corner.clone());
        }
        corners
    }

    fn vertex_id(&self, point: &[usize]) -> VertexId {
        let mut linear = 0u64;
        for d in (0..point.len()).rev() {
            linear = linear * self.lines[d].len() as u64 + point[d] as u64;
        }
        VertexId::new(linear)
    }

    fn vertex_coords(&self, v: VertexId) -> Vec<f64> {
        let mut linear = v.get();
        self.lines
            .iter()
            .map(|line| {
                let i = (linear % line.len() as u64) as usize;
                linear /= line.len() as u64;
                line[i]
            })
            .collect()
    }

    /// Tag of the facet through the grid points `on_facet`; later regions win.
    fn facet_bc(&self, on_facet: &[&Vec<usize>]) -> BoundaryCondition {
        let dim = self.dim();
        let mut bc = BoundaryCondition::None;
        for axis in 0..dim {
            let Some(first) = on_facet.first() else {
                break;
            };
            let g = first[axis];
            if on_facet.iter().any(|p| p[axis] != g) {
                continue;
            }
            for region in self.descriptor.regions(axis) {
                if self.intercept_at[axis][region.plane] != g {
                    continue;
                }
                let inside = match &region.region {
                    None => true,
                    Some(ranges) => (0..dim)
                        .filter(|&a| a != axis)
                        .zip(ranges)
                        .all(|(a, &[lo, hi])| {
                            let (lo, hi) = (self.intercept_at[a][lo], self.intercept_at[a][hi]);
                            on_facet.iter().all(|p| (lo..=hi).contains(&p[a]))
                        }),
                };
                if inside {
                    bc = region.bc;
                }
            }
        }
        bc
    }
}
