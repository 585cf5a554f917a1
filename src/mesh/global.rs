//! The global distributed simplex mesh.
//!
//! Each rank holds the elements it owns, sorted by global ID, together with
//! the coordinates of every vertex those elements reference. Neighbours are
//! stored as global IDs and may live on other ranks. IDs never change; only
//! ownership does, through the collective [`GlobalSimplexMesh::migrate`]
//! used by the redistribution algorithms in [`crate::algs::distribute`].

use crate::algs::collective::{EXCHANGE_TAGS, agree, all_reduce_sum, exchange, tags};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{
    KIND_TRIPLES, NO_NEIGHBOR, decode_list, decode_records, encode_list, encode_records,
};
use crate::mesh::element::Element;
use crate::mesh_error::{MeshError, Stage};
use crate::overlap::directory::{BUILD_TAGS, LOOKUP_TAGS, OwnerDirectory};
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSimplexMesh {
    dim: usize,
    elements: Vec<Element>,
    index: HashMap<ElementId, usize>,
    vertices: BTreeMap<VertexId, Vec<f64>>,
}

impl GlobalSimplexMesh {
    /// A rank that owns nothing.
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            elements: Vec::new(),
            index: HashMap::new(),
            vertices: BTreeMap::new(),
        }
    }

    /// Assemble the owned part of a mesh from element records and vertex
    /// coordinates. Coordinates of vertices no element references are dropped.
    pub fn from_parts<V>(dim: usize, elements: Vec<Element>, vertices: V) -> Result<Self, MeshError>
    where
        V: IntoIterator<Item = (VertexId, Vec<f64>)>,
    {
        Self::assemble(dim, elements, vertices).map_err(MeshError::config)
    }

    pub(crate) fn assemble<V>(dim: usize, mut elements: Vec<Element>, vertices: V) -> Result<Self, String>
    where
        V: IntoIterator<Item = (VertexId, Vec<f64>)>,
    {
        elements.sort_unstable_by_key(|e| e.id);
        let mut index = HashMap::with_capacity(elements.len());
        for (i, e) in elements.iter().enumerate() {
            if e.vertices.len() != dim + 1 || e.facets.len() != dim + 1 {
                return Err(format!(
                    "element {} has {} vertices and {} facets, expected {}",
                    e.id,
                    e.vertices.len(),
                    e.facets.len(),
                    dim + 1
                ));
            }
            if e.id.get() == NO_NEIGHBOR {
                return Err(format!("element id {} is reserved", e.id));
            }
            if index.insert(e.id, i).is_some() {
                return Err(format!("element {} appears twice", e.id));
            }
        }

        let mut all: HashMap<VertexId, Vec<f64>> = HashMap::new();
        for (id, coords) in vertices {
            if coords.len() != dim {
                return Err(format!(
                    "vertex {id} has {} coordinates, expected {dim}",
                    coords.len()
                ));
            }
            all.insert(id, coords);
        }
        let mut kept = BTreeMap::new();
        for e in &elements {
            for &v in &e.vertices {
                if kept.contains_key(&v) {
                    continue;
                }
                let coords = all
                    .get(&v)
                    .ok_or_else(|| format!("element {} references vertex {v} without coordinates", e.id))?;
                kept.insert(v, coords.clone());
            }
        }
        Ok(Self {
            dim,
            elements,
            index,
            vertices: kept,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of elements owned by this rank.
    pub fn num_owned(&self) -> usize {
        self.elements.len()
    }

    /// Owned elements in ascending global ID.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.index.get(&id).map(|&i| &self.elements[i])
    }

    pub fn owns(&self, id: ElementId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn owned_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.iter().map(|e| e.id)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&[f64]> {
        self.vertices.get(&id).map(Vec::as_slice)
    }

    /// Vertices referenced by owned elements, ascending by ID.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &[f64])> + '_ {
        self.vertices.iter().map(|(&id, c)| (id, c.as_slice()))
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Wire batch with `elements` and the coordinates of their vertices.
    pub(crate) fn encode_batch<'a, I>(&'a self, elements: I) -> Vec<u8>
    where
        I: IntoIterator<Item = &'a Element>,
    {
        let elements: Vec<&Element> = elements.into_iter().collect();
        if elements.is_empty() {
            return Vec::new();
        }
        let verts: BTreeSet<VertexId> = elements
            .iter()
            .flat_map(|e| e.vertices.iter().copied())
            .collect();
        encode_records(
            self.dim,
            elements,
            verts
                .into_iter()
                .filter_map(|v| self.vertex(v).map(|c| (v, c))),
        )
    }

    /// Send every owned element to `owners[i]` (parallel to [`Self::elements`]).
    ///
    /// Collective. The new owned set replaces the old one on every rank, or
    /// nothing changes anywhere. Returns the number of elements this rank
    /// sent away.
    pub fn migrate<C>(&mut self, comm: &C, tag: CommTag, stage: Stage, owners: &[usize]) -> Result<usize, MeshError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let size = comm.size();
        let check = if owners.len() != self.elements.len() {
            Err(MeshError::comm(
                me,
                format!(
                    "{} owners given for {} elements",
                    owners.len(),
                    self.elements.len()
                ),
            ))
        } else if let Some(&bad) = owners.iter().find(|&&o| o >= size) {
            Err(MeshError::comm(
                me,
                format!("owner {bad} outside group of {size}"),
            ))
        } else {
            Ok(())
        };
        agree(comm, tag, stage, check)?;

        let mut by_dest: Vec<Vec<&Element>> = vec![Vec::new(); size];
        for (e, &o) in self.elements.iter().zip(owners) {
            by_dest[o].push(e);
        }
        let sent_away = owners.iter().filter(|&&o| o != me).count();
        let sends: Vec<Vec<u8>> = by_dest
            .into_iter()
            .map(|elems| self.encode_batch(elems))
            .collect();
        let received = exchange(comm, tag.offset(2), stage, sends)?;

        let rebuilt = self.rebuild_from(me, &received);
        let rebuilt = agree(comm, tag.offset(2 + EXCHANGE_TAGS), stage, rebuilt)?;
        log::debug!(
            "rank {me}: {stage} sent {sent_away} elements, now owns {}",
            rebuilt.num_owned()
        );
        *self = rebuilt;
        Ok(sent_away)
    }

    fn rebuild_from(&self, me: usize, received: &[Vec<u8>]) -> Result<Self, MeshError> {
        let mut elements = Vec::new();
        let mut vertices = Vec::new();
        for (src, bytes) in received.iter().enumerate() {
            let batch = decode_records(self.dim, bytes)
                .map_err(|e| MeshError::comm(me, format!("records from rank {src}: {e}")))?;
            elements.extend(batch.elements);
            vertices.extend(batch.vertices);
        }
        Self::assemble(self.dim, elements, vertices).map_err(|e| MeshError::comm(me, e))
    }

    /// Total number of elements over the group (collective).
    pub fn global_element_count<C>(&self, comm: &C) -> Result<u64, MeshError>
    where
        C: Communicator,
    {
        all_reduce_sum(comm, tags::COUNT, self.num_owned() as u64)
    }

    /// Check the distributed invariants (collective).
    ///
    /// Every element is owned by exactly one rank, every referenced neighbour
    /// is owned by some rank, and each neighbour lists the element back across
    /// a facet carrying the same boundary tag.
    pub fn verify<C>(&self, comm: &C) -> Result<(), MeshError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let size = comm.size();
        let stage = Stage::Verify;
        let tag = tags::VERIFY;
        let dir = OwnerDirectory::build(comm, tag, stage, self.owned_ids())?;

        let remote: BTreeSet<ElementId> = self
            .elements
            .iter()
            .flat_map(|e| e.neighbors())
            .filter(|n| !self.owns(*n))
            .collect();
        let remote: Vec<ElementId> = remote.into_iter().collect();
        let owner_of = dir.lookup(comm, tag.offset(BUILD_TAGS), stage, &remote)?;

        // (neighbour, element, tag) triples, checked by the neighbour's owner
        let mut triples: Vec<Vec<u64>> = vec![Vec::new(); size];
        for e in &self.elements {
            for f in &e.facets {
                let Some(n) = f.neighbor else { continue };
                let dest = if self.owns(n) { me } else { owner_of[&n] };
                triples[dest].extend([n.get(), e.id.get(), f.bc.code()]);
            }
        }
        let sends = triples
            .iter()
            .map(|t| {
                if t.is_empty() {
                    Vec::new()
                } else {
                    encode_list(KIND_TRIPLES, t)
                }
            })
            .collect();
        let received = exchange(comm, tag.offset(BUILD_TAGS + LOOKUP_TAGS), stage, sends)?;
        let checked = self.check_back_references(me, &received);
        agree(
            comm,
            tag.offset(BUILD_TAGS + LOOKUP_TAGS + EXCHANGE_TAGS),
            stage,
            checked,
        )?;
        log::info!("rank {me}: verified {} owned elements", self.num_owned());
        Ok(())
    }

    fn check_back_references(&self, me: usize, received: &[Vec<u8>]) -> Result<(), MeshError> {
        for (src, bytes) in received.iter().enumerate() {
            let words = decode_list(KIND_TRIPLES, bytes).map_err(|e| MeshError::comm(me, e))?;
            if words.len() % 3 != 0 {
                return Err(MeshError::comm(me, format!("truncated adjacency check from rank {src}")));
            }
            for t in words.chunks_exact(3) {
                let (target, from) = (ElementId::new(t[0]), ElementId::new(t[1]));
                let e = self.element(target).ok_or_else(|| {
                    MeshError::comm(me, format!("rank {src} expected element {target} here"))
                })?;
                let facet = e.facet_towards(from).ok_or_else(|| {
                    MeshError::comm(
                        me,
                        format!("element {from} lists {target} as neighbour but not vice versa"),
                    )
                })?;
                let bc = BoundaryCondition::from_code(t[2]);
                if bc != Some(e.facets[facet].bc) {
                    return Err(MeshError::comm(
                        me,
                        format!("facet between {from} and {target} carries different tags"),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::mesh::element::Facet;

    fn two_triangles() -> GlobalSimplexMesh {
        let v = VertexId::new;
        let e = ElementId::new;
        let a = Element::new(
            e(1),
            vec![v(0), v(1), v(2)],
            vec![
                Facet::interior(e(0)),
                Facet::boundary(BoundaryCondition::Dirichlet),
                Facet::boundary(BoundaryCondition::None),
            ],
            0,
        );
        let b = Element::new(
            e(0),
            vec![v(3), v(2), v(1)],
            vec![
                Facet::interior(e(1)),
                Facet::boundary(BoundaryCondition::None),
                Facet::boundary(BoundaryCondition::None),
            ],
            0,
        );
        let coords = vec![
            (v(0), vec![0.0, 0.0]),
            (v(1), vec![1.0, 0.0]),
            (v(2), vec![0.0, 1.0]),
            (v(3), vec![1.0, 1.0]),
            (v(9), vec![5.0, 5.0]),
        ];
        GlobalSimplexMesh::from_parts(2, vec![a, b], coords).unwrap()
    }

    #[test]
    fn elements_are_sorted_and_unused_vertices_dropped() {
        let m = two_triangles();
        assert_eq!(m.owned_ids().collect::<Vec<_>>(), vec![ElementId::new(0), ElementId::new(1)]);
        assert_eq!(m.num_vertices(), 4);
        assert_eq!(m.vertex(VertexId::new(3)), Some(&[1.0, 1.0][..]));
        assert!(m.vertex(VertexId::new(9)).is_none());
    }

    #[test]
    fn assemble_rejects_missing_coordinates() {
        let m = two_triangles();
        let err = GlobalSimplexMesh::from_parts(2, m.elements().to_vec(), Vec::new()).unwrap_err();
        assert!(matches!(err, MeshError::Configuration(_)));
    }

    #[test]
    fn verify_and_count_on_one_rank() {
        let m = two_triangles();
        m.verify(&NoComm).unwrap();
        assert_eq!(m.global_element_count(&NoComm).unwrap(), 2);
    }

    #[test]
    fn verify_catches_one_sided_adjacency() {
        let m = two_triangles();
        let mut elements = m.elements().to_vec();
        elements[0].facets[0] = Facet::boundary(BoundaryCondition::None);
        let broken = GlobalSimplexMesh::from_parts(2, elements, m.vertices().map(|(v, c)| (v, c.to_vec())))
            .unwrap();
        assert!(matches!(
            broken.verify(&NoComm),
            Err(MeshError::Communication { .. })
        ));
    }

    #[test]
    fn migrate_to_self_keeps_everything() {
        let mut m = two_triangles();
        let before = m.clone();
        let moved = m.migrate(&NoComm, CommTag::new(1), Stage::HashScatter, &[0, 0]).unwrap();
        assert_eq!(moved, 0);
        assert_eq!(m, before);
    }
}
