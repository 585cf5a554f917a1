//! Ghost-layer extraction.
//!
//! [`GlobalSimplexMesh::get_local_mesh`] grows the owned elements of every rank
//! by `k` layers of facet neighbours. Each layer is one collective round: the
//! owners of the missing neighbours are looked up in the [`OwnerDirectory`],
//! then the records and vertex coordinates are fetched from those owners.

pub mod directory;
pub mod local;

pub use directory::OwnerDirectory;
pub use local::{LocalNeighbor, LocalSimplexMesh, Remote};

use crate::algs::collective::{EXCHANGE_TAGS, agree, exchange, tags};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{KIND_IDS, decode_list, decode_records, encode_list};
use crate::mesh::element::Element;
use crate::mesh::global::GlobalSimplexMesh;
use crate::mesh_error::{MeshError, Stage};
use crate::topology::point::{ElementId, VertexId};
use directory::{BUILD_TAGS, LOOKUP_TAGS};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Tags consumed by one expansion round (reused by every round).
const ROUND_TAGS: u16 = LOOKUP_TAGS + 2 * EXCHANGE_TAGS + 4;

impl GlobalSimplexMesh {
    /// Owned elements plus `k` ghost layers (collective).
    ///
    /// Every rank must pass the same `k`. With `k == 0` the result holds the
    /// owned elements only; their remote neighbours show up as
    /// [`LocalNeighbor::Exterior`].
    pub fn get_local_mesh<C>(&self, comm: &C, k: usize) -> Result<LocalSimplexMesh, MeshError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let stage = Stage::Overlap;
        let base = tags::OVERLAP;
        let directory = OwnerDirectory::build(comm, base, stage, self.owned_ids())?;

        let mut ghosts: BTreeMap<ElementId, (Element, Remote)> = BTreeMap::new();
        let mut coords: HashMap<VertexId, Vec<f64>> = self
            .vertices()
            .map(|(v, c)| (v, c.to_vec()))
            .collect();
        let mut frontier: Vec<ElementId> = self.owned_ids().collect();

        let round_tag = base.offset(BUILD_TAGS);
        for layer in 1..=k {
            let missing = self.missing_neighbors(&frontier, &ghosts);
            let fetched = self.fetch_layer(comm, &directory, round_tag, &missing)?;
            frontier.clear();
            for (e, owner) in fetched.elements {
                frontier.push(e.id);
                ghosts.insert(e.id, (e, Remote { rank: owner, layer }));
            }
            coords.extend(fetched.vertices);
            log::debug!(
                "rank {me}: overlap layer {layer} added {} ghosts",
                frontier.len()
            );
        }

        let local = LocalSimplexMesh::assemble(self.dim(), self.elements(), &ghosts, &coords, me);
        let local = agree(comm, round_tag.offset(ROUND_TAGS), stage, local)?;
        log::info!(
            "rank {me}: local mesh has {} owned and {} ghost elements over {} layers",
            local.num_owned(),
            local.num_ghosts(),
            k
        );
        Ok(local)
    }

    /// Neighbours of `frontier` that are neither owned nor already ghosts.
    fn missing_neighbors(
        &self,
        frontier: &[ElementId],
        ghosts: &BTreeMap<ElementId, (Element, Remote)>,
    ) -> Vec<ElementId> {
        let mut missing = BTreeSet::new();
        for id in frontier {
            let element = self.element(*id).or_else(|| ghosts.get(id).map(|(e, _)| e));
            let Some(element) = element else { continue };
            missing.extend(
                element
                    .neighbors()
                    .filter(|n| !self.owns(*n) && !ghosts.contains_key(n)),
            );
        }
        missing.into_iter().collect()
    }

    /// One collective round: look up owners of `missing` and fetch their records.
    fn fetch_layer<C>(
        &self,
        comm: &C,
        directory: &OwnerDirectory,
        tag: CommTag,
        missing: &[ElementId],
    ) -> Result<FetchedLayer, MeshError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let stage = Stage::Overlap;
        let owners = directory.lookup(comm, tag, stage, missing)?;

        let mut requests: Vec<Vec<u64>> = vec![Vec::new(); comm.size()];
        for id in missing {
            requests[owners[id]].push(id.get());
        }
        let requests = requests
            .iter()
            .map(|ids| {
                if ids.is_empty() {
                    Vec::new()
                } else {
                    encode_list(KIND_IDS, ids)
                }
            })
            .collect();
        let tag = tag.offset(LOOKUP_TAGS);
        let asked = exchange(comm, tag, stage, requests)?;

        let answers = self.answer_requests(me, &asked);
        let answers = agree(comm, tag.offset(EXCHANGE_TAGS), stage, answers)?;
        let tag = tag.offset(EXCHANGE_TAGS + 2);
        let replies = exchange(comm, tag, stage, answers)?;

        let fetched = FetchedLayer::decode(self.dim(), me, &replies);
        agree(comm, tag.offset(EXCHANGE_TAGS), stage, fetched)
    }

    fn answer_requests(&self, me: usize, asked: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, MeshError> {
        asked
            .iter()
            .enumerate()
            .map(|(src, bytes)| {
                let ids = decode_list(KIND_IDS, bytes).map_err(|e| MeshError::comm(me, e))?;
                let elements = ids
                    .into_iter()
                    .map(|id| {
                        self.element(ElementId::new(id)).ok_or_else(|| {
                            MeshError::comm(
                                me,
                                format!("rank {src} asked for element {id}, which is not owned here"),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.encode_batch(elements))
            })
            .collect()
    }
}

/// Records received in one round, tagged with the rank that sent them.
#[derive(Debug, Default)]
struct FetchedLayer {
    elements: Vec<(Element, usize)>,
    vertices: Vec<(VertexId, Vec<f64>)>,
}

impl FetchedLayer {
    fn decode(dim: usize, me: usize, replies: &[Vec<u8>]) -> Result<Self, MeshError> {
        let mut layer = FetchedLayer::default();
        for (src, bytes) in replies.iter().enumerate() {
            let batch = decode_records(dim, bytes)
                .map_err(|e| MeshError::comm(me, format!("ghosts from rank {src}: {e}")))?;
            layer
                .elements
                .extend(batch.elements.into_iter().map(|e| (e, src)));
            layer.vertices.extend(batch.vertices);
        }
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, on_ranks};
    use crate::mesh::element::Facet;
    use crate::topology::boundary::BoundaryCondition;

    /// Four segments on [0, 4]: element i spans vertices i, i+1.
    fn chain() -> GlobalSimplexMesh {
        let e = ElementId::new;
        let v = VertexId::new;
        let elements = (0..4u64)
            .map(|i| {
                let left = if i == 0 {
                    Facet::boundary(BoundaryCondition::Dirichlet)
                } else {
                    Facet::interior(e(i - 1))
                };
                let right = if i == 3 {
                    Facet::boundary(BoundaryCondition::Neumann)
                } else {
                    Facet::interior(e(i + 1))
                };
                // facet 0 is opposite vertex i, i.e. the right end
                Element::new(e(i), vec![v(i), v(i + 1)], vec![right, left], 0)
            })
            .collect();
        let vertices = (0..5u64).map(|i| (v(i), vec![i as f64]));
        GlobalSimplexMesh::from_parts(1, elements, vertices).unwrap()
    }

    #[test]
    fn single_rank_has_no_ghosts() {
        let mesh = chain();
        let local = mesh.get_local_mesh(&NoComm, 2).unwrap();
        assert_eq!(local.num_owned(), 4);
        assert_eq!(local.num_ghosts(), 0);
        assert_eq!(local.num_vertices(), 5);
        assert_eq!(
            local.facets(0)[1],
            LocalNeighbor::Boundary(BoundaryCondition::Dirichlet)
        );
        assert_eq!(local.facets(1), &[LocalNeighbor::Element(2), LocalNeighbor::Element(0)]);
    }

    #[test]
    fn missing_neighbors_skip_owned_and_known() {
        let whole = chain();
        let e = ElementId::new;
        let first_two: Vec<Element> = whole.elements()[..2].to_vec();
        let vertices = whole.vertices().map(|(v, c)| (v, c.to_vec()));
        let part = GlobalSimplexMesh::from_parts(1, first_two, vertices).unwrap();

        let owned: Vec<ElementId> = part.owned_ids().collect();
        assert_eq!(part.missing_neighbors(&owned, &BTreeMap::new()), vec![e(2)]);

        let mut ghosts = BTreeMap::new();
        let ghost = whole.element(e(2)).unwrap().clone();
        ghosts.insert(e(2), (ghost, Remote { rank: 1, layer: 1 }));
        assert_eq!(part.missing_neighbors(&[e(2)], &ghosts), vec![e(3)]);
        assert!(part.missing_neighbors(&owned, &ghosts).is_empty());
    }

    #[test]
    fn two_ranks_see_each_other_across_the_cut() {
        let ids = |r: &[u64]| r.iter().copied().map(ElementId::new).collect::<Vec<_>>();
        let out = on_ranks(2, |c| {
            let (mut mesh, owners) = if c.rank() == 0 {
                (chain(), vec![0, 0, 1, 1])
            } else {
                (GlobalSimplexMesh::empty(1), Vec::new())
            };
            mesh.migrate(&c, CommTag::new(1), Stage::Overlap, &owners)
                .unwrap();
            let local = mesh.get_local_mesh(&c, 1).unwrap();
            (local.l2g().to_vec(), local.remote(2), local.facets(2).to_vec())
        });
        assert_eq!(out[0].0, ids(&[0, 1, 2]));
        assert_eq!(out[0].1, Remote { rank: 1, layer: 1 });
        assert_eq!(
            out[0].2,
            vec![LocalNeighbor::Exterior(ElementId::new(3)), LocalNeighbor::Element(1)]
        );
        assert_eq!(out[1].0, ids(&[2, 3, 1]));
        assert_eq!(out[1].1, Remote { rank: 0, layer: 1 });
    }
}
