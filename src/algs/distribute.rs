//! Redistribution of a [`GlobalSimplexMesh`] across the ranks of a group.
//!
//! * [`GlobalSimplexMesh::repartition_by_hash`]: owner = fixed-seed hash of the
//!   element ID modulo the group size. Adjacency-blind; used to spread a mesh
//!   that was ingested on a single rank.
//! * [`GlobalSimplexMesh::repartition`]: topology-aware. Rank 0 gathers the
//!   dual-graph rows, partitions, relabels the parts to keep elements in place
//!   and hands each rank the new owners of its rows.
//!
//! Both finish with the collective [`GlobalSimplexMesh::migrate`].

use crate::algs::collective::{EXCHANGE_TAGS, agree, exchange, tags};
use crate::algs::communicator::Communicator;
use crate::algs::dual_graph::DualGraph;
use crate::algs::wire::{KIND_IDS, decode_list, encode_list};
use crate::mesh::global::GlobalSimplexMesh;
use crate::mesh_error::{MeshError, Stage};
use crate::partitioning::remap::{migration_volume, remap_to_current};
use crate::partitioning::{PartitionerConfig, partition};
use crate::topology::point::ElementId;
use ahash::RandomState;

/// Rank that runs the serial partitioner.
const PARTITION_ROOT: usize = 0;

/// Fixed seeds so every rank (and every run) hashes identically.
const HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Owner of `id` under hash scatter over `size` ranks.
pub fn hash_owner(id: ElementId, size: usize) -> usize {
    let state = RandomState::with_seeds(HASH_SEEDS[0], HASH_SEEDS[1], HASH_SEEDS[2], HASH_SEEDS[3]);
    (state.hash_one(id.get()) % size.max(1) as u64) as usize
}

impl GlobalSimplexMesh {
    /// Scatter elements by hashing their global IDs (collective).
    ///
    /// Returns the number of elements this rank sent away.
    pub fn repartition_by_hash<C>(&mut self, comm: &C) -> Result<usize, MeshError>
    where
        C: Communicator,
    {
        let size = comm.size();
        if size == 1 {
            return Ok(0);
        }
        let owners: Vec<usize> = self.owned_ids().map(|id| hash_owner(id, size)).collect();
        self.migrate(comm, tags::MIGRATE, Stage::HashScatter, &owners)
    }

    /// Balanced, cut-minimizing repartition along the dual graph (collective).
    ///
    /// No-op on a single rank. Calling it twice in a row moves nothing the
    /// second time. Returns the number of elements this rank sent away.
    ///
    /// The partitioner is serial: every rank sends its dual-graph rows to
    /// rank 0, so memory there grows with the global element count while
    /// the graph is partitioned. On a [`MeshError::Partitioning`] failure
    /// every rank returns the error and the mesh is left as it was.
    pub fn repartition<C>(&mut self, comm: &C, cfg: &PartitionerConfig) -> Result<usize, MeshError>
    where
        C: Communicator,
    {
        let size = comm.size();
        let me = comm.rank();
        if size == 1 {
            return Ok(0);
        }
        let stage = Stage::Repartition;
        let tag = tags::REPARTITION;

        // 1) rows: id, neighbour count, neighbours...
        let mut rows = Vec::new();
        for e in self.elements() {
            let nbrs: Vec<u64> = e.neighbors().map(ElementId::get).collect();
            rows.push(e.id.get());
            rows.push(nbrs.len() as u64);
            rows.extend(nbrs);
        }
        let mut sends = vec![Vec::new(); size];
        if !rows.is_empty() {
            sends[PARTITION_ROOT] = encode_list(KIND_IDS, &rows);
        }
        let gathered = exchange(comm, tag, stage, sends)?;

        // 2) partition on the root
        let answers = if me == PARTITION_ROOT {
            partition_rows(me, size, cfg, &gathered)
        } else {
            Ok(vec![Vec::new(); size])
        };
        let answers = agree(comm, tag.offset(EXCHANGE_TAGS), stage, answers)?;
        let replies = exchange(comm, tag.offset(EXCHANGE_TAGS + 2), stage, answers)?;

        // 3) new owners of our rows, then move
        let owners = decode_list(KIND_IDS, &replies[PARTITION_ROOT])
            .map_err(|e| MeshError::comm(me, e))
            .and_then(|o| {
                if o.len() == self.num_owned() {
                    Ok(o.into_iter().map(|r| r as usize).collect::<Vec<_>>())
                } else {
                    Err(MeshError::comm(
                        me,
                        format!("got {} owners for {} elements", o.len(), self.num_owned()),
                    ))
                }
            });
        let owners = agree(comm, tag.offset(2 * EXCHANGE_TAGS + 2), stage, owners)?;
        self.migrate(comm, tag.offset(2 * EXCHANGE_TAGS + 4), stage, &owners)
    }
}

type Rows = Vec<(ElementId, Vec<ElementId>)>;

fn decode_rows(me: usize, src: usize, bytes: &[u8]) -> Result<Rows, MeshError> {
    let words = decode_list(KIND_IDS, bytes).map_err(|e| MeshError::comm(me, e))?;
    let truncated = || MeshError::comm(me, format!("truncated dual-graph rows from rank {src}"));
    let mut rows = Vec::new();
    let mut at = 0;
    while at < words.len() {
        let id = ElementId::new(words[at]);
        let n = *words.get(at + 1).ok_or_else(truncated)? as usize;
        let nbrs = words.get(at + 2..at + 2 + n).ok_or_else(truncated)?;
        rows.push((id, nbrs.iter().copied().map(ElementId::new).collect()));
        at += 2 + n;
    }
    Ok(rows)
}

/// Runs on the root: partition the gathered rows and encode, per sender, the
/// new owner of each of its rows in the order they were sent.
fn partition_rows(
    me: usize,
    size: usize,
    cfg: &PartitionerConfig,
    gathered: &[Vec<u8>],
) -> Result<Vec<Vec<u8>>, MeshError> {
    let per_rank: Vec<Rows> = gathered
        .iter()
        .enumerate()
        .map(|(src, bytes)| decode_rows(me, src, bytes))
        .collect::<Result<_, _>>()?;

    let graph = DualGraph::from_rows(per_rank.iter().flatten().cloned()).map_err(|d| {
        MeshError::comm(
            me,
            format!(
                "element {} references neighbour {} that no rank owns",
                d.element, d.neighbor
            ),
        )
    })?;
    let n_rows: usize = per_rank.iter().map(Vec::len).sum();
    if graph.num_vertices() != n_rows {
        return Err(MeshError::comm(me, "an element is owned by more than one rank"));
    }

    let mut current = vec![0usize; graph.num_vertices()];
    for (src, rows) in per_rank.iter().enumerate() {
        for (id, _) in rows {
            if let Ok(i) = graph.order.binary_search(id) {
                current[i] = src;
            }
        }
    }
    let parts = partition(&graph, size, cfg)?;
    let parts = remap_to_current(&parts, &current, size);
    log::info!(
        "repartition moves {} of {} elements",
        migration_volume(&parts, &current),
        graph.num_vertices()
    );

    Ok(per_rank
        .iter()
        .map(|rows| {
            let owners: Vec<u64> = rows
                .iter()
                .map(|(id, _)| {
                    graph
                        .order
                        .binary_search(id)
                        .map_or(PARTITION_ROOT as u64, |i| parts[i] as u64)
                })
                .collect();
            encode_list(KIND_IDS, &owners)
        })
        .collect())
}
