#![allow(dead_code)]
use dist_simplex_mesh::algs::communicator::{Communicator, ThreadComm};
use dist_simplex_mesh::mesh::GlobalSimplexMesh;
use dist_simplex_mesh::mesh_generation::{MeshDescriptor, StructuredMeshGenerator};
use dist_simplex_mesh::topology::point::ElementId;
use std::collections::BTreeMap;

/// Run `f` on every rank of an in-process group of `n`; results by rank.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
{
    let group = ThreadComm::group(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = group.into_iter().map(|c| s.spawn(|| f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn unit_box(dim: usize) -> MeshDescriptor {
    MeshDescriptor::new(vec![vec![0.0, 1.0]; dim])
}

/// Generate `descriptor` at `resolution` on the calling rank's share.
pub fn generate<C: Communicator>(
    descriptor: &MeshDescriptor,
    resolution: f64,
    comm: &C,
) -> GlobalSimplexMesh {
    StructuredMeshGenerator::new(descriptor.clone(), resolution)
        .unwrap()
        .uniform_mesh(comm)
        .unwrap()
}

/// Neighbour lists of every element of a whole (single-rank) mesh.
pub fn adjacency(mesh: &GlobalSimplexMesh) -> BTreeMap<ElementId, Vec<ElementId>> {
    mesh.elements()
        .iter()
        .map(|e| (e.id, e.neighbors().collect()))
        .collect()
}

/// Elements within `k` facet steps of `seeds`, seeds included.
pub fn within(
    adj: &BTreeMap<ElementId, Vec<ElementId>>,
    seeds: impl IntoIterator<Item = ElementId>,
    k: usize,
) -> BTreeMap<ElementId, usize> {
    let mut dist: BTreeMap<ElementId, usize> = seeds.into_iter().map(|s| (s, 0)).collect();
    let mut frontier: Vec<ElementId> = dist.keys().copied().collect();
    for layer in 1..=k {
        let mut next = Vec::new();
        for e in frontier {
            for &n in &adj[&e] {
                if !dist.contains_key(&n) {
                    dist.insert(n, layer);
                    next.push(n);
                }
            }
        }
        frontier = next;
    }
    dist
}
