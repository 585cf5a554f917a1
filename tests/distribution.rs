mod util;

use dist_simplex_mesh::algs::communicator::Communicator;
use dist_simplex_mesh::algs::dual_graph::DualGraph;
use dist_simplex_mesh::algs::hash_owner;
use dist_simplex_mesh::mesh_error::MeshError;
use dist_simplex_mesh::partitioning::{PartitionerConfig, PartitionerKind, balance_limit};
use dist_simplex_mesh::topology::ElementId;
use std::collections::BTreeSet;
use util::{generate, run_ranks, unit_box};

#[test]
fn hash_scatter_keeps_every_element_once() {
    let d = unit_box(2);
    let out = run_ranks(4, |c| {
        let mut mesh = generate(&d, 0.125, &c);
        mesh.repartition_by_hash(&c).unwrap();
        mesh.verify(&c).unwrap();
        for id in mesh.owned_ids() {
            assert_eq!(hash_owner(id, 4), c.rank());
        }
        assert_eq!(mesh.global_element_count(&c).unwrap(), 128);
        mesh.owned_ids().collect::<Vec<_>>()
    });
    let all: BTreeSet<ElementId> = out.iter().flatten().copied().collect();
    assert_eq!(all.len(), 128);
    assert_eq!(out.iter().map(Vec::len).sum::<usize>(), 128);
}

#[test]
fn repartition_is_balanced_and_idempotent() {
    let d = unit_box(2);
    let cfg = PartitionerConfig::default();
    let out = run_ranks(3, |c| {
        let mut mesh = generate(&d, 0.125, &c);
        mesh.repartition_by_hash(&c).unwrap();
        mesh.repartition(&c, &cfg).unwrap();
        mesh.verify(&c).unwrap();
        let owned = mesh.num_owned();
        let again = mesh.repartition(&c, &cfg).unwrap();
        (owned, again, mesh.num_owned())
    });
    let limit = balance_limit(128, 3, cfg.tolerance);
    for (owned, again, after) in out {
        assert!(owned <= limit, "{owned} > {limit}");
        assert!(owned > 0);
        assert_eq!(again, 0);
        assert_eq!(after, owned);
    }
}

#[test]
fn repartition_reduces_the_cut_of_a_hash_scatter() {
    let d = unit_box(2);
    let cfg = PartitionerConfig::default();
    let cut_of = |hashed_only: bool| -> usize {
        let owners = run_ranks(4, |c| {
            let mut mesh = generate(&d, 0.125, &c);
            mesh.repartition_by_hash(&c).unwrap();
            if !hashed_only {
                mesh.repartition(&c, &cfg).unwrap();
            }
            mesh.owned_ids().map(|id| (id, c.rank())).collect::<Vec<_>>()
        });
        let serial = generate(&d, 0.125, &dist_simplex_mesh::algs::communicator::NoComm);
        let graph = DualGraph::from_rows(
            serial
                .elements()
                .iter()
                .map(|e| (e.id, e.neighbors().collect::<Vec<_>>())),
        )
        .unwrap();
        let mut parts = vec![0; graph.num_vertices()];
        for (id, rank) in owners.into_iter().flatten() {
            let v = graph.order.binary_search(&id).unwrap();
            parts[v] = rank;
        }
        dist_simplex_mesh::partitioning::edge_cut(&graph, &parts)
    };
    assert!(cut_of(false) < cut_of(true));
}

#[test]
fn three_dimensional_box_over_two_ranks() {
    let d = unit_box(3);
    let cfg = PartitionerConfig::default();
    let out = run_ranks(2, |c| {
        let mut mesh = generate(&d, 0.25, &c);
        mesh.repartition(&c, &cfg).unwrap();
        mesh.verify(&c).unwrap();
        mesh.num_owned()
    });
    assert_eq!(out.iter().sum::<usize>(), 64 * 6);
    let limit = balance_limit(384, 2, cfg.tolerance);
    assert!(out.iter().all(|&n| n <= limit));
}

#[cfg(not(feature = "metis-support"))]
#[test]
fn failed_partitioning_leaves_the_mesh_for_a_retry() {
    let d = unit_box(2);
    let metis = PartitionerConfig {
        kind: PartitionerKind::Metis,
        ..PartitionerConfig::default()
    };
    let out = run_ranks(3, |c| {
        let mut mesh = generate(&d, 0.25, &c);
        let before: Vec<ElementId> = mesh.owned_ids().collect();
        let failed = mesh.repartition(&c, &metis);
        let after: Vec<ElementId> = mesh.owned_ids().collect();
        let retried = mesh.repartition(&c, &PartitionerConfig::default());
        let verified = mesh.verify(&c);
        (failed, before == after, retried, verified, mesh.num_owned())
    });
    for (rank, (failed, untouched, retried, verified, _)) in out.iter().enumerate() {
        assert!(
            matches!(failed, Err(MeshError::Partitioning(_))),
            "rank {rank}: {failed:?}"
        );
        assert!(untouched, "rank {rank} changed after a failed repartition");
        assert!(retried.is_ok(), "rank {rank}: {retried:?}");
        assert!(verified.is_ok(), "rank {rank}: {verified:?}");
    }
    assert_eq!(out.iter().map(|r| r.4).sum::<usize>(), 32);
}
