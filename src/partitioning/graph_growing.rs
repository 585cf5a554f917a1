//! Deterministic greedy graph-growing partitioner with boundary refinement.
//!
//! Parts are grown one at a time to their exact target size. A part starts
//! from the unassigned vertex of smallest degree and absorbs the frontier
//! vertex with the most edges into the part (ties broken by lowest index).
//! When the frontier runs dry before the target is reached (disconnected
//! graph) the part is re-seeded. The last part takes whatever remains.
//!
//! Afterwards, refinement passes move boundary vertices to a neighbouring part
//! when that strictly lowers the edge cut and keeps every part within the
//! balance limit.

use crate::algs::dual_graph::DualGraph;
use crate::partitioning::error::PartitionerError;
use crate::partitioning::metrics::balance_limit;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Target size of every part: `n / k`, the first `n % k` parts one larger.
pub fn target_sizes(n: usize, k: usize) -> Vec<usize> {
    (0..k).map(|p| n / k + usize::from(p < n % k)).collect()
}

/// Grow `k` parts over `g`; returns the part of every CSR vertex.
pub fn grow_parts(g: &DualGraph, k: usize) -> Result<Vec<usize>, PartitionerError> {
    if k == 0 {
        return Err(PartitionerError::InvalidConfig(
            "number of parts must be at least 1".into(),
        ));
    }
    let n = g.num_vertices();
    let mut part: Vec<Option<usize>> = vec![None; n];
    if n == 0 {
        return Ok(Vec::new());
    }

    // seeds are taken in (degree, index) order
    let mut seed_order: Vec<usize> = (0..n).collect();
    seed_order.sort_by_key(|&v| (g.degree(v), v));
    let mut seed_cursor = 0;

    let targets = target_sizes(n, k);
    let mut conn = vec![0usize; n];
    for (p, &target) in targets.iter().enumerate().take(k - 1) {
        let mut size = 0;
        let mut heap: BinaryHeap<(usize, Reverse<usize>)> = BinaryHeap::new();
        let mut touched: Vec<usize> = Vec::new();
        while size < target {
            let Some((c, Reverse(v))) = heap.pop() else {
                // 1) frontier exhausted: re-seed
                while seed_cursor < n && part[seed_order[seed_cursor]].is_some() {
                    seed_cursor += 1;
                }
                let Some(&seed) = seed_order.get(seed_cursor) else {
                    break;
                };
                heap.push((0, Reverse(seed)));
                continue;
            };
            // 2) skip stale heap entries
            if part[v].is_some() || c != conn[v] {
                continue;
            }
            part[v] = Some(p);
            size += 1;
            for &u in g.neighbors(v) {
                if part[u].is_none() {
                    conn[u] += 1;
                    touched.push(u);
                    heap.push((conn[u], Reverse(u)));
                }
            }
        }
        for u in touched {
            conn[u] = 0;
        }
    }
    let last = k - 1;
    Ok(part.into_iter().map(|p| p.unwrap_or(last)).collect())
}

/// Move boundary vertices between parts while the cut strictly improves.
///
/// Returns the number of moves made.
pub fn refine(g: &DualGraph, parts: &mut [usize], k: usize, limit: usize, passes: usize) -> usize {
    let mut sizes = vec![0usize; k];
    for &p in parts.iter() {
        sizes[p] += 1;
    }
    let mut moves = 0;
    let mut links = vec![0usize; k];
    for _ in 0..passes {
        let mut moved = false;
        for v in 0..g.num_vertices() {
            let from = parts[v];
            if sizes[from] <= 1 {
                continue;
            }
            for &u in g.neighbors(v) {
                links[parts[u]] += 1;
            }
            let mut best: Option<(usize, usize)> = None;
            for &u in g.neighbors(v) {
                let to = parts[u];
                if to == from || sizes[to] + 1 > limit || links[to] <= links[from] {
                    continue;
                }
                let gain = links[to] - links[from];
                let better = match best {
                    None => true,
                    Some((bg, bp)) => gain > bg || (gain == bg && to < bp),
                };
                if better {
                    best = Some((gain, to));
                }
            }
            for &u in g.neighbors(v) {
                links[parts[u]] = 0;
            }
            if let Some((_, to)) = best {
                parts[v] = to;
                sizes[from] -= 1;
                sizes[to] += 1;
                moves += 1;
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }
    moves
}

/// Grow then refine; the result respects the balance limit for `tolerance`.
pub fn partition(
    g: &DualGraph,
    k: usize,
    tolerance: f64,
    passes: usize,
) -> Result<Vec<usize>, PartitionerError> {
    let mut parts = grow_parts(g, k)?;
    let limit = balance_limit(g.num_vertices(), k, tolerance);
    let moves = refine(g, &mut parts, k, limit, passes);
    log::debug!("graph growing: {k} parts, {moves} refinement moves");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioning::metrics::{edge_cut, part_sizes};
    use crate::topology::point::ElementId;

    /// Path 0-1-2-...-(n-1).
    fn path(n: u64) -> DualGraph {
        DualGraph::from_rows((0..n).map(|i| {
            let nbrs: Vec<ElementId> = [i.checked_sub(1), (i + 1 < n).then_some(i + 1)]
                .into_iter()
                .flatten()
                .map(ElementId::new)
                .collect();
            (ElementId::new(i), nbrs)
        }))
        .unwrap()
    }

    #[test]
    fn targets_sum_to_n() {
        assert_eq!(target_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(target_sizes(2, 4), vec![1, 1, 0, 0]);
    }

    #[test]
    fn path_splits_into_contiguous_runs() {
        let g = path(12);
        let parts = partition(&g, 3, 0.0, 4).unwrap();
        assert_eq!(part_sizes(&parts, 3), vec![4, 4, 4]);
        assert_eq!(edge_cut(&g, &parts), 2);
    }

    #[test]
    fn disconnected_components_are_reseeded() {
        let e = ElementId::new;
        // two disjoint edges and an isolated vertex
        let g = DualGraph::from_rows([
            (e(0), vec![e(1)]),
            (e(1), vec![]),
            (e(2), vec![e(3)]),
            (e(3), vec![]),
            (e(4), vec![]),
        ])
        .unwrap();
        let parts = grow_parts(&g, 2).unwrap();
        assert_eq!(part_sizes(&parts, 2), vec![3, 2]);
    }

    #[test]
    fn zero_parts_is_invalid() {
        assert!(matches!(
            grow_parts(&path(3), 0),
            Err(PartitionerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn deterministic() {
        let g = path(31);
        assert_eq!(
            partition(&g, 4, 0.1, 3).unwrap(),
            partition(&g, 4, 0.1, 3).unwrap()
        );
    }
}
