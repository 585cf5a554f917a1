//! Partitioning quality metrics.
//!
//! Edge cut and load imbalance of a part assignment over a [`DualGraph`]. Used
//! for logging and by the tests to compare partitions.

use crate::algs::dual_graph::DualGraph;

/// Number of dual-graph edges whose endpoints live in different parts.
pub fn edge_cut(g: &DualGraph, parts: &[usize]) -> usize {
    g.edges().filter(|&(u, v)| parts[u] != parts[v]).count()
}

/// Element count per part.
pub fn part_sizes(parts: &[usize], n_parts: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; n_parts];
    for &p in parts {
        if p < n_parts {
            sizes[p] += 1;
        }
    }
    sizes
}

/// Largest part size over the ideal `n / n_parts` (1.0 is perfect balance).
pub fn imbalance(parts: &[usize], n_parts: usize) -> f64 {
    if parts.is_empty() || n_parts == 0 {
        return 1.0;
    }
    let max = part_sizes(parts, n_parts).into_iter().max().unwrap_or(0);
    max as f64 / (parts.len() as f64 / n_parts as f64)
}

/// Size bound a part must respect for the given tolerance.
pub fn balance_limit(n: usize, n_parts: usize, tolerance: f64) -> usize {
    if n_parts == 0 {
        return n;
    }
    let ideal = n.div_ceil(n_parts);
    (((1.0 + tolerance) * n as f64 / n_parts as f64).ceil() as usize).max(ideal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::point::ElementId;

    fn cycle4() -> DualGraph {
        let e = ElementId::new;
        DualGraph::from_rows([
            (e(0), vec![e(1), e(3)]),
            (e(1), vec![e(0), e(2)]),
            (e(2), vec![e(1), e(3)]),
            (e(3), vec![e(2), e(0)]),
        ])
        .unwrap()
    }

    #[test]
    fn edge_cut_cycle() {
        let g = cycle4();
        assert_eq!(edge_cut(&g, &[0, 0, 0, 0]), 0);
        assert_eq!(edge_cut(&g, &[0, 0, 1, 1]), 2);
        assert_eq!(edge_cut(&g, &[0, 1, 0, 1]), 4);
    }

    #[test]
    fn imbalance_and_limits() {
        assert!((imbalance(&[0, 0, 1, 1], 2) - 1.0).abs() < 1e-12);
        assert!((imbalance(&[0, 0, 0, 1], 2) - 1.5).abs() < 1e-12);
        assert_eq!(balance_limit(10, 3, 0.0), 4);
        assert_eq!(balance_limit(100, 4, 0.05), 27);
        assert_eq!(part_sizes(&[2, 0, 2], 3), vec![1, 0, 2]);
    }
}
