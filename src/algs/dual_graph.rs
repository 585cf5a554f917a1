//! Build a CSR (compressed-sparse-row) *dual graph* of a simplex mesh.
//
// Each element is a graph vertex; an undirected edge joins two elements that
// share a facet. Returned as METIS-ready CSR arrays:
//
// * `xadj[i] .. xadj[i+1]`   = neighbour list of element *i*
// * `adjncy`                 = concatenated neighbour vertices
// * `vwgt[i]`                = vertex weight, default = 1
//
// The graph is symmetrised (i↔j appear in both lists) and self-free.

use crate::topology::point::ElementId;
use std::collections::HashMap;

/// CSR triple plus the element each CSR vertex stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualGraph {
    pub xadj: Vec<usize>,
    pub adjncy: Vec<usize>,
    pub vwgt: Vec<i32>,
    /// CSR vertex → element, ascending.
    pub order: Vec<ElementId>,
}

/// A neighbour referenced by a row that is not itself a row of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingNeighbor {
    pub element: ElementId,
    pub neighbor: ElementId,
}

impl DualGraph {
    /// Build from facet-adjacency rows `(element, neighbours)`.
    ///
    /// Rows are ordered by element ID so the graph is independent of where the
    /// rows came from. Edges are symmetrised, so a one-sided adjacency still
    /// yields an undirected graph.
    pub fn from_rows<I, N>(rows: I) -> Result<Self, DanglingNeighbor>
    where
        I: IntoIterator<Item = (ElementId, N)>,
        N: IntoIterator<Item = ElementId>,
    {
        let mut rows: Vec<(ElementId, Vec<ElementId>)> = rows
            .into_iter()
            .map(|(e, n)| (e, n.into_iter().collect()))
            .collect();
        rows.sort_unstable_by_key(|(e, _)| *e);
        rows.dedup_by_key(|(e, _)| *e);

        let order: Vec<ElementId> = rows.iter().map(|(e, _)| *e).collect();
        let idx_of: HashMap<ElementId, usize> =
            order.iter().enumerate().map(|(i, &e)| (e, i)).collect();

        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); order.len()];
        for (i, (element, nbrs)) in rows.iter().enumerate() {
            for nbr in nbrs {
                let &j = idx_of.get(nbr).ok_or(DanglingNeighbor {
                    element: *element,
                    neighbor: *nbr,
                })?;
                if i != j {
                    adj[i].push(j);
                    adj[j].push(i);
                }
            }
        }

        let mut xadj = Vec::with_capacity(order.len() + 1);
        let mut adjncy = Vec::new();
        xadj.push(0);
        for nbrs in &mut adj {
            nbrs.sort_unstable();
            nbrs.dedup();
            adjncy.extend(nbrs.iter().copied());
            xadj.push(adjncy.len());
        }
        let vwgt = vec![1; order.len()];
        Ok(DualGraph {
            xadj,
            adjncy,
            vwgt,
            order,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.order.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjncy.len() / 2
    }

    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.adjncy[self.xadj[v]..self.xadj[v + 1]]
    }

    pub fn degree(&self, v: usize) -> usize {
        self.xadj[v + 1] - self.xadj[v]
    }

    /// Undirected edges `(u, v)` with `u < v`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_vertices()).flat_map(move |u| {
            self.neighbors(u)
                .iter()
                .copied()
                .filter(move |&v| u < v)
                .map(move |v| (u, v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(i: u64) -> ElementId {
        ElementId::new(i)
    }

    #[test]
    fn dual_graph_two_cells() {
        let dg = DualGraph::from_rows([(e(11), vec![e(10)]), (e(10), vec![e(11)])]).unwrap();
        assert_eq!(dg.order, vec![e(10), e(11)]);
        assert_eq!(dg.xadj, vec![0, 1, 2]);
        assert_eq!(dg.neighbors(0), &[1]);
        assert_eq!(dg.neighbors(1), &[0]);
        assert_eq!(dg.num_edges(), 1);
    }

    #[test]
    fn one_sided_rows_are_symmetrised() {
        let dg =
            DualGraph::from_rows([(e(1), vec![e(2), e(3)]), (e(2), vec![]), (e(3), vec![])])
                .unwrap();
        assert_eq!(dg.neighbors(1), &[0]);
        assert_eq!(dg.neighbors(2), &[0]);
        assert_eq!(dg.edges().collect::<Vec<_>>(), vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn dangling_neighbor_is_reported() {
        let err = DualGraph::from_rows([(e(1), vec![e(9)])]).unwrap_err();
        assert_eq!(
            err,
            DanglingNeighbor {
                element: e(1),
                neighbor: e(9)
            }
        );
    }
}
