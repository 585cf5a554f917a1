//! Element and facet records of the global mesh.

use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};

/// One facet of an element: the neighbour across it and its boundary tag.
///
/// The tag is only meaningful when `neighbor` is `None` (or for explicitly
/// tagged interior surfaces such as faults, where both sides carry it).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Facet {
    pub neighbor: Option<ElementId>,
    pub bc: BoundaryCondition,
}

impl Facet {
    pub fn boundary(bc: BoundaryCondition) -> Self {
        Facet { neighbor: None, bc }
    }

    pub fn interior(neighbor: ElementId) -> Self {
        Facet {
            neighbor: Some(neighbor),
            bc: BoundaryCondition::None,
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.neighbor.is_none()
    }
}

/// A D-simplex with D+1 vertices and D+1 facets; facet `i` is opposite vertex `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub id: ElementId,
    pub vertices: Vec<VertexId>,
    pub facets: Vec<Facet>,
    /// Physical region the element belongs to (0 when unspecified).
    pub region: u64,
}

impl Element {
    pub fn new(id: ElementId, vertices: Vec<VertexId>, facets: Vec<Facet>, region: u64) -> Self {
        debug_assert_eq!(vertices.len(), facets.len());
        Element {
            id,
            vertices,
            facets,
            region,
        }
    }

    /// Simplex dimension (number of vertices minus one).
    pub fn dim(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.facets.iter().filter_map(|f| f.neighbor)
    }

    /// Local facet index across which `other` is a neighbour.
    pub fn facet_towards(&self, other: ElementId) -> Option<usize> {
        self.facets.iter().position(|f| f.neighbor == Some(other))
    }

    pub fn boundary_facets(&self) -> impl Iterator<Item = (usize, BoundaryCondition)> + '_ {
        self.facets
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_boundary())
            .map(|(i, f)| (i, f.bc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbours_and_boundary_facets() {
        let e = Element::new(
            ElementId::new(4),
            vec![VertexId::new(0), VertexId::new(1), VertexId::new(2)],
            vec![
                Facet::interior(ElementId::new(5)),
                Facet::boundary(BoundaryCondition::Dirichlet),
                Facet::boundary(BoundaryCondition::None),
            ],
            0,
        );
        assert_eq!(e.dim(), 2);
        assert_eq!(e.neighbors().collect::<Vec<_>>(), vec![ElementId::new(5)]);
        assert_eq!(e.facet_towards(ElementId::new(5)), Some(0));
        let bnd: Vec<_> = e.boundary_facets().collect();
        assert_eq!(
            bnd,
            vec![
                (1, BoundaryCondition::Dirichlet),
                (2, BoundaryCondition::None)
            ]
        );
    }
}
