//! Facet bookkeeping for D-simplices.
//!
//! Facet `i` of a simplex is the facet opposite its local vertex `i`. Two
//! simplices are neighbours across a facet when the facets have the same
//! vertex set, independent of ordering.

use crate::topology::point::{ElementId, VertexId};
use std::collections::HashMap;

/// Sorted vertex set of the facet opposite local vertex `opposite`.
pub fn facet_key(vertices: &[VertexId], opposite: usize) -> Vec<VertexId> {
    let mut key: Vec<VertexId> = vertices
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| (i != opposite).then_some(v))
        .collect();
    key.sort_unstable();
    key
}

/// Index of the local facet of `vertices` whose vertex set equals `key`.
pub fn local_facet_of(vertices: &[VertexId], key: &[VertexId]) -> Option<usize> {
    (0..vertices.len()).find(|&f| facet_key(vertices, f) == key)
}

/// True when some vertex is repeated.
pub fn is_degenerate(vertices: &[VertexId]) -> bool {
    let mut sorted = vertices.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).any(|w| w[0] == w[1])
}

/// A facet shared by more than two simplices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonManifoldFacet {
    pub facet: Vec<VertexId>,
    pub elements: Vec<ElementId>,
}

/// Facet-to-facet matching over a set of simplices.
///
/// Returns, per simplex and per local facet, the neighbour across that facet
/// (`None` on the boundary of the given set).
pub fn match_facets<'a, I>(simplices: I) -> Result<Vec<Vec<Option<ElementId>>>, NonManifoldFacet>
where
    I: IntoIterator<Item = (ElementId, &'a [VertexId])>,
{
    let simplices: Vec<(ElementId, &[VertexId])> = simplices.into_iter().collect();
    let mut first_owner: HashMap<Vec<VertexId>, (usize, usize)> = HashMap::new();
    let mut neighbours: Vec<Vec<Option<ElementId>>> = simplices
        .iter()
        .map(|(_, verts)| vec![None; verts.len()])
        .collect();
    let mut matched: HashMap<Vec<VertexId>, usize> = HashMap::new();

    for (idx, (id, verts)) in simplices.iter().enumerate() {
        for f in 0..verts.len() {
            let key = facet_key(verts, f);
            if let Some(&(other, other_f)) = first_owner.get(&key) {
                let count = matched.entry(key.clone()).or_insert(1);
                *count += 1;
                if *count > 2 {
                    let mut elements: Vec<ElementId> = simplices
                        .iter()
                        .filter(|(_, vs)| local_facet_of(vs, &key).is_some())
                        .map(|(e, _)| *e)
                        .collect();
                    elements.sort_unstable();
                    return Err(NonManifoldFacet {
                        facet: key,
                        elements,
                    });
                }
                neighbours[idx][f] = Some(simplices[other].0);
                neighbours[other][other_f] = Some(*id);
            } else {
                first_owner.insert(key, (idx, f));
            }
        }
    }
    Ok(neighbours)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(ids: &[u64]) -> Vec<VertexId> {
        ids.iter().copied().map(VertexId::new).collect()
    }

    #[test]
    fn facet_key_drops_opposite_vertex() {
        let t = v(&[7, 3, 5]);
        assert_eq!(facet_key(&t, 0), v(&[3, 5]));
        assert_eq!(facet_key(&t, 1), v(&[5, 7]));
        assert_eq!(local_facet_of(&t, &v(&[3, 7])), Some(2));
        assert_eq!(local_facet_of(&t, &v(&[3, 9])), None);
    }

    #[test]
    fn two_triangles_share_one_facet() {
        let a = v(&[0, 1, 2]);
        let b = v(&[1, 3, 2]);
        let nbrs = match_facets([
            (ElementId::new(10), a.as_slice()),
            (ElementId::new(11), b.as_slice()),
        ])
        .unwrap();
        assert_eq!(nbrs[0], vec![Some(ElementId::new(11)), None, None]);
        assert_eq!(nbrs[1], vec![None, Some(ElementId::new(10)), None]);
    }

    #[test]
    fn three_triangles_on_one_edge_are_rejected() {
        let a = v(&[0, 1, 2]);
        let b = v(&[0, 1, 3]);
        let c = v(&[0, 1, 4]);
        let err = match_facets([
            (ElementId::new(1), a.as_slice()),
            (ElementId::new(2), b.as_slice()),
            (ElementId::new(3), c.as_slice()),
        ])
        .unwrap_err();
        assert_eq!(err.facet, v(&[0, 1]));
        assert_eq!(err.elements.len(), 3);
    }

    #[test]
    fn degenerate_detection() {
        assert!(is_degenerate(&v(&[1, 2, 1])));
        assert!(!is_degenerate(&v(&[1, 2, 3])));
    }
}
