//! Fixed, versioned, little-endian wire layout for mesh exchange.
//!
//! Every message is a sequence of 64-bit words: one [`WireHdr`] word followed
//! by a payload whose meaning depends on the header kind. Element records are
//! fixed-stride for a given dimension D:
//!
//! ```text
//! element: id, region, v[0..=D], neighbor[0..=D], bc[0..=D]   (2 + 3(D+1) words)
//! vertex:  id, coord[0..D] as f64 bits                        (1 + D words)
//! ```
//!
//! A missing neighbour is encoded as [`NO_NEIGHBOR`], so `u64::MAX` is not a
//! valid element ID.

use crate::mesh::element::{Element, Facet};
use crate::topology::boundary::BoundaryCondition;
use crate::topology::point::{ElementId, VertexId};
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Sentinel for "no neighbour across this facet".
pub const NO_NEIGHBOR: u64 = u64::MAX;

/// Payload kinds.
pub const KIND_RECORDS: u16 = 1;
pub const KIND_IDS: u16 = 2;
pub const KIND_PAIRS: u16 = 3;
pub const KIND_TRIPLES: u16 = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    /// Spatial dimension for record batches, zero otherwise.
    pub dim_le: u32,
}

impl WireHdr {
    pub fn new(kind: u16, dim: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            dim_le: (dim as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn dim(&self) -> usize {
        u32::from_le(self.dim_le) as usize
    }
}

/// Byte count carried in the size phase of a two-phase exchange.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u64,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u64).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u64::from_le(self.n_le) as usize
    }
}

const_assert_eq!(size_of::<WireHdr>(), 8);
const_assert_eq!(size_of::<WireCount>(), 8);

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Words → little-endian bytes.
pub fn encode_words(words: &[u64]) -> Vec<u8> {
    let le: Vec<u64> = words.iter().map(|w| w.to_le()).collect();
    bytemuck::cast_slice(&le).to_vec()
}

/// Little-endian bytes → words. Tolerates unaligned input.
pub fn decode_words(bytes: &[u8]) -> Result<Vec<u64>, String> {
    if bytes.len() % size_of::<u64>() != 0 {
        return Err(format!(
            "message of {} bytes is not a whole number of words",
            bytes.len()
        ));
    }
    Ok(bytes
        .chunks_exact(size_of::<u64>())
        .map(bytemuck::pod_read_unaligned::<u64>)
        .map(u64::from_le)
        .collect())
}

fn header_word(kind: u16, dim: usize) -> u64 {
    bytemuck::cast::<WireHdr, u64>(WireHdr::new(kind, dim))
}

fn check_header(words: &[u64], kind: u16) -> Result<WireHdr, String> {
    let first = *words.first().ok_or("empty message")?;
    let hdr = bytemuck::cast::<u64, WireHdr>(first);
    if hdr.version() != WIRE_VERSION {
        return Err(format!(
            "wire version {} does not match {}",
            hdr.version(),
            WIRE_VERSION
        ));
    }
    if hdr.kind() != kind {
        return Err(format!("expected message kind {kind}, got {}", hdr.kind()));
    }
    Ok(hdr)
}

/// Plain list of words (element IDs, ranks, ...).
pub fn encode_list(kind: u16, items: &[u64]) -> Vec<u8> {
    let mut words = Vec::with_capacity(items.len() + 1);
    words.push(header_word(kind, 0));
    words.extend_from_slice(items);
    encode_words(&words)
}

pub fn decode_list(kind: u16, bytes: &[u8]) -> Result<Vec<u64>, String> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let words = decode_words(bytes)?;
    check_header(&words, kind)?;
    Ok(words[1..].to_vec())
}

/// Element and vertex records decoded from one message.
#[derive(Debug, Default)]
pub struct RecordBatch {
    pub elements: Vec<Element>,
    pub vertices: Vec<(VertexId, Vec<f64>)>,
}

pub fn element_stride(dim: usize) -> usize {
    2 + 3 * (dim + 1)
}

pub fn vertex_stride(dim: usize) -> usize {
    1 + dim
}

/// Pack elements and the coordinates of the vertices they reference.
pub fn encode_records<'a, E, V>(dim: usize, elements: E, vertices: V) -> Vec<u8>
where
    E: IntoIterator<Item = &'a Element>,
    V: IntoIterator<Item = (VertexId, &'a [f64])>,
{
    let elements: Vec<&Element> = elements.into_iter().collect();
    let vertices: Vec<(VertexId, &[f64])> = vertices.into_iter().collect();
    let mut words = Vec::with_capacity(
        3 + elements.len() * element_stride(dim) + vertices.len() * vertex_stride(dim),
    );
    words.push(header_word(KIND_RECORDS, dim));
    words.push(elements.len() as u64);
    words.push(vertices.len() as u64);
    for e in elements {
        debug_assert_eq!(e.vertices.len(), dim + 1);
        words.push(e.id.get());
        words.push(e.region);
        words.extend(e.vertices.iter().map(|v| v.get()));
        words.extend(
            e.facets
                .iter()
                .map(|f| f.neighbor.map_or(NO_NEIGHBOR, ElementId::get)),
        );
        words.extend(e.facets.iter().map(|f| f.bc.code()));
    }
    for (id, coords) in vertices {
        debug_assert_eq!(coords.len(), dim);
        words.push(id.get());
        words.extend(coords.iter().map(|c| c.to_bits()));
    }
    encode_words(&words)
}

pub fn decode_records(dim: usize, bytes: &[u8]) -> Result<RecordBatch, String> {
    if bytes.is_empty() {
        return Ok(RecordBatch::default());
    }
    let words = decode_words(bytes)?;
    let hdr = check_header(&words, KIND_RECORDS)?;
    if hdr.dim() != dim {
        return Err(format!(
            "record batch has dimension {}, expected {dim}",
            hdr.dim()
        ));
    }
    if words.len() < 3 {
        return Err("truncated record batch header".into());
    }
    let n_elem = words[1] as usize;
    let n_vert = words[2] as usize;
    let expected = 3 + n_elem * element_stride(dim) + n_vert * vertex_stride(dim);
    expect_exact_len(words.len() * 8, expected * 8)?;

    let nv = dim + 1;
    let mut elements = Vec::with_capacity(n_elem);
    let mut at = 3;
    for _ in 0..n_elem {
        let rec = &words[at..at + element_stride(dim)];
        let vertices = rec[2..2 + nv].iter().copied().map(VertexId::new).collect();
        let mut facets = Vec::with_capacity(nv);
        for f in 0..nv {
            let nbr = rec[2 + nv + f];
            let code = rec[2 + 2 * nv + f];
            let bc = BoundaryCondition::from_code(code)
                .ok_or_else(|| format!("unknown boundary condition code {code}"))?;
            facets.push(Facet {
                neighbor: (nbr != NO_NEIGHBOR).then_some(ElementId::new(nbr)),
                bc,
            });
        }
        elements.push(Element::new(ElementId::new(rec[0]), vertices, facets, rec[1]));
        at += element_stride(dim);
    }
    let mut vertices = Vec::with_capacity(n_vert);
    for _ in 0..n_vert {
        let rec = &words[at..at + vertex_stride(dim)];
        let coords = rec[1..].iter().map(|&b| f64::from_bits(b)).collect();
        vertices.push((VertexId::new(rec[0]), coords));
        at += vertex_stride(dim);
    }
    Ok(RecordBatch { elements, vertices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_batch_preserves_adjacency_and_tags() {
        let e = Element::new(
            ElementId::new(12),
            vec![VertexId::new(0), VertexId::new(1), VertexId::new(5)],
            vec![
                Facet::interior(ElementId::new(13)),
                Facet::boundary(BoundaryCondition::Neumann),
                Facet::boundary(BoundaryCondition::None),
            ],
            7,
        );
        let coords: Vec<(VertexId, Vec<f64>)> = vec![
            (VertexId::new(0), vec![0.0, 0.0]),
            (VertexId::new(1), vec![0.5, -0.25]),
            (VertexId::new(5), vec![1.0, 1.0 / 3.0]),
        ];
        let bytes = encode_records(
            2,
            [&e],
            coords.iter().map(|(id, c)| (*id, c.as_slice())),
        );
        let batch = decode_records(2, &bytes).unwrap();
        assert_eq!(batch.elements, vec![e]);
        assert_eq!(batch.vertices, coords);
    }

    #[test]
    fn dimension_and_kind_are_checked() {
        let bytes = encode_records(3, std::iter::empty::<&Element>(), std::iter::empty());
        assert!(decode_records(2, &bytes).is_err());
        let ids = encode_list(KIND_IDS, &[1, 2, 3]);
        assert!(decode_list(KIND_PAIRS, &ids).is_err());
        assert_eq!(decode_list(KIND_IDS, &ids).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn truncated_batches_are_rejected() {
        let e = Element::new(
            ElementId::new(1),
            vec![VertexId::new(0), VertexId::new(1)],
            vec![Facet::default(), Facet::default()],
            0,
        );
        let mut bytes = encode_records(1, [&e], std::iter::empty());
        bytes.truncate(bytes.len() - 8);
        assert!(decode_records(1, &bytes).is_err());
        assert!(decode_words(&[0u8; 5]).is_err());
    }

    #[test]
    fn words_decode_from_unaligned_slices() {
        let words = [1u64, u64::MAX, 0x0102_0304_0506_0708];
        let mut bytes = vec![0xAAu8];
        bytes.extend(encode_words(&words));
        assert_eq!(decode_words(&bytes[1..]).unwrap(), words.to_vec());
        assert!(decode_words(&[]).unwrap().is_empty());
    }

    #[test]
    fn version_guard() {
        let hdr = WireHdr::new(KIND_IDS, 0);
        assert_eq!(hdr.version(), WIRE_VERSION);
        assert_eq!(hdr.kind(), KIND_IDS);
    }
}
