//! Relabel parts to keep elements where they already are.
//!
//! A partitioner returns arbitrary part labels. Mapping each new part to the
//! current rank it overlaps most (greedily, largest overlap first) minimizes
//! the number of elements that migrate. Recomputing the same partition
//! therefore relabels it back onto the current ownership and moves nothing.

/// Relabel `parts` (new part per vertex) against `current` (current owner per
/// vertex). Both label sets live in `0..k`.
pub fn remap_to_current(parts: &[usize], current: &[usize], k: usize) -> Vec<usize> {
    debug_assert_eq!(parts.len(), current.len());
    let mut overlap = vec![0usize; k * k];
    for (&new, &old) in parts.iter().zip(current) {
        if new < k && old < k {
            overlap[new * k + old] += 1;
        }
    }
    let mut pairs: Vec<(usize, usize, usize)> = (0..k)
        .flat_map(|new| (0..k).map(move |old| (new, old)))
        .filter_map(|(new, old)| {
            let c = overlap[new * k + old];
            (c > 0).then_some((c, new, old))
        })
        .collect();
    // largest overlap first, then lowest labels
    pairs.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut label: Vec<Option<usize>> = vec![None; k];
    let mut taken = vec![false; k];
    for (_, new, old) in pairs {
        if label[new].is_none() && !taken[old] {
            label[new] = Some(old);
            taken[old] = true;
        }
    }
    let mut free = (0..k).filter(|&r| !taken[r]);
    let label: Vec<usize> = label
        .into_iter()
        .map(|l| l.or_else(|| free.next()).unwrap_or(0))
        .collect();
    parts.iter().map(|&p| label.get(p).copied().unwrap_or(p)).collect()
}

/// Number of vertices whose owner changes.
pub fn migration_volume(parts: &[usize], current: &[usize]) -> usize {
    parts.iter().zip(current).filter(|(a, b)| a != b).count()
}
