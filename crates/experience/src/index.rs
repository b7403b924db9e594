//! Index arithmetic shared by the composition layers.
//!
//! These functions know nothing about storage, so they can be tested on
//! plain numbers.

use gozero_core::Dihedral;

/// Map an augmented index to the symmetry and base index it stands for.
///
/// Index `i` of a chunk with `base_len` records selects element
/// `i / base_len` applied to record `i % base_len`. Returns `None` when `i`
/// is outside `[0, 8 * base_len)`.
pub fn augmented_to_base(index: usize, base_len: usize) -> Option<(Dihedral, usize)> {
    if base_len == 0 {
        return None;
    }
    let transform = Dihedral::ALL.get(index / base_len)?;
    Some((*transform, index % base_len))
}

/// Running end offsets for members of the given lengths.
///
/// Member `k` owns the global range `ends[k - 1]..ends[k]` (starting at 0).
pub fn cumulative_ends(lengths: impl IntoIterator<Item = usize>) -> Vec<usize> {
    lengths
        .into_iter()
        .scan(0usize, |acc, len| {
            *acc += len;
            Some(*acc)
        })
        .collect()
}

/// Find the member owning `index` and the local index inside it.
///
/// `ends` must come from [`cumulative_ends`]. Empty members own no indices
/// and are skipped.
pub fn locate(ends: &[usize], index: usize) -> Option<(usize, usize)> {
    let member = ends.partition_point(|&end| end <= index);
    if member == ends.len() {
        return None;
    }
    let start = if member == 0 { 0 } else { ends[member - 1] };
    Some((member, index - start))
}
