use gozero_core::{pass_index, policy_len, Dihedral};
use ndarray::{s, Array1, Array3, ArrayViewD, Ix1};

use crate::chunk::Chunk;
use crate::dataset::{Dataset, Example, ExampleView};
use crate::dtype::{with_record, Element};
use crate::error::{ExperienceError, Result};
use crate::index::augmented_to_base;

/// A chunk seen through all eight board symmetries.
///
/// Holds `8 * N` examples for a chunk of `N`. Index `i` is record `i % N`
/// under symmetry `i / N`, so the first `N` entries are the stored examples
/// untouched. Nothing is materialized up front; each `get` transforms one
/// record.
#[derive(Debug, Clone, Copy)]
pub struct AugmentedChunk<'a> {
    base: &'a Chunk,
}

impl<'a> AugmentedChunk<'a> {
    pub fn new(base: &'a Chunk) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &'a Chunk {
        self.base
    }

    pub fn len(&self) -> usize {
        Dihedral::COUNT * self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Symmetry and base record behind augmented index `index`
    pub fn transform_for(&self, index: usize) -> Result<(Dihedral, usize)> {
        augmented_to_base(index, self.base.len()).ok_or(ExperienceError::Index {
            index,
            len: self.len(),
        })
    }

    pub fn get(&self, index: usize) -> Result<Example> {
        let (transform, base) = self.transform_for(index)?;
        augment_view(&self.base.view(base)?, transform)
    }
}

impl Dataset for AugmentedChunk<'_> {
    fn len(&self) -> usize {
        AugmentedChunk::len(self)
    }

    fn get(&self, index: usize) -> Result<Example> {
        AugmentedChunk::get(self, index)
    }
}

/// Apply one symmetry to a stored example.
///
/// Every state plane and the board part of the visit counts move under the
/// same transform. The pass entry and the reward are unchanged.
pub fn augment_view(view: &ExampleView<'_>, transform: Dihedral) -> Result<Example> {
    let state = with_record!(&view.state, v => transform_planes(v.view(), transform)?);
    let board = state.shape()[1];
    let visit_counts =
        with_record!(&view.visit_counts, v => transform_policy(v.view(), board, transform)?);
    let reward = view
        .reward
        .to_f32()
        .iter()
        .next()
        .copied()
        .ok_or_else(|| ExperienceError::Shape("empty reward record".to_string()))?;

    Ok(Example {
        state,
        reward,
        visit_counts,
    })
}

fn transform_planes<T: Element>(planes: ArrayViewD<'_, T>, transform: Dihedral) -> Result<Array3<f32>> {
    Ok(transform.forward_dyn(planes)?.mapv(Into::into))
}

fn transform_policy<T: Element>(
    policy: ArrayViewD<'_, T>,
    board: usize,
    transform: Dihedral,
) -> Result<Array1<f32>> {
    let cells = pass_index(board);
    let policy = policy
        .into_dimensionality::<Ix1>()
        .map_err(|e| ExperienceError::Shape(format!("visit counts: {e}")))?;
    if policy.len() != policy_len(board) {
        return Err(ExperienceError::Shape(format!(
            "visit counts have {} entries, expected {} for a {board}x{board} board",
            policy.len(),
            policy_len(board)
        )));
    }

    let pass: f32 = policy[cells].into();
    let grid = policy
        .slice_move(s![..cells])
        .into_shape((1, board, board))
        .map_err(|e| ExperienceError::Shape(format!("visit counts: {e}")))?;
    let moved = transform.forward(grid)?;

    let mut out: Vec<f32> = Vec::with_capacity(cells + 1);
    out.extend(moved.iter().map(|&x| -> f32 { x.into() }));
    out.push(pass);
    Ok(Array1::from_vec(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::tests::synthetic_chunk;
    use crate::store::RecordStore;
    use approx::assert_relative_eq;

    #[test]
    fn test_len_is_eight_times_base() {
        for n in [0, 1, 4] {
            let chunk = synthetic_chunk(n, 2, 3);
            let augmented = chunk.augmented();
            assert_eq!(augmented.len(), 8 * n);
            assert_eq!(augmented.is_empty(), n == 0);
        }
    }

    #[test]
    fn test_first_block_is_identity() {
        let chunk = synthetic_chunk(4, 2, 3);
        let augmented = chunk.augmented();
        for i in 0..4 {
            assert_eq!(augmented.get(i).unwrap(), Dataset::get(&chunk, i).unwrap());
        }
    }

    #[test]
    fn test_index_thirteen_of_four_is_rot270_of_record_one() {
        let chunk = synthetic_chunk(4, 2, 3);
        let augmented = chunk.augmented();

        let (transform, base) = augmented.transform_for(13).unwrap();
        assert_eq!((transform.id(), base), (3, 1));

        let original = Dataset::get(&chunk, 1).unwrap();
        let rotated = augmented.get(13).unwrap();
        // 270 degrees counter-clockwise of [[0,1,2],[3,4,5],[6,7,8]]
        let perm = [6, 3, 0, 7, 4, 1, 8, 5, 2];
        for c in 0..2 {
            for k in 0..9 {
                assert_eq!(
                    rotated.state[[c, k / 3, k % 3]],
                    original.state[[c, perm[k] / 3, perm[k] % 3]]
                );
            }
        }
        for k in 0..9 {
            assert_eq!(rotated.visit_counts[k], original.visit_counts[perm[k]]);
        }
        assert_eq!(rotated.visit_counts[9], original.visit_counts[9]);
        assert_eq!(rotated.reward, original.reward);
    }

    #[test]
    fn test_inverse_recovers_stored_state() {
        let chunk = synthetic_chunk(2, 3, 4);
        let augmented = chunk.augmented();
        for i in 0..augmented.len() {
            let (transform, base) = augmented.transform_for(i).unwrap();
            let moved = augmented.get(i).unwrap();
            let restored = transform.inverse(moved.state.view()).unwrap();
            assert_eq!(restored, Dataset::get(&chunk, base).unwrap().state);
        }
    }

    #[test]
    fn test_out_of_range() {
        let chunk = synthetic_chunk(4, 2, 3);
        let err = chunk.augmented().get(32).unwrap_err();
        assert!(matches!(err, ExperienceError::Index { index: 32, len: 32 }));
    }

    #[test]
    fn test_visit_count_totals_preserved() {
        let chunk = synthetic_chunk(3, 2, 3);
        let augmented = chunk.augmented();
        for i in 0..augmented.len() {
            let (_, base) = augmented.transform_for(i).unwrap();
            let original = Dataset::get(&chunk, base).unwrap();
            let moved = augmented.get(i).unwrap();
            assert_relative_eq!(moved.visit_counts.sum(), original.visit_counts.sum());
            assert_relative_eq!(moved.state.sum(), original.state.sum());
        }
    }

    #[test]
    fn test_state_and_policy_move_together() {
        // Visit counts equal the first state plane cell for cell, plus a pass entry.
        let board = 3;
        let cells = board * board;
        let n = 2;
        let states: Vec<f32> = (0..n * 2 * cells).map(|v| (v * 3 % 17) as f32).collect();
        let mut visits = Vec::new();
        for e in 0..n {
            visits.extend_from_slice(&states[e * 2 * cells..e * 2 * cells + cells]);
            visits.push(100.0 + e as f32);
        }
        let chunk = Chunk::from_stores(
            "paired",
            RecordStore::from_vec(vec![n, 2, board, board], states).unwrap(),
            RecordStore::from_vec(vec![n], vec![1.0f32, -1.0]).unwrap(),
            RecordStore::from_vec(vec![n, cells + 1], visits).unwrap(),
        )
        .unwrap();

        let augmented = chunk.augmented();
        for i in 0..augmented.len() {
            let (transform, base) = augmented.transform_for(i).unwrap();
            let example = augmented.get(i).unwrap();
            let plane: Vec<f32> = example.state.slice(s![0, .., ..]).iter().copied().collect();
            assert_eq!(&example.visit_counts.as_slice().unwrap()[..cells], &plane[..]);
            assert_eq!(example.visit_counts[cells], 100.0 + base as f32);

            let perm = transform.cell_permutation(board);
            let original = Dataset::get(&chunk, base).unwrap();
            for k in 0..cells {
                assert_eq!(example.visit_counts[k], original.visit_counts[perm[k]]);
            }
        }
    }

    #[test]
    fn test_integer_records_widen() {
        let chunk = Chunk::from_stores(
            "int",
            RecordStore::from_vec(vec![1, 2, 2, 2], vec![1i8, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
            RecordStore::from_vec(vec![1], vec![-1i8]).unwrap(),
            RecordStore::from_vec(vec![1, 5], vec![10i16, 20, 30, 40, 50]).unwrap(),
        )
        .unwrap();

        // Element 1: one quarter turn counter-clockwise.
        let example = chunk.augmented().get(1).unwrap();
        assert_eq!(example.reward, -1.0);
        assert_eq!(example.state.slice(s![0, .., ..]), ndarray::array![[2.0, 4.0], [1.0, 3.0]]);
        assert_eq!(example.visit_counts, ndarray::array![20.0, 40.0, 10.0, 30.0, 50.0]);
    }
}
