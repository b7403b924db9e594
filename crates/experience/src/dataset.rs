use std::sync::Arc;

use ndarray::{Array1, Array3, Ix1, Ix3};

use crate::dtype::RecordView;
use crate::error::{ExperienceError, Result};

/// Random-access source of training examples.
///
/// Every implementation is read-only after construction, so `get` may be
/// called from many threads at once without locking.
pub trait Dataset: Send + Sync {
    /// Number of addressable examples
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the aligned `(state, reward, visit_counts)` triple at `index`
    fn get(&self, index: usize) -> Result<Example>;
}

impl<D: Dataset + ?Sized> Dataset for &D {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Example> {
        (**self).get(index)
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Example> {
        (**self).get(index)
    }
}

/// Training example for the policy/value network
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// Encoded board planes, shape `(C, H, H)`
    pub state: Array3<f32>,
    /// Game outcome from the perspective of the player to move
    pub reward: f32,
    /// Search visit counts: `H * H` cells followed by pass
    pub visit_counts: Array1<f32>,
}

impl Example {
    pub fn board_size(&self) -> usize {
        self.state.shape()[1]
    }

    pub fn planes(&self) -> usize {
        self.state.shape()[0]
    }

    /// Visit count of the pass move
    pub fn pass_visits(&self) -> Option<f32> {
        self.visit_counts.last().copied()
    }
}

/// Zero-copy view of one stored example, in its on-disk dtype
#[derive(Debug, Clone)]
pub struct ExampleView<'a> {
    pub state: RecordView<'a>,
    pub reward: RecordView<'a>,
    pub visit_counts: RecordView<'a>,
}

impl ExampleView<'_> {
    /// Copy the views into an owned `f32` example
    pub fn to_example(&self) -> Result<Example> {
        let state = self
            .state
            .to_f32()
            .into_dimensionality::<Ix3>()
            .map_err(|e| ExperienceError::Shape(format!("state: {e}")))?;
        let visit_counts = self
            .visit_counts
            .to_f32()
            .into_dimensionality::<Ix1>()
            .map_err(|e| ExperienceError::Shape(format!("visit counts: {e}")))?;
        let reward = self
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
}
