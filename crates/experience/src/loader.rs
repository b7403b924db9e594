use std::ops::Range;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use ndarray::{stack, Array1, Array2, Array4, ArrayView1, ArrayView3, Axis};
use rayon::prelude::*;

use crate::config::LoaderConfig;
use crate::dataset::{Dataset, Example};
use crate::error::{ExperienceError, Result};

/// Examples stacked along a new leading batch axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Shape `(B, C, H, H)`
    pub states: Array4<f32>,
    /// Shape `(B,)`
    pub rewards: Array1<f32>,
    /// Shape `(B, H*H + 1)`
    pub visit_counts: Array2<f32>,
}

impl Batch {
    /// Stack examples of identical shape into one batch.
    pub fn stack(examples: &[Example]) -> Result<Self> {
        if examples.is_empty() {
            return Err(ExperienceError::Shape("cannot stack an empty batch".to_string()));
        }
        let shape_err = |e: ndarray::ShapeError| ExperienceError::Shape(format!("batch: {e}"));

        let states: Vec<ArrayView3<'_, f32>> = examples.iter().map(|e| e.state.view()).collect();
        let visit_counts: Vec<ArrayView1<'_, f32>> =
            examples.iter().map(|e| e.visit_counts.view()).collect();

        Ok(Self {
            states: stack(Axis(0), &states).map_err(shape_err)?,
            rewards: examples.iter().map(|e| e.reward).collect(),
            visit_counts: stack(Axis(0), &visit_counts).map_err(shape_err)?,
        })
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Walks a dataset in order, one batch at a time.
///
/// Batch `b` covers examples `b * batch_size..(b + 1) * batch_size`, the last
/// batch being shorter unless `drop_last` is set. There is no shuffling.
pub struct BatchLoader<D: ?Sized> {
    dataset: Arc<D>,
    config: LoaderConfig,
}

impl<D: ?Sized> Clone for BatchLoader<D> {
    fn clone(&self) -> Self {
        Self {
            dataset: Arc::clone(&self.dataset),
            config: self.config.clone(),
        }
    }
}

impl<D: Dataset + ?Sized> BatchLoader<D> {
    pub fn new(dataset: Arc<D>, config: LoaderConfig) -> Self {
        Self { dataset, config }
    }

    pub fn dataset(&self) -> &Arc<D> {
        &self.dataset
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        let size = self.config.batch_size.max(1);
        if self.config.drop_last {
            n / size
        } else {
            n.div_ceil(size)
        }
    }

    /// Dataset indices covered by batch `b`
    pub fn batch_range(&self, b: usize) -> Result<Range<usize>> {
        let batches = self.num_batches();
        if b >= batches {
            return Err(ExperienceError::Index {
                index: b,
                len: batches,
            });
        }
        let size = self.config.batch_size.max(1);
        let start = b * size;
        Ok(start..(start + size).min(self.dataset.len()))
    }

    /// Gather and stack batch `b`.
    pub fn batch(&self, b: usize) -> Result<Batch> {
        let range = self.batch_range(b)?;
        let examples = if self.config.parallel {
            range
                .into_par_iter()
                .map(|i| self.dataset.get(i))
                .collect::<Result<Vec<_>>>()?
        } else {
            range
                .map(|i| self.dataset.get(i))
                .collect::<Result<Vec<_>>>()?
        };
        Batch::stack(&examples)
    }

    /// Batches in order, assembled on the calling thread
    pub fn iter(&self) -> Batches<'_, D> {
        Batches {
            loader: self,
            next: 0,
        }
    }
}

impl<D: Dataset + ?Sized + 'static> BatchLoader<D> {
    /// Assemble batches on a background thread.
    ///
    /// The worker runs at most `prefetch_batches` batches ahead and exits
    /// after the first error or once the returned iterator is dropped.
    pub fn prefetch(&self) -> Prefetch {
        let depth = self.config.prefetch_batches.max(1);
        let (tx, rx) = bounded::<Result<Batch>>(depth);
        let loader = self.clone();
        let total = loader.num_batches();

        let handle = thread::spawn(move || {
            for b in 0..total {
                let batch = loader.batch(b);
                let failed = batch.is_err();
                // Receiver gone: nobody wants the rest.
                if tx.send(batch).is_err() || failed {
                    break;
                }
            }
        });

        Prefetch {
            receiver: rx,
            remaining: total,
            _handle: handle,
        }
    }
}

/// Sequential batch iterator, see [`BatchLoader::iter`].
pub struct Batches<'a, D: ?Sized> {
    loader: &'a BatchLoader<D>,
    next: usize,
}

impl<D: Dataset + ?Sized> Iterator for Batches<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.loader.num_batches() {
            return None;
        }
        let batch = self.loader.batch(self.next);
        self.next += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.loader.num_batches().saturating_sub(self.next);
        (left, Some(left))
    }
}

/// Batches produced by a background worker, see [`BatchLoader::prefetch`].
pub struct Prefetch {
    receiver: Receiver<Result<Batch>>,
    remaining: usize,
    _handle: thread::JoinHandle<()>,
}

impl Iterator for Prefetch {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.receiver.recv() {
            Ok(Ok(batch)) => {
                self.remaining -= 1;
                Some(Ok(batch))
            }
            Ok(Err(e)) => {
                self.remaining = 0;
                Some(Err(e))
            }
            Err(_) => {
                self.remaining = 0;
                Some(Err(ExperienceError::WorkerStopped))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::tests::synthetic_chunk;
    use crate::chunk::Chunk;
    use ndarray::{Array1, Array3};

    fn loader(examples: usize, config: LoaderConfig) -> BatchLoader<Chunk> {
        BatchLoader::new(Arc::new(synthetic_chunk(examples, 2, 3)), config)
    }

    #[test]
    fn test_num_batches() {
        let config = LoaderConfig::new().with_batch_size(4);
        assert_eq!(loader(10, config.clone()).num_batches(), 3);
        assert_eq!(loader(10, config.clone().with_drop_last(true)).num_batches(), 2);
        assert_eq!(loader(8, config.clone()).num_batches(), 2);
        assert_eq!(loader(0, config).num_batches(), 0);
    }

    #[test]
    fn test_last_batch_is_short() {
        let loader = loader(10, LoaderConfig::new().with_batch_size(4));
        let batch = loader.batch(2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.states.shape(), &[2, 2, 3, 3]);
        assert_eq!(batch.visit_counts.shape(), &[2, 10]);

        let example = loader.dataset().get(9).unwrap();
        assert_eq!(batch.states.index_axis(Axis(0), 1), example.state);
        assert_eq!(batch.visit_counts.index_axis(Axis(0), 1), example.visit_counts);
        assert_eq!(batch.rewards[1], example.reward);
    }

    #[test]
    fn test_batch_out_of_range() {
        let loader = loader(10, LoaderConfig::new().with_batch_size(4));
        assert!(matches!(
            loader.batch(3),
            Err(ExperienceError::Index { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = LoaderConfig::new().with_batch_size(3);
        let parallel = loader(7, config.clone().with_parallel(true));
        let sequential = loader(7, config.with_parallel(false));
        let a: Vec<Batch> = parallel.iter().collect::<Result<_>>().unwrap();
        let b: Vec<Batch> = sequential.iter().collect::<Result<_>>().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_prefetch_matches_iter() {
        let loader = loader(9, LoaderConfig::new().with_batch_size(2).with_prefetch_batches(1));
        let expected: Vec<Batch> = loader.iter().collect::<Result<_>>().unwrap();
        let prefetched: Vec<Batch> = loader.prefetch().collect::<Result<_>>().unwrap();
        assert_eq!(prefetched, expected);
    }

    #[test]
    fn test_prefetch_dropped_early() {
        let loader = loader(20, LoaderConfig::new().with_batch_size(2).with_prefetch_batches(1));
        let first = loader.prefetch().next().unwrap().unwrap();
        assert_eq!(first, loader.batch(0).unwrap());
    }

    #[test]
    fn test_stack_rejects_mismatched_shapes() {
        let a = Example {
            state: Array3::zeros((2, 3, 3)),
            reward: 0.0,
            visit_counts: Array1::zeros(10),
        };
        let b = Example {
            state: Array3::zeros((2, 4, 4)),
            reward: 0.0,
            visit_counts: Array1::zeros(17),
        };
        assert!(matches!(Batch::stack(&[a, b]), Err(ExperienceError::Shape(_))));
        assert!(matches!(Batch::stack(&[]), Err(ExperienceError::Shape(_))));
    }
}
