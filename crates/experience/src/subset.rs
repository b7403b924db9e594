use log::info;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::dataset::{Dataset, Example};
use crate::error::{ExperienceError, Result};

/// How many examples a [`Subset`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SubsetSize {
    /// Every example
    #[default]
    All,
    /// An absolute number of examples
    Count(usize),
    /// A share of the dataset in `(0, 1)`
    Fraction(f64),
}

impl SubsetSize {
    /// Interpret a bare number: integral values are counts, values strictly
    /// between 0 and 1 are fractions.
    pub fn from_f64(value: f64) -> Result<Self> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
            Ok(SubsetSize::Count(value as usize))
        } else if value > 0.0 && value < 1.0 {
            Ok(SubsetSize::Fraction(value))
        } else {
            Err(ExperienceError::SampleSize(format!(
                "{value} is neither a count nor a fraction in (0, 1)"
            )))
        }
    }

    /// Number of examples to draw from a dataset of `total`.
    pub fn resolve(self, total: usize) -> Result<usize> {
        let n = match self {
            SubsetSize::All => total,
            SubsetSize::Count(n) => n,
            SubsetSize::Fraction(f) => {
                if !(f > 0.0 && f < 1.0) {
                    return Err(ExperienceError::SampleSize(format!(
                        "fraction {f} outside (0, 1)"
                    )));
                }
                let n = (f * total as f64).round() as usize;
                if n == 0 {
                    return Err(ExperienceError::SampleSize(format!(
                        "fraction {f} of {total} examples selects nothing"
                    )));
                }
                n
            }
        };
        if n > total {
            return Err(ExperienceError::SampleSize(format!(
                "cannot draw {n} examples from {total}"
            )));
        }
        Ok(n)
    }
}

/// A fixed random selection of another dataset.
///
/// Indices are drawn once, uniformly and without replacement, when the
/// subset is built. Position `k` always maps to the same underlying example.
#[derive(Debug, Clone)]
pub struct Subset<D> {
    dataset: D,
    indices: Vec<usize>,
}

impl<D: Dataset> Subset<D> {
    pub fn new<R: Rng + ?Sized>(dataset: D, size: SubsetSize, rng: &mut R) -> Result<Self> {
        let total = dataset.len();
        let n = size.resolve(total)?;
        let indices = index::sample(rng, total, n).into_vec();
        info!("using subset of {n} of {total} examples");
        Ok(Self { dataset, indices })
    }

    /// Draw with a `ChaCha8Rng` seeded from `seed`, reproducible across runs.
    pub fn with_seed(dataset: D, size: SubsetSize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::new(dataset, size, &mut rng)
    }

    /// Underlying indices, in draw order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn into_inner(self) -> D {
        self.dataset
    }
}

impl<D: Dataset> Dataset for Subset<D> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<Example> {
        let &inner = self.indices.get(index).ok_or(ExperienceError::Index {
            index,
            len: self.indices.len(),
        })?;
        self.dataset.get(inner)
    }
}
