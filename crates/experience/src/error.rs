use std::io;
use std::path::PathBuf;

use gozero_core::{Dihedral, SymmetryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperienceError {
    #[error("I/O error on {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed array descriptor {}: {source}", path.display())]
    DescriptorError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed npy file {}: {source}", path.display())]
    NpyError {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ViewNpyError,
    },

    #[error("Unsupported dtype: {0}")]
    UnsupportedDType(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Index {index} out of range for length {len}")]
    Index { index: usize, len: usize },

    #[error("Sample size error: {0}")]
    SampleSize(String),

    #[error("Prefetch worker stopped")]
    WorkerStopped,
}

impl ExperienceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExperienceError::IoError {
            path: path.into(),
            source,
        }
    }
}

// Shape problems from the symmetry group surface as shape errors, a bad
// element id as an out-of-range index into the group.
impl From<SymmetryError> for ExperienceError {
    fn from(err: SymmetryError) -> Self {
        match err {
            SymmetryError::InvalidElement(id) => ExperienceError::Index {
                index: id as usize,
                len: Dihedral::COUNT,
            },
            other => ExperienceError::Shape(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExperienceError>;
