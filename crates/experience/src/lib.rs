//! Read-only, memory-mapped access to self-play training examples.
//!
//! A directory of experience holds chunks: aligned `states`, `rewards` and
//! `visit_counts` arrays sharing a label. Chunks are mapped lazily, expanded
//! eight-fold by the board symmetries, concatenated into one index space and
//! optionally subsampled before being batched for training.

// Module declarations
mod augment;
mod chunk;
mod collection;
mod config;
mod dataset;
mod descriptor;
mod dtype;
mod error;
mod index;
mod loader;
mod store;
mod subset;

pub mod schema;

// Public exports
pub use augment::{augment_view, AugmentedChunk};
pub use chunk::{Chunk, ChunkPaths};
pub use collection::Collection;
pub use config::LoaderConfig;
pub use dataset::{Dataset, Example, ExampleView};
pub use descriptor::ArrayDescriptor;
pub use dtype::{DType, Element, RecordView};
pub use error::{ExperienceError, Result};
pub use index::{augmented_to_base, cumulative_ends, locate};
pub use loader::{Batch, BatchLoader, Batches, Prefetch};
pub use store::RecordStore;
pub use subset::{Subset, SubsetSize};

pub use gozero_core::{Dihedral, SymmetryError};
