use std::fs;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::augment::AugmentedChunk;
use crate::chunk::{Chunk, ChunkPaths};
use crate::dataset::{Dataset, Example};
use crate::error::{ExperienceError, Result};
use crate::index::{cumulative_ends, locate};
use crate::schema::states_label;

/// Every chunk of a directory, augmented and concatenated.
///
/// Members keep the label order they were loaded in; member `k` owns the
/// global indices `ends[k - 1]..ends[k]`.
#[derive(Debug)]
pub struct Collection {
    chunks: Vec<Chunk>,
    ends: Vec<usize>,
}

impl Collection {
    /// Open all chunks stored in `dir`.
    ///
    /// Labels come from the `states<label>` files and are visited in
    /// lexicographic order, so two loads of one directory agree on indices.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let labels = collect_labels(dir)?;
        if labels.is_empty() {
            warn!("no experience chunks found in {}", dir.display());
        }

        let paths = labels
            .iter()
            .map(|label| ChunkPaths::resolve(dir, label))
            .collect::<Result<Vec<_>>>()?;
        let chunks = paths
            .par_iter()
            .map(Chunk::open)
            .collect::<Result<Vec<_>>>()?;

        let collection = Self::from_chunks(chunks);
        info!(
            "loaded {} examples ({} augmented) from {} chunks in {}",
            collection.base_len(),
            collection.len(),
            collection.num_chunks(),
            dir.display()
        );
        Ok(collection)
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let ends = cumulative_ends(chunks.iter().map(|c| c.augmented().len()));
        Self { chunks, ends }
    }

    /// Augmented length: eight times the stored examples
    pub fn len(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored (unaugmented) examples
    pub fn base_len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn members(&self) -> impl Iterator<Item = AugmentedChunk<'_>> + '_ {
        self.chunks.iter().map(Chunk::augmented)
    }

    /// Member owning global `index` and the index inside that member
    pub fn locate(&self, index: usize) -> Result<(usize, usize)> {
        locate(&self.ends, index).ok_or(ExperienceError::Index {
            index,
            len: self.len(),
        })
    }

    pub fn get(&self, index: usize) -> Result<Example> {
        let (member, local) = self.locate(index)?;
        self.chunks[member].augmented().get(local)
    }
}

impl Dataset for Collection {
    fn len(&self) -> usize {
        Collection::len(self)
    }

    fn get(&self, index: usize) -> Result<Example> {
        Collection::get(self, index)
    }
}

fn collect_labels(dir: &Path) -> Result<Vec<String>> {
    let mut labels = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ExperienceError::io(dir, e))? {
        let entry = entry.map_err(|e| ExperienceError::io(dir, e))?;
        let name = entry.file_name();
        if let Some(label) = name.to_str().and_then(states_label) {
            labels.push(label.to_string());
        }
    }
    labels.sort();
    // A chunk stored both as .json and .npy is still one chunk.
    labels.dedup();
    Ok(labels)
}
