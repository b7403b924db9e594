use std::io;
use std::path::{Path, PathBuf};

use gozero_core::policy_len;
use log::debug;

use crate::augment::AugmentedChunk;
use crate::dataset::{Dataset, Example, ExampleView};
use crate::error::{ExperienceError, Result};
use crate::schema::{field_file_name, EXTENSIONS, FIELD_REWARDS, FIELD_STATES, FIELD_VISIT_COUNTS};
use crate::store::RecordStore;

/// Field files making up one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPaths {
    pub label: String,
    pub states: PathBuf,
    pub rewards: PathBuf,
    pub visit_counts: PathBuf,
}

impl ChunkPaths {
    /// Locate `<field><label>.json` (or `.npy`) for each field inside `dir`.
    pub fn resolve(dir: impl AsRef<Path>, label: &str) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            label: label.to_string(),
            states: find_field(dir, FIELD_STATES, label)?,
            rewards: find_field(dir, FIELD_REWARDS, label)?,
            visit_counts: find_field(dir, FIELD_VISIT_COUNTS, label)?,
        })
    }

    /// Directory shared by all three files
    pub fn directory(&self) -> Result<&Path> {
        let dir = self.states.parent().unwrap_or(Path::new(""));
        for other in [&self.rewards, &self.visit_counts] {
            if other.parent().unwrap_or(Path::new("")) != dir {
                return Err(ExperienceError::Layout(format!(
                    "chunk files are not in one directory: {} and {}",
                    self.states.display(),
                    other.display()
                )));
            }
        }
        Ok(dir)
    }
}

fn find_field(dir: &Path, field: &str, label: &str) -> Result<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(field_file_name(field, label, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            ExperienceError::io(
                dir.join(field_file_name(field, label, EXTENSIONS[0])),
                io::Error::new(io::ErrorKind::NotFound, format!("missing {field} for chunk '{label}'")),
            )
        })
}

/// One group of aligned arrays sharing an index space.
///
/// The chunk owns the mapped memory of its three stores; views handed out by
/// [`Chunk::view`] and [`AugmentedChunk`] borrow from it.
#[derive(Debug)]
pub struct Chunk {
    label: String,
    states: RecordStore,
    rewards: RecordStore,
    visit_counts: RecordStore,
}

impl Chunk {
    /// Open the three field files of a chunk.
    pub fn open(paths: &ChunkPaths) -> Result<Self> {
        paths.directory()?;
        let chunk = Self::from_stores(
            paths.label.clone(),
            RecordStore::open(&paths.states)?,
            RecordStore::open(&paths.rewards)?,
            RecordStore::open(&paths.visit_counts)?,
        )?;
        debug!(
            "opened chunk '{}' with {} examples ({}x{} board, {} planes)",
            chunk.label,
            chunk.len(),
            chunk.board_size(),
            chunk.board_size(),
            chunk.planes()
        );
        Ok(chunk)
    }

    /// Open the chunk labelled `label` inside `dir`.
    pub fn open_label(dir: impl AsRef<Path>, label: &str) -> Result<Self> {
        Self::open(&ChunkPaths::resolve(dir, label)?)
    }

    /// Assemble a chunk from already opened stores and validate alignment.
    pub fn from_stores(
        label: impl Into<String>,
        states: RecordStore,
        rewards: RecordStore,
        visit_counts: RecordStore,
    ) -> Result<Self> {
        let chunk = Self {
            label: label.into(),
            states,
            rewards,
            visit_counts,
        };
        chunk.validate()?;
        Ok(chunk)
    }

    fn validate(&self) -> Result<()> {
        let n = self.states.len();
        if self.rewards.len() != n || self.visit_counts.len() != n {
            return Err(ExperienceError::Layout(format!(
                "chunk '{}': example counts differ (states {}, rewards {}, visit counts {})",
                self.label,
                n,
                self.rewards.len(),
                self.visit_counts.len()
            )));
        }

        let state = self.states.record_shape();
        if state.len() != 3 || state[1] != state[2] {
            return Err(ExperienceError::Shape(format!(
                "chunk '{}': state records must be (C, H, H), got {:?}",
                self.label, state
            )));
        }

        let reward_elems: usize = self.rewards.record_shape().iter().product();
        if reward_elems != 1 {
            return Err(ExperienceError::Shape(format!(
                "chunk '{}': expected one reward per example, got {:?}",
                self.label,
                self.rewards.record_shape()
            )));
        }

        let expected = policy_len(state[1]);
        if self.visit_counts.record_shape() != [expected].as_slice() {
            return Err(ExperienceError::Shape(format!(
                "chunk '{}': visit counts must have {} entries for a {}x{} board, got {:?}",
                self.label,
                expected,
                state[1],
                state[1],
                self.visit_counts.record_shape()
            )));
        }
        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of stored examples
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Side of the square board
    pub fn board_size(&self) -> usize {
        self.states.record_shape()[1]
    }

    /// Number of input planes per state
    pub fn planes(&self) -> usize {
        self.states.record_shape()[0]
    }

    pub fn states(&self) -> &RecordStore {
        &self.states
    }

    pub fn rewards(&self) -> &RecordStore {
        &self.rewards
    }

    pub fn visit_counts(&self) -> &RecordStore {
        &self.visit_counts
    }

    /// Zero-copy views of the example at `index`
    pub fn view(&self, index: usize) -> Result<ExampleView<'_>> {
        Ok(ExampleView {
            state: self.states.element(index)?,
            reward: self.rewards.element(index)?,
            visit_counts: self.visit_counts.element(index)?,
        })
    }

    /// Eight-fold symmetry-augmented view of this chunk
    pub fn augmented(&self) -> AugmentedChunk<'_> {
        AugmentedChunk::new(self)
    }
}

impl Dataset for Chunk {
    fn len(&self) -> usize {
        Chunk::len(self)
    }

    fn get(&self, index: usize) -> Result<Example> {
        self.view(index)?.to_example()
    }
}
