//! Board geometry shared by the experience pipeline.
//!
//! A square board of side `H` has `H * H` cells plus one non-spatial action
//! (pass). Policy targets are laid out as the row-major cells followed by the
//! pass entry, so their length is always `H * H + 1`.

mod dihedral;

pub use dihedral::{Dihedral, SymmetryError};

/// Board side used by the 9x9 self-play engine.
pub const DEFAULT_BOARD_SIZE: usize = 9;

/// Length of a policy vector for a board of side `board_size` (cells + pass).
pub const fn policy_len(board_size: usize) -> usize {
    board_size * board_size + 1
}

/// Index of the pass entry inside a policy vector.
pub const fn pass_index(board_size: usize) -> usize {
    board_size * board_size
}
