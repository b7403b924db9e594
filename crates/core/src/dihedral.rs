use ndarray::{Array3, ArrayBase, Axis, Dimension, Ix3, RawData};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymmetryError {
    #[error("Invalid dihedral element {0}, expected 0..=7")]
    InvalidElement(u8),

    #[error("Expected a rank {expected} tensor, got rank {actual}")]
    Rank { expected: usize, actual: usize },

    #[error("Spatial plane is not square: {rows}x{cols}")]
    NonSquare { rows: usize, cols: usize },
}

/// One of the 8 symmetries of the square board.
///
/// Elements `0..=3` are pure counter-clockwise rotations by `id * 90°`.
/// Elements `4..=7` mirror along the first spatial axis and then rotate by
/// `(id - 4) * 90°`.
///
/// Transforms operate on `(channels, H, H)` arrays and only permute strides,
/// so applying one to a view yields another view over the same memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dihedral {
    id: u8,
}

impl Dihedral {
    /// Number of elements in the group
    pub const COUNT: usize = 8;

    pub const IDENTITY: Dihedral = Dihedral { id: 0 };

    /// All elements, indexed by id
    pub const ALL: [Dihedral; 8] = [
        Dihedral { id: 0 },
        Dihedral { id: 1 },
        Dihedral { id: 2 },
        Dihedral { id: 3 },
        Dihedral { id: 4 },
        Dihedral { id: 5 },
        Dihedral { id: 6 },
        Dihedral { id: 7 },
    ];

    pub fn new(id: u8) -> Result<Self, SymmetryError> {
        if (id as usize) < Self::COUNT {
            Ok(Self { id })
        } else {
            Err(SymmetryError::InvalidElement(id))
        }
    }

    /// Build an element from its rotation count (taken mod 4) and mirror flag
    pub fn from_parts(rotations: u8, flip: bool) -> Self {
        let id = (rotations % 4) + if flip { 4 } else { 0 };
        Self { id }
    }

    /// Pick an element uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::COUNT)]
    }

    pub fn id(self) -> u8 {
        self.id
    }

    pub fn flip(self) -> bool {
        self.id > 3
    }

    /// Number of counter-clockwise quarter turns
    pub fn rotations(self) -> u8 {
        self.id % 4
    }

    pub fn is_identity(self) -> bool {
        self.id == 0
    }

    /// The element whose `forward` equals this element's `inverse`.
    ///
    /// Mirrored elements are reflections and therefore their own inverse.
    pub fn inverse_element(self) -> Self {
        if self.flip() {
            self
        } else {
            Self::from_parts((4 - self.rotations()) % 4, false)
        }
    }

    /// Apply the symmetry: mirror first (if flipped), then rotate.
    pub fn forward<S: RawData>(
        self,
        x: ArrayBase<S, Ix3>,
    ) -> Result<ArrayBase<S, Ix3>, SymmetryError> {
        check_square(x.raw_dim())?;
        Ok(self.apply(x))
    }

    /// Undo the symmetry: rotate back first, then mirror.
    pub fn inverse<S: RawData>(
        self,
        mut x: ArrayBase<S, Ix3>,
    ) -> Result<ArrayBase<S, Ix3>, SymmetryError> {
        check_square(x.raw_dim())?;
        rotate_ccw(&mut x, (4 - self.rotations()) % 4);
        if self.flip() {
            x.invert_axis(Axis(1));
        }
        Ok(x)
    }

    /// Like [`Dihedral::forward`] for dynamically ranked input.
    pub fn forward_dyn<S, D>(self, x: ArrayBase<S, D>) -> Result<ArrayBase<S, Ix3>, SymmetryError>
    where
        S: RawData,
        D: Dimension,
    {
        self.forward(into_planes(x)?)
    }

    /// Cell mapping of `forward` on a `board_size x board_size` board.
    ///
    /// Entry `k` is the row-major source cell whose value lands in cell `k`.
    pub fn cell_permutation(self, board_size: usize) -> Vec<usize> {
        let grid = Array3::from_shape_fn((1, board_size, board_size), |(_, row, col)| {
            row * board_size + col
        });
        self.apply(grid).iter().copied().collect()
    }

    fn apply<S: RawData>(self, mut x: ArrayBase<S, Ix3>) -> ArrayBase<S, Ix3> {
        if self.flip() {
            x.invert_axis(Axis(1));
        }
        rotate_ccw(&mut x, self.rotations());
        x
    }
}

fn into_planes<S, D>(x: ArrayBase<S, D>) -> Result<ArrayBase<S, Ix3>, SymmetryError>
where
    S: RawData,
    D: Dimension,
{
    let actual = x.ndim();
    x.into_dimensionality::<Ix3>()
        .map_err(|_| SymmetryError::Rank {
            expected: 3,
            actual,
        })
}

fn check_square(dim: Ix3) -> Result<(), SymmetryError> {
    let (_, rows, cols) = dim.into_pattern();
    if rows != cols {
        return Err(SymmetryError::NonSquare { rows, cols });
    }
    Ok(())
}

/// Rotate the plane of axes (1, 2) counter-clockwise by `quarter_turns * 90°`.
fn rotate_ccw<S: RawData>(x: &mut ArrayBase<S, Ix3>, quarter_turns: u8) {
    match quarter_turns % 4 {
        0 => {}
        1 => {
            x.invert_axis(Axis(2));
            x.swap_axes(1, 2);
        }
        2 => {
            x.invert_axis(Axis(1));
            x.invert_axis(Axis(2));
        }
        _ => {
            x.invert_axis(Axis(1));
            x.swap_axes(1, 2);
        }
    }
}
