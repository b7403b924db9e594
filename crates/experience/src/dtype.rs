use std::fmt;
use std::str::FromStr;

use bytemuck::Pod;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::error::{ExperienceError, Result};

/// Element types an experience array may be stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DType {
    #[default]
    Float32,
    Int8,
    Int16,
}

impl DType {
    pub const ALL: [DType; 3] = [DType::Float32, DType::Int8, DType::Int16];

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            DType::Float32 => 4,
            DType::Int8 => 1,
            DType::Int16 => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
        }
    }

    /// Typed zero-copy view over `bytes` interpreted as `shape`.
    pub(crate) fn view<'a>(self, shape: &[usize], bytes: &'a [u8]) -> Result<RecordView<'a>> {
        Ok(match self {
            DType::Float32 => RecordView::Float32(typed_view(shape, bytes)?),
            DType::Int8 => RecordView::Int8(typed_view(shape, bytes)?),
            DType::Int16 => RecordView::Int16(typed_view(shape, bytes)?),
        })
    }
}

impl FromStr for DType {
    type Err = ExperienceError;

    fn from_str(s: &str) -> Result<Self> {
        DType::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| ExperienceError::UnsupportedDType(s.to_string()))
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust element type backing a [`DType`].
pub trait Element: Pod + Into<f32> + Send + Sync {
    const DTYPE: DType;
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;
}

impl Element for i8 {
    const DTYPE: DType = DType::Int8;
}

impl Element for i16 {
    const DTYPE: DType = DType::Int16;
}

fn typed_view<'a, T: Element>(shape: &[usize], bytes: &'a [u8]) -> Result<ArrayViewD<'a, T>> {
    let data: &[T] = bytemuck::try_cast_slice(bytes)
        .map_err(|e| ExperienceError::Layout(format!("cannot read {} data: {e}", T::DTYPE)))?;
    ArrayViewD::from_shape(IxDyn(shape), data)
        .map_err(|e| ExperienceError::Shape(format!("record shape {shape:?}: {e}")))
}

/// Zero-copy view of one record, typed by its on-disk dtype.
#[derive(Debug, Clone)]
pub enum RecordView<'a> {
    Float32(ArrayViewD<'a, f32>),
    Int8(ArrayViewD<'a, i8>),
    Int16(ArrayViewD<'a, i16>),
}

/// Run `$body` with `$v` bound to the typed view, whatever its dtype.
macro_rules! with_record {
    ($view:expr, $v:ident => $body:expr) => {
        match $view {
            $crate::dtype::RecordView::Float32($v) => $body,
            $crate::dtype::RecordView::Int8($v) => $body,
            $crate::dtype::RecordView::Int16($v) => $body,
        }
    };
}
pub(crate) use with_record;

impl<'a> RecordView<'a> {
    pub fn dtype(&self) -> DType {
        match self {
            RecordView::Float32(_) => DType::Float32,
            RecordView::Int8(_) => DType::Int8,
            RecordView::Int16(_) => DType::Int16,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_record!(self, v => v.shape())
    }

    pub fn len(&self) -> usize {
        with_record!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the record into an `f32` array
    pub fn to_f32(&self) -> ArrayD<f32> {
        with_record!(self, v => v.mapv(Into::into))
    }
}
