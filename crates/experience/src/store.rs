use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use memmap2::Mmap;
use ndarray::ArrayViewD;
use ndarray_npy::{ViewNpyError, ViewNpyExt};

use crate::descriptor::{contiguous_strides, ArrayDescriptor};
use crate::dtype::{DType, Element, RecordView};
use crate::error::{ExperienceError, Result};
use crate::schema::{EXT_DESCRIPTOR, EXT_NPY};

/// Read-only, zero-copy access to one flat on-disk array.
///
/// The file is memory mapped once when the store is opened; pages are
/// faulted in by the OS the first time a record touches them. Records are
/// handed out as views borrowing the store, so the mapping lives exactly as
/// long as the store.
#[derive(Debug)]
pub struct RecordStore {
    descriptor: ArrayDescriptor,
    backing: Backing,
    record_bytes: usize,
}

enum Backing {
    Mapped(Mmap),
    Owned(Box<dyn AsBytes>),
    Empty,
}

trait AsBytes: Send + Sync {
    fn as_bytes(&self) -> &[u8];
}

impl<T: Pod + Send + Sync> AsBytes for Vec<T> {
    fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self)
    }
}

impl Backing {
    fn bytes(&self) -> &[u8] {
        match self {
            Backing::Mapped(mmap) => &mmap[..],
            Backing::Owned(buf) => buf.as_bytes(),
            Backing::Empty => &[],
        }
    }
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Mapped(mmap) => write!(f, "Mapped({} bytes)", mmap.len()),
            Backing::Owned(buf) => write!(f, "Owned({} bytes)", buf.as_bytes().len()),
            Backing::Empty => f.write_str("Empty"),
        }
    }
}

impl RecordStore {
    /// Open a field file: a JSON sidecar describing a raw dump, or an `.npy`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(EXT_DESCRIPTOR) => Self::from_descriptor(ArrayDescriptor::from_json(path)?),
            Some(EXT_NPY) => Self::open_npy(path),
            _ => Err(ExperienceError::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "unrecognised array file extension"),
            )),
        }
    }

    /// Map the raw file named by `descriptor`.
    pub fn from_descriptor(descriptor: ArrayDescriptor) -> Result<Self> {
        descriptor.validate_layout()?;
        let needed = descriptor
            .total_bytes()?
            .checked_add(descriptor.offset)
            .ok_or_else(|| ExperienceError::Layout("array extent overflows".to_string()))?;

        let path = &descriptor.data;
        let file = File::open(path).map_err(|e| ExperienceError::io(path, e))?;
        let actual = file
            .metadata()
            .map_err(|e| ExperienceError::io(path, e))?
            .len();
        if actual < needed as u64 {
            return Err(ExperienceError::io(
                path,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("shape {:?} needs {needed} bytes, file has {actual}", descriptor.shape),
                ),
            ));
        }

        let backing = if needed == 0 {
            Backing::Empty
        } else {
            // SAFETY: experience files are never modified while being read.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ExperienceError::io(path, e))?;
            Backing::Mapped(mmap)
        };
        Self::with_backing(descriptor, backing)
    }

    /// Map an `.npy` file, taking dtype and shape from its header.
    pub fn open_npy(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ExperienceError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| ExperienceError::io(path, e))?
            .len();
        if len == 0 {
            return Err(ExperienceError::io(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "empty npy file"),
            ));
        }
        // SAFETY: experience files are never modified while being read.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ExperienceError::io(path, e))?;

        let (dtype, shape, strides) = read_npy_header(&mmap).map_err(|source| ExperienceError::NpyError {
            path: path.to_path_buf(),
            source,
        })?;
        let data_bytes = shape.iter().product::<usize>() * dtype.size();
        let descriptor = ArrayDescriptor {
            data: path.to_path_buf(),
            dtype,
            shape,
            strides,
            // view_npy rejects trailing bytes, so the data ends the file
            offset: mmap.len() - data_bytes,
        };
        descriptor.validate_layout()?;
        Self::with_backing(descriptor, Backing::Mapped(mmap))
    }

    /// Build a store over in-memory data laid out row-major as `shape`.
    pub fn from_vec<T: Element>(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ExperienceError::Shape(format!(
                "{} elements do not fill shape {shape:?}",
                data.len()
            )));
        }
        let descriptor = ArrayDescriptor {
            data: PathBuf::new(),
            dtype: T::DTYPE,
            strides: contiguous_strides(&shape, 1),
            shape,
            offset: 0,
        };
        descriptor.validate_layout()?;
        Self::with_backing(descriptor, Backing::Owned(Box::new(data)))
    }

    fn with_backing(descriptor: ArrayDescriptor, backing: Backing) -> Result<Self> {
        let record_bytes = descriptor.record_bytes()?;
        Ok(Self {
            descriptor,
            backing,
            record_bytes,
        })
    }

    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    /// Data file backing the store (empty for in-memory stores)
    pub fn path(&self) -> &Path {
        &self.descriptor.data
    }

    pub fn dtype(&self) -> DType {
        self.descriptor.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.descriptor.shape
    }

    pub fn record_shape(&self) -> &[usize] {
        self.descriptor.record_shape()
    }

    /// Number of records along the leading axis
    pub fn len(&self) -> usize {
        self.descriptor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// View of the record at leading index `index`
    pub fn element(&self, index: usize) -> Result<RecordView<'_>> {
        let len = self.len();
        if index >= len {
            return Err(ExperienceError::Index { index, len });
        }
        let start = self.descriptor.offset + index * self.record_bytes;
        let bytes = &self.backing.bytes()[start..start + self.record_bytes];
        self.descriptor.dtype.view(self.record_shape(), bytes)
    }
}

fn read_npy_header(bytes: &[u8]) -> std::result::Result<(DType, Vec<usize>, Vec<isize>), ViewNpyError> {
    let first = match ArrayViewD::<f32>::view_npy(bytes) {
        Ok(view) => return Ok((DType::Float32, npy_shape(&view), npy_strides(&view))),
        Err(err) => err,
    };
    if let Ok(view) = ArrayViewD::<i8>::view_npy(bytes) {
        return Ok((DType::Int8, npy_shape(&view), npy_strides(&view)));
    }
    if let Ok(view) = ArrayViewD::<i16>::view_npy(bytes) {
        return Ok((DType::Int16, npy_shape(&view), npy_strides(&view)));
    }
    Err(first)
}

fn npy_shape<T>(view: &ArrayViewD<'_, T>) -> Vec<usize> {
    view.shape().to_vec()
}

// ndarray reports zero strides for arrays with an empty axis.
fn npy_strides<T>(view: &ArrayViewD<'_, T>) -> Vec<isize> {
    if view.is_standard_layout() {
        contiguous_strides(view.shape(), 1)
    } else {
        view.strides().to_vec()
    }
}
