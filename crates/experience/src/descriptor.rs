use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dtype::DType;
use crate::error::{ExperienceError, Result};

/// Number of leading axes whose strides must be strictly decreasing.
const ORDERED_AXES: usize = 4;

/// Location and layout of one flat array on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDescriptor {
    /// Raw data file
    pub data: PathBuf,
    pub dtype: DType,
    pub shape: Vec<usize>,
    /// Strides parallel to `shape`, in elements or in bytes
    pub strides: Vec<isize>,
    /// Byte offset of the first element inside `data`
    pub offset: usize,
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    data: PathBuf,
    #[serde(default)]
    dtype: Option<String>,
    shape: Vec<usize>,
    strides: Vec<isize>,
    #[serde(default)]
    offset: usize,
}

impl ArrayDescriptor {
    /// Parse a JSON sidecar.
    ///
    /// `data` is resolved against the sidecar's directory. A missing `dtype`
    /// means `float32`, which is what the self-play writer dumps. That writer
    /// also leaves a comma after the last member, which is tolerated.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ExperienceError::io(path, e))?;
        let file: DescriptorFile = serde_json::from_str(&strip_trailing_commas(&text)).map_err(
            |source| ExperienceError::DescriptorError {
                path: path.to_path_buf(),
                source,
            },
        )?;

        let dtype = match file.dtype {
            Some(name) => name.parse()?,
            None => DType::Float32,
        };
        let data = match path.parent() {
            Some(dir) => dir.join(&file.data),
            None => file.data,
        };

        Ok(Self {
            data,
            dtype,
            shape: file.shape,
            strides: file.strides,
            offset: file.offset,
        })
    }

    /// Leading-axis extent (number of records)
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of a single record (all axes but the first)
    pub fn record_shape(&self) -> &[usize] {
        self.shape.get(1..).unwrap_or(&[])
    }

    /// Bytes occupied by one record
    pub fn record_bytes(&self) -> Result<usize> {
        self.record_shape()
            .iter()
            .try_fold(self.dtype.size(), |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| ExperienceError::Layout(format!("record size overflows: {:?}", self.shape)))
    }

    /// Bytes the whole array needs past `offset`
    pub fn total_bytes(&self) -> Result<usize> {
        self.record_bytes()?
            .checked_mul(self.len())
            .ok_or_else(|| ExperienceError::Layout(format!("array size overflows: {:?}", self.shape)))
    }

    /// Check that the strides describe a plain row-major dump.
    ///
    /// The first four axes must have strictly decreasing strides, which
    /// rejects transposed data. Beyond that the strides must match the
    /// contiguous layout, counted either in elements or in bytes.
    pub fn validate_layout(&self) -> Result<()> {
        if self.shape.is_empty() {
            return Err(ExperienceError::Layout(format!(
                "{}: scalar arrays hold no records",
                self.data.display()
            )));
        }
        if self.strides.len() != self.shape.len() {
            return Err(ExperienceError::Layout(format!(
                "{}: {} strides for {} axes",
                self.data.display(),
                self.strides.len(),
                self.shape.len()
            )));
        }

        let ordered = self.strides.len().min(ORDERED_AXES);
        if self.strides[..ordered].windows(2).any(|w| w[0] <= w[1]) {
            return Err(ExperienceError::Layout(format!(
                "{}: strides {:?} are not strictly decreasing",
                self.data.display(),
                self.strides
            )));
        }

        if self.offset % self.dtype.size() != 0 {
            return Err(ExperienceError::Layout(format!(
                "{}: offset {} is not aligned to {} elements",
                self.data.display(),
                self.offset,
                self.dtype
            )));
        }

        let elements = contiguous_strides(&self.shape, 1);
        let bytes = contiguous_strides(&self.shape, self.dtype.size());
        if !strides_match(&self.shape, &self.strides, &elements)
            && !strides_match(&self.shape, &self.strides, &bytes)
        {
            return Err(ExperienceError::Layout(format!(
                "{}: strides {:?} do not describe a contiguous {:?} array",
                self.data.display(),
                self.strides,
                self.shape
            )));
        }
        Ok(())
    }
}

/// Drop commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ',' {
            let rest = text[i + 1..].trim_start();
            if rest.starts_with('}') || rest.starts_with(']') {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Row-major strides for `shape`, scaled by `unit`.
pub(crate) fn contiguous_strides(shape: &[usize], unit: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = unit as isize;
    for (stride, &extent) in strides.iter_mut().zip(shape).rev() {
        *stride = acc;
        acc = acc.saturating_mul(extent as isize);
    }
    strides
}

// Axes of extent 0 or 1 never advance, so their stride is irrelevant.
fn strides_match(shape: &[usize], actual: &[isize], expected: &[isize]) -> bool {
    shape
        .iter()
        .zip(actual.iter().zip(expected))
        .all(|(&extent, (a, e))| extent <= 1 || a == e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(shape: Vec<usize>, strides: Vec<isize>) -> ArrayDescriptor {
        ArrayDescriptor {
            data: PathBuf::from("states.dat"),
            dtype: DType::Float32,
            shape,
            strides,
            offset: 0,
        }
    }

    #[test]
    fn test_contiguous_strides() {
        assert_eq!(contiguous_strides(&[4, 2, 3, 3], 1), vec![18, 9, 3, 1]);
        assert_eq!(contiguous_strides(&[4, 10], 4), vec![40, 4]);
        assert!(contiguous_strides(&[], 1).is_empty());
    }

    #[test]
    fn test_element_and_byte_strides_accepted() {
        descriptor(vec![4, 2, 3, 3], vec![18, 9, 3, 1])
            .validate_layout()
            .unwrap();
        descriptor(vec![4, 2, 3, 3], vec![72, 36, 12, 4])
            .validate_layout()
            .unwrap();
        descriptor(vec![5], vec![1]).validate_layout().unwrap();
    }

    #[test]
    fn test_transposed_strides_rejected() {
        let err = descriptor(vec![4, 2, 3, 3], vec![18, 9, 1, 3])
            .validate_layout()
            .unwrap_err();
        assert!(matches!(err, ExperienceError::Layout(_)));
    }

    #[test]
    fn test_padded_strides_rejected() {
        let err = descriptor(vec![4, 2, 3, 3], vec![20, 9, 3, 1])
            .validate_layout()
            .unwrap_err();
        assert!(matches!(err, ExperienceError::Layout(_)));
    }

    #[test]
    fn test_stride_count_must_match_rank() {
        let err = descriptor(vec![4, 10], vec![10])
            .validate_layout()
            .unwrap_err();
        assert!(matches!(err, ExperienceError::Layout(_)));
    }

    #[test]
    fn test_record_sizes() {
        let d = descriptor(vec![4, 2, 3, 3], vec![18, 9, 3, 1]);
        assert_eq!(d.len(), 4);
        assert_eq!(d.record_shape(), &[2, 3, 3]);
        assert_eq!(d.record_bytes().unwrap(), 72);
        assert_eq!(d.total_bytes().unwrap(), 288);
    }

    #[test]
    fn test_from_json_resolves_data_and_defaults_dtype() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewards_1.json");
        fs::write(
            &path,
            r#"{"data": "rewards_1.dat", "shape": [3], "strides": [1]}"#,
        )
        .unwrap();

        let d = ArrayDescriptor::from_json(&path).unwrap();
        assert_eq!(d.data, dir.path().join("rewards_1.dat"));
        assert_eq!(d.dtype, DType::Float32);
        assert_eq!(d.shape, vec![3]);
        assert_eq!(d.offset, 0);
    }

    #[test]
    fn test_from_json_accepts_self_play_writer_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states_1.json");
        fs::write(
            &path,
            "{\n  \"data\": \"states_1.dat\",\n  \"shape\": [2, 2, 3, 3],\n  \"strides\": [18, 9, 3, 1],\n}\n",
        )
        .unwrap();

        let d = ArrayDescriptor::from_json(&path).unwrap();
        assert_eq!(d.data, dir.path().join("states_1.dat"));
        assert_eq!(d.dtype, DType::Float32);
        assert_eq!(d.shape, vec![2, 2, 3, 3]);
        assert_eq!(d.strides, vec![18, 9, 3, 1]);
        d.validate_layout().unwrap();
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("{\"a\": [1, 2,],\n}"), "{\"a\": [1, 2]\n}");
        assert_eq!(strip_trailing_commas(r#"{"a": ",}", "b": 1}"#), r#"{"a": ",}", "b": 1}"#);
        assert_eq!(strip_trailing_commas(r#"{"a": "\",]"}"#), r#"{"a": "\",]"}"#);
    }

    #[test]
    fn test_misaligned_offset_rejected() {
        let mut d = descriptor(vec![4, 10], vec![10, 1]);
        d.offset = 2;
        assert!(matches!(d.validate_layout(), Err(ExperienceError::Layout(_))));
        d.offset = 8;
        d.validate_layout().unwrap();
    }

    #[test]
    fn test_from_json_unknown_dtype() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states_1.json");
        fs::write(
            &path,
            r#"{"data": "s.dat", "dtype": "uint64", "shape": [1], "strides": [1]}"#,
        )
        .unwrap();

        let err = ArrayDescriptor::from_json(&path).unwrap_err();
        assert!(matches!(err, ExperienceError::UnsupportedDType(name) if name == "uint64"));
    }

    #[test]
    fn test_from_json_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states_1.json");
        fs::write(&path, r#"{"data": "s.dat", "shape": [1]}"#).unwrap();

        let err = ArrayDescriptor::from_json(&path).unwrap_err();
        assert!(matches!(err, ExperienceError::DescriptorError { .. }));
    }
}
