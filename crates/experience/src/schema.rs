//! On-disk naming convention for experience chunks.
//!
//! Each field of a chunk is stored as `<field><label>.<ext>` in one
//! directory; the three fields sharing a label form one chunk.

/// Field holding the encoded board planes, shape `(N, C, H, H)`.
pub const FIELD_STATES: &str = "states";
/// Field holding the game outcome per example, shape `(N,)`.
pub const FIELD_REWARDS: &str = "rewards";
/// Field holding the search visit counts, shape `(N, H*H + 1)`.
pub const FIELD_VISIT_COUNTS: &str = "visit_counts";

pub const FIELDS: [&str; 3] = [FIELD_STATES, FIELD_REWARDS, FIELD_VISIT_COUNTS];

/// JSON sidecar pointing at a raw data dump.
pub const EXT_DESCRIPTOR: &str = "json";
/// Self-describing NumPy array.
pub const EXT_NPY: &str = "npy";

/// Extensions tried, in order, when resolving a field file.
pub const EXTENSIONS: [&str; 2] = [EXT_DESCRIPTOR, EXT_NPY];

/// File name of `field` for the chunk `label`.
pub fn field_file_name(field: &str, label: &str, ext: &str) -> String {
    format!("{field}{label}.{ext}")
}

/// Extract the label from a states file name, e.g. `states_3.json` -> `_3`.
pub fn states_label(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_prefix(FIELD_STATES)?;
    EXTENSIONS.iter().find_map(|ext| {
        stem.strip_suffix(ext)
            .and_then(|rest| rest.strip_suffix('.'))
    })
}
