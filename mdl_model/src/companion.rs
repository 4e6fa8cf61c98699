//! Locating the external texture and sequence group files for a model.
//!
//! | File | Path |
//! | --- | --- |
//! | Textures | `<stem>T.mdl` |
//! | Sequence group N | `<stem>NN.mdl` with N in `1..=31` |
//!
//! A missing or invalid companion file is not an error.
//! The model loads with the data it has and the affected textures or sequences are unavailable.
use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{verify_header, verify_sequence_group};

/// The maximum number of sequence groups including the embedded group 0.
pub const MAX_SEQUENCE_GROUPS: usize = 32;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Companion {
    /// The `<stem>T<ext>` file with textures and skin families.
    Texture,
    /// The `<stem>NN<ext>` file with animation data for a sequence group.
    SequenceGroup(usize),
}

/// The path of the `companion` file for the model at `path`.
///
/// # Examples
/// ```rust
/// use std::path::Path;
/// use mdl_model::companion::{Companion, companion_path};
///
/// let path = Path::new("models/scientist.mdl");
/// assert_eq!(Path::new("models/scientistT.mdl"), companion_path(path, Companion::Texture));
/// assert_eq!(
///     Path::new("models/scientist01.mdl"),
///     companion_path(path, Companion::SequenceGroup(1))
/// );
/// ```
pub fn companion_path(path: &Path, companion: Companion) -> PathBuf {
    let suffix = match companion {
        Companion::Texture => "T".to_string(),
        Companion::SequenceGroup(i) => format!("{i:02}"),
    };

    let mut file_name = OsString::from(path.file_stem().unwrap_or_default());
    file_name.push(suffix);
    if let Some(extension) = path.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    path.with_file_name(file_name)
}

/// Load the external texture file for the model at `path` if present and valid.
pub fn load_texture_file(path: &Path) -> Option<Vec<u8>> {
    let texture_path = companion_path(path, Companion::Texture);
    let bytes = read_companion(&texture_path)?;
    match verify_header(&bytes) {
        Ok(()) => Some(bytes),
        Err(e) => {
            warn!("Ignoring invalid texture file {texture_path:?}: {e}");
            None
        }
    }
}

/// Load the external sequence group files `1..group_count` for the model at `path`.
///
/// Groups with missing or invalid files are not included.
pub fn load_sequence_group_files(path: &Path, group_count: usize) -> BTreeMap<usize, Vec<u8>> {
    if group_count > MAX_SEQUENCE_GROUPS {
        warn!(
            "Sequence group count {group_count} exceeds the maximum of {MAX_SEQUENCE_GROUPS}"
        );
    }

    (1..group_count.min(MAX_SEQUENCE_GROUPS))
        .filter_map(|i| {
            let group_path = companion_path(path, Companion::SequenceGroup(i));
            let bytes = read_companion(&group_path)?;
            match verify_sequence_group(&bytes) {
                Ok(()) => Some((i, bytes)),
                Err(e) => {
                    warn!("Ignoring invalid sequence group file {group_path:?}: {e}");
                    None
                }
            }
        })
        .collect()
}

fn read_companion(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            info!("Companion file {path:?} not loaded: {e}");
            None
        }
    }
}
