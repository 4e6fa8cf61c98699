use std::path::PathBuf;

use mdl_lib::offset::{OffsetError, OutOfRange, out_of_range};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadModelError {
    #[error("error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error decoding model")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid file format")]
    InvalidFormat(#[from] FormatError),

    #[error("data out of range")]
    OutOfRange(#[from] OutOfRange),

    #[error("{kind} index {index} out of range for length {len}")]
    BrokenReference {
        kind: ReferenceKind,
        index: usize,
        len: usize,
    },
}

/// Errors for files that are rejected before decoding any structures.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("expected at least {expected} bytes but found {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("expected magic {expected:?} but found {actual:?}")]
    Magic { expected: [u8; 4], actual: [u8; 4] },

    #[error("expected version {expected} but found {actual}")]
    Version { expected: u32, actual: u32 },

    #[error("error reading data")]
    Binrw(#[source] binrw::Error),
}

/// The kind of index in a [DecodeError::BrokenReference].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReferenceKind {
    Texture,
    SkinRef,
    Bone,
    BoneController,
    Vertex,
    Normal,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReferenceKind::Texture => "texture",
            ReferenceKind::SkinRef => "skin reference",
            ReferenceKind::Bone => "bone",
            ReferenceKind::BoneController => "bone controller",
            ReferenceKind::Vertex => "vertex",
            ReferenceKind::Normal => "normal",
        };
        write!(f, "{name}")
    }
}

impl From<binrw::Error> for DecodeError {
    fn from(e: binrw::Error) -> Self {
        match out_of_range(&e) {
            Some(range) => Self::OutOfRange(range),
            None => Self::InvalidFormat(FormatError::Binrw(e)),
        }
    }
}

impl From<OffsetError> for DecodeError {
    fn from(e: OffsetError) -> Self {
        match e {
            OffsetError::OutOfRange(range) => Self::OutOfRange(range),
            OffsetError::Binrw(e) => Self::InvalidFormat(FormatError::Binrw(e)),
        }
    }
}

/// Check that `index` is in range for a list of length `len`.
pub(crate) fn check_reference(
    kind: ReferenceKind,
    index: usize,
    len: usize,
) -> Result<usize, DecodeError> {
    if index < len {
        Ok(index)
    } else {
        Err(DecodeError::BrokenReference { kind, index, len })
    }
}
