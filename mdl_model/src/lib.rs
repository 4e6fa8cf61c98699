//! # mdl_model
//! mdl_model provides high level data access for GoldSrc `.mdl` models and their companion files.
//!
//! Models are decoded into owned data with indexed triangle lists, RGBA8 textures, and
//! a skeleton with sequences that can be evaluated to bone transforms for any frame.
//!
//! # Getting Started
//! ```rust no_run
//! use mdl_model::{ControllerValues, evaluate_bones, load_model};
//!
//! let root = load_model("models/scientist.mdl")?;
//!
//! for body_part in &root.body_parts {
//!     for model in &body_part.models {
//!         println!("{:?}: {} vertices", model.name, model.vertices.len());
//!     }
//! }
//!
//! let transforms = evaluate_bones(&root, 0, 0.0, &ControllerValues::default());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::{collections::BTreeMap, path::Path};

use binrw::BinRead;
use glam::Vec3;
use log::{error, warn};
use mdl_lib::{
    mdl::{HEADER_SIZE, StudioHeader},
    offset::OffsetReader,
    seq::SEQUENCE_HEADER_SIZE,
};

pub use animation::{ControllerValues, Sequence};
pub use animator::{Animator, advance_frame, evaluate_bones};
pub use mdl_lib::mdl::SequenceGroup;
pub use model::{BodyPart, Mesh, Model};
pub use skeleton::Skeleton;
pub use texture::Texture;
pub use vertex::Vertex;

use error::{DecodeError, FormatError, LoadModelError};
use model::{MeshTextures, decode_body_parts};
use skeleton::bone_reference;

pub mod animation;
pub mod animator;
pub mod companion;
pub mod error;
pub mod model;
pub mod skeleton;
pub mod texture;
pub mod transform;
pub mod vertex;

/// All the decoded data for a model and its companion files.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ModelRoot {
    pub name: String,
    pub flags: u32,
    pub eye_position: Vec3,
    pub min: Vec3,
    pub max: Vec3,
    /// The clipping bounding box.
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    pub skeleton: Skeleton,
    pub hitboxes: Vec<Hitbox>,
    pub attachments: Vec<Attachment>,
    pub sequences: Vec<Sequence>,
    pub sequence_groups: Vec<SequenceGroup>,
    pub body_parts: Vec<BodyPart>,
    /// The successfully decoded textures from the model or external texture file.
    pub textures: Vec<Texture>,
    /// Indices into [textures](#structfield.textures) for each skin family and skin reference.
    pub skin_families: Vec<Vec<Option<usize>>>,
    /// The sequence graph node to use when moving from the row node to the column node.
    pub transitions: Vec<Vec<u8>>,
}

/// A bounding box attached to a bone for hit detection.
#[derive(Debug, PartialEq, Clone)]
pub struct Hitbox {
    pub bone_index: Option<usize>,
    pub group: i32,
    pub min: Vec3,
    pub max: Vec3,
}

/// A named point relative to a bone like a muzzle or hand position.
#[derive(Debug, PartialEq, Clone)]
pub struct Attachment {
    pub name: String,
    pub bone_index: Option<usize>,
    pub origin: Vec3,
}

impl ModelRoot {
    /// Decode a model from the bytes of the primary file.
    ///
    /// The `texture_bytes` are only used if the primary file has no textures.
    /// The `sequence_groups` contain the external sequence group files by group index.
    #[tracing::instrument(skip_all)]
    pub fn from_bytes(
        bytes: &[u8],
        texture_bytes: Option<&[u8]>,
        sequence_groups: &BTreeMap<usize, Vec<u8>>,
    ) -> Result<Self, DecodeError> {
        verify_header(bytes)?;
        let header = StudioHeader::from_bytes(bytes)?;
        Ok(Self::from_header(
            &header,
            bytes,
            texture_bytes,
            sequence_groups,
        ))
    }

    fn from_header(
        header: &StudioHeader,
        bytes: &[u8],
        texture_bytes: Option<&[u8]>,
        sequence_groups: &BTreeMap<usize, Vec<u8>>,
    ) -> Self {
        let texture_file = if header.textures.is_empty() {
            texture_bytes.and_then(|bytes| {
                read_texture_header(bytes)
                    .inspect_err(|e| error!("Error reading texture file: {e}"))
                    .ok()
                    .map(|header| (header, bytes))
            })
        } else {
            None
        };
        let (texture_header, texture_data) = match &texture_file {
            Some((header, bytes)) => (header, *bytes),
            None => (header, bytes),
        };

        // Skip textures that failed to decode and remap the references.
        let mut textures = Vec::new();
        let texture_indices: Vec<_> =
            texture::load_textures(texture_header, &OffsetReader::new(texture_data))
                .into_iter()
                .map(|texture| {
                    texture.map(|texture| {
                        textures.push(texture);
                        textures.len() - 1
                    })
                })
                .collect();

        let skin_families = texture_header
            .skin_families
            .iter()
            .map(|family| {
                family
                    .iter()
                    .map(|i| texture_indices.get(*i as usize).copied().flatten())
                    .collect()
            })
            .collect();

        let mesh_textures = MeshTextures {
            skins: texture_header
                .skin_families
                .first()
                .map(Vec::as_slice)
                .unwrap_or_default(),
            descriptors: &texture_header.textures,
            texture_indices: &texture_indices,
        };

        let reader = OffsetReader::new(bytes);
        let bone_count = header.bones.len();
        let body_parts = decode_body_parts(header, &reader, &mesh_textures, bone_count);

        let hitboxes: Vec<mdl_lib::mdl::Hitbox> = read_table(
            &reader,
            header.hitbox_offset,
            header.hitbox_count as usize,
            "hitboxes",
        );
        let attachments: Vec<mdl_lib::mdl::Attachment> = read_table(
            &reader,
            header.attachment_offset,
            header.attachment_count as usize,
            "attachments",
        );

        let node_count = header.transition_count as usize;
        let transitions: Vec<u8> = read_table(
            &reader,
            header.transition_offset,
            node_count.saturating_mul(node_count),
            "transitions",
        );

        let sequences = header
            .sequences
            .iter()
            .map(|s| Sequence::from_description(s, header, bytes, sequence_groups))
            .collect();

        Self {
            name: header.name.clone(),
            flags: header.flags,
            eye_position: header.eye_position.into(),
            min: header.min.into(),
            max: header.max.into(),
            bb_min: header.bb_min.into(),
            bb_max: header.bb_max.into(),
            skeleton: Skeleton::from_header(header),
            hitboxes: hitboxes
                .iter()
                .map(|h| Hitbox {
                    bone_index: bone_reference(h.bone_index, bone_count),
                    group: h.group,
                    min: h.bb_min.into(),
                    max: h.bb_max.into(),
                })
                .collect(),
            attachments: attachments
                .iter()
                .map(|a| Attachment {
                    name: a.name.clone(),
                    bone_index: bone_reference(a.bone_index, bone_count),
                    origin: a.origin.into(),
                })
                .collect(),
            sequences,
            sequence_groups: header.sequence_groups.clone(),
            body_parts,
            textures,
            skin_families,
            transitions: transitions
                .chunks(node_count.max(1))
                .map(<[u8]>::to_vec)
                .collect(),
        }
    }

    /// The index into [textures](#structfield.textures) for a skin family and skin reference.
    pub fn texture_index(&self, skin_family: usize, skin_ref: usize) -> Option<usize> {
        self.skin_families
            .get(skin_family)?
            .get(skin_ref)
            .copied()
            .flatten()
    }

    /// The selected model for each body part from a packed `body` value.
    pub fn active_models(&self, body: u32) -> impl Iterator<Item = &Model> + '_ {
        self.body_parts
            .iter()
            .filter_map(move |b| b.active_model(body))
    }

    /// The index of the first sequence with a label matching `label` ignoring ASCII case.
    pub fn sequence_index(&self, label: &str) -> Option<usize> {
        self.sequences
            .iter()
            .position(|s| s.label.eq_ignore_ascii_case(label))
    }
}

/// Read `count` values at `offset` or log the error and return an empty list.
///
/// Used for metadata that should not prevent loading the rest of the model.
pub(crate) fn read_table<T>(reader: &OffsetReader, offset: u32, count: usize, name: &str) -> Vec<T>
where
    for<'a> T: BinRead<Args<'a> = ()> + 'static,
{
    if count == 0 {
        return Vec::new();
    }
    reader.read_vec(offset as u64, count).unwrap_or_else(|e| {
        error!("Error reading {count} {name} at offset {offset}: {e}");
        Vec::new()
    })
}

fn read_texture_header(bytes: &[u8]) -> Result<StudioHeader, DecodeError> {
    verify_header(bytes)?;
    StudioHeader::from_bytes(bytes).map_err(Into::into)
}

/// Load the model at `path` and any companion texture and sequence group files.
///
/// Missing or invalid companion files are logged and do not cause an error.
#[tracing::instrument(skip_all)]
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelRoot, LoadModelError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadModelError::Io {
        path: path.to_owned(),
        source,
    })?;

    verify_header(&bytes).map_err(DecodeError::from)?;
    let header = StudioHeader::from_bytes(&bytes).map_err(DecodeError::from)?;

    let texture_bytes = if header.textures.is_empty() {
        companion::load_texture_file(path)
    } else {
        None
    };
    let sequence_groups =
        companion::load_sequence_group_files(path, header.sequence_groups.len());

    Ok(ModelRoot::from_header(
        &header,
        &bytes,
        texture_bytes.as_deref(),
        &sequence_groups,
    ))
}

/// Load the model at `path` or log the error and return an empty model.
pub fn load_model_or_empty<P: AsRef<Path>>(path: P) -> ModelRoot {
    let path = path.as_ref();
    load_model(path).unwrap_or_else(|e| {
        warn!("Error loading {path:?}: {e}");
        ModelRoot::default()
    })
}

/// Check the size, magic, and version of a model or texture file.
pub fn verify_header(bytes: &[u8]) -> Result<(), FormatError> {
    verify(bytes, *b"IDST", HEADER_SIZE)
}

/// Check the size, magic, and version of a sequence group file.
pub fn verify_sequence_group(bytes: &[u8]) -> Result<(), FormatError> {
    verify(bytes, *b"IDSQ", SEQUENCE_HEADER_SIZE)
}

fn verify(bytes: &[u8], magic: [u8; 4], size: usize) -> Result<(), FormatError> {
    let too_short = FormatError::TooShort {
        expected: size,
        actual: bytes.len(),
    };
    if bytes.len() < size {
        return Err(too_short);
    }

    let (actual, rest) = bytes.split_first_chunk::<4>().ok_or(too_short)?;
    if *actual != magic {
        return Err(FormatError::Magic {
            expected: magic,
            actual: *actual,
        });
    }

    let (version, _) = rest.split_first_chunk::<4>().ok_or(FormatError::TooShort {
        expected: size,
        actual: bytes.len(),
    })?;
    let version = u32::from_le_bytes(*version);
    if version != mdl_lib::VERSION {
        return Err(FormatError::Version {
            expected: mdl_lib::VERSION,
            actual: version,
        });
    }

    Ok(())
}
