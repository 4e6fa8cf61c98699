//! Studio models in `.mdl` files.
//!
//! [StudioHeader] files store the skeleton, sequences, meshes and optionally textures.
//! Models with many textures store the texture data in a separate `<name>T.mdl` file.
//! The texture file uses the same header with only the texture and skin fields filled in.
//!
//! # File Paths
//! | Game | File Patterns |
//! | --- | --- |
//! | Half-Life | `valve/models/*.mdl` |
//! | Counter-Strike | `cstrike/models/*.mdl` |
use crate::{fixed_string, parse_count32_offset32, parse_offset32_count, parse_vec};
use bilge::prelude::*;
use binrw::{BinRead, BinResult, binread};

/// The size in bytes of [StudioHeader].
pub const HEADER_SIZE: usize = 244;

/// The number of bytes in a texture palette with 256 RGB colors.
pub const PALETTE_SIZE: usize = 256 * 3;

/// The palette index for transparent pixels in [TextureFlags::masked] textures.
pub const MASKED_PALETTE_INDEX: u8 = 255;

/// The header for primary model and external texture files.
#[binread]
#[derive(Debug, PartialEq, Clone)]
#[br(magic(b"IDST"))]
pub struct StudioHeader {
    #[br(assert(version == crate::VERSION))]
    pub version: u32,

    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,

    /// The size of the file in bytes.
    pub length: u32,

    pub eye_position: [f32; 3],
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// The clipping bounding box.
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],

    pub flags: u32,

    #[br(parse_with = parse_count32_offset32)]
    pub bones: Vec<Bone>,

    #[br(parse_with = parse_count32_offset32)]
    pub bone_controllers: Vec<BoneController>,

    pub hitbox_count: u32,
    /// The offset of [hitbox_count](#structfield.hitbox_count) [Hitbox] entries.
    pub hitbox_offset: u32,

    #[br(parse_with = parse_count32_offset32)]
    pub sequences: Vec<SequenceDescription>,

    #[br(parse_with = parse_count32_offset32)]
    pub sequence_groups: Vec<SequenceGroup>,

    /// Texture descriptors or empty if textures are stored in a separate file.
    #[br(parse_with = parse_count32_offset32)]
    pub textures: Vec<TextureDescriptor>,

    pub texture_data_offset: u32,

    /// The number of texture references in each skin family.
    pub skin_ref_count: u32,

    #[br(temp)]
    skin_family_count: u32,

    /// Indices into [textures](#structfield.textures) for each skin family and skin reference.
    #[br(parse_with = parse_skin_families, args(skin_family_count, skin_ref_count))]
    pub skin_families: Vec<Vec<u16>>,

    #[br(parse_with = parse_count32_offset32)]
    pub body_parts: Vec<BodyPart>,

    pub attachment_count: u32,
    /// The offset of [attachment_count](#structfield.attachment_count) [Attachment] entries.
    pub attachment_offset: u32,

    // Sound tables are unused by the engine.
    #[br(temp)]
    _sounds: [u32; 4],

    /// The number of nodes for the sequence transition table.
    pub transition_count: u32,
    /// The offset of a `u8` table with `transition_count * transition_count` entries.
    pub transition_offset: u32,
}

fn parse_skin_families<R: std::io::Read + std::io::Seek>(
    reader: &mut R,
    endian: binrw::Endian,
    (family_count, ref_count): (u32, u32),
) -> BinResult<Vec<Vec<u16>>> {
    let offset = u32::read_options(reader, endian, ())?;
    let count = family_count as usize * ref_count as usize;
    let values: Vec<u16> = parse_vec(reader, endian, offset as u64, count)?;
    Ok(values
        .chunks(ref_count.max(1) as usize)
        .take(family_count as usize)
        .map(|c| c.to_vec())
        .collect())
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Bone {
    #[br(map(|x: [u8; 32]| fixed_string(&x)))]
    pub name: String,
    /// The index of the parent bone in [bones](struct.StudioHeader.html#structfield.bones)
    /// or `-1` for root bones.
    pub parent_index: i32,
    pub flags: u32,
    /// Indices into [bone_controllers](struct.StudioHeader.html#structfield.bone_controllers)
    /// for the position and rotation channels or `-1` if not adjusted.
    pub bone_controllers: [i32; 6],
    /// The default position and Euler angles in radians.
    pub values: [f32; 6],
    /// Scale factors applied to compressed animation values for each channel.
    pub scales: [f32; 6],
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct BoneController {
    pub bone_index: i32,
    pub motion_type: MotionFlags,
    pub start: f32,
    pub end: f32,
    /// The raw controller value when idle.
    pub rest: i32,
    /// The controller input slot with `0..=3` for general controllers and `4` for the mouth.
    pub index: i32,
}

/// Flags for sequence motion extraction and bone controller types.
#[bitsize(32)]
#[derive(DebugBits, FromBits, BinRead, PartialEq, Clone, Copy)]
#[br(map = u32::into)]
pub struct MotionFlags {
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub xr: bool,
    pub yr: bool,
    pub zr: bool,
    pub lx: bool,
    pub ly: bool,
    pub lz: bool,
    pub ax: bool,
    pub ay: bool,
    pub az: bool,
    pub axr: bool,
    pub ayr: bool,
    pub azr: bool,
    /// Controller values wrap around a full rotation.
    pub rloop: bool,
    pub unk: u16,
}

/// The bits of [MotionFlags] that select the motion or controller type.
pub const MOTION_TYPES: u32 = 0x7fff;

pub const MOTION_X: u32 = 0x1;
pub const MOTION_Y: u32 = 0x2;
pub const MOTION_Z: u32 = 0x4;
pub const MOTION_XR: u32 = 0x8;
pub const MOTION_YR: u32 = 0x10;
pub const MOTION_ZR: u32 = 0x20;

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Hitbox {
    pub bone_index: i32,
    pub group: i32,
    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct SequenceDescription {
    #[br(map(|x: [u8; 32]| fixed_string(&x)))]
    pub label: String,
    pub fps: f32,
    pub flags: SequenceFlags,
    pub activity: i32,
    pub activity_weight: i32,

    pub event_count: u32,
    /// The offset of [event_count](#structfield.event_count) [Event] entries.
    pub event_offset: u32,

    pub frame_count: u32,

    pub pivot_count: u32,
    /// The offset of [pivot_count](#structfield.pivot_count) [Pivot] entries.
    pub pivot_offset: u32,

    pub motion_type: MotionFlags,
    pub motion_bone: i32,
    pub linear_movement: [f32; 3],
    pub automove_position_offset: u32,
    pub automove_angle_offset: u32,

    pub bb_min: [f32; 3],
    pub bb_max: [f32; 3],

    /// The number of blended animations with `1`, `2`, or `4` used in practice.
    pub blend_count: u32,

    /// The offset of the [AnimChannels](crate::anim::AnimChannels) for each blend and bone.
    /// This is relative to [data_offset](struct.SequenceGroup.html#structfield.data_offset)
    /// for group 0 and the start of the sequence group file otherwise.
    pub anim_offset: u32,

    pub blend_types: [MotionFlags; 2],
    pub blend_start: [f32; 2],
    pub blend_end: [f32; 2],
    pub blend_parent: i32,

    /// The index into [sequence_groups](struct.StudioHeader.html#structfield.sequence_groups).
    pub sequence_group: u32,

    pub entry_node: i32,
    pub exit_node: i32,
    pub node_flags: i32,
    pub next_sequence: i32,
}

#[bitsize(32)]
#[derive(DebugBits, FromBits, BinRead, PartialEq, Clone, Copy)]
#[br(map = u32::into)]
pub struct SequenceFlags {
    pub looping: bool,
    pub unk: u31,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Event {
    pub frame: i32,
    pub event: i32,
    pub event_type: i32,
    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub options: String,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Pivot {
    pub origin: [f32; 3],
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct SequenceGroup {
    #[br(map(|x: [u8; 32]| fixed_string(&x)))]
    pub label: String,
    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,
    // Runtime cache pointer.
    pub unk1: u32,
    /// The offset for animations in this group.
    /// Only used for group 0 stored in the main file.
    pub data_offset: u32,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct TextureDescriptor {
    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,
    pub flags: TextureFlags,
    pub width: u32,
    pub height: u32,
    /// The offset of `width * height` palette indices followed by a [PALETTE_SIZE] palette.
    pub data_offset: u32,
}

#[bitsize(32)]
#[derive(DebugBits, FromBits, BinRead, PartialEq, Clone, Copy)]
#[br(map = u32::into)]
pub struct TextureFlags {
    pub flat_shade: bool,
    pub chrome: bool,
    pub full_bright: bool,
    pub no_mips: bool,
    pub alpha: bool,
    pub additive: bool,
    /// Palette index [MASKED_PALETTE_INDEX] is fully transparent.
    pub masked: bool,
    pub unk: u25,
}

#[binread]
#[derive(Debug, PartialEq, Clone)]
pub struct BodyPart {
    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,

    #[br(temp)]
    model_count: u32,

    /// The divisor for selecting a model from a packed body value.
    pub base: i32,

    /// Alternative models with only one model drawn at a time.
    #[br(parse_with = parse_offset32_count, args(model_count))]
    pub models: Vec<Model>,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Model {
    #[br(map(|x: [u8; 64]| fixed_string(&x)))]
    pub name: String,
    pub model_type: i32,
    pub bounding_radius: f32,

    #[br(parse_with = parse_count32_offset32)]
    pub meshes: Vec<Mesh>,

    pub vertex_count: u32,
    /// The offset of a `u8` bone index for each vertex.
    pub vertex_info_offset: u32,
    /// The offset of a `[f32; 3]` position for each vertex.
    pub vertex_offset: u32,

    pub normal_count: u32,
    /// The offset of a `u8` bone index for each normal.
    pub normal_info_offset: u32,
    /// The offset of a `[f32; 3]` normal for each normal.
    pub normal_offset: u32,

    // Deformation groups are unused.
    pub group_count: u32,
    pub group_offset: u32,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Mesh {
    pub triangle_count: u32,
    /// The offset of the [TriangleCommands] for this mesh.
    pub triangle_offset: u32,
    /// The index into each skin family in [skin_families](struct.StudioHeader.html#structfield.skin_families).
    pub skin_ref: u32,
    pub normal_count: u32,
    pub normal_offset: u32,
}

#[derive(Debug, BinRead, PartialEq, Clone)]
pub struct Attachment {
    #[br(map(|x: [u8; 32]| fixed_string(&x)))]
    pub name: String,
    pub attachment_type: i32,
    pub bone_index: i32,
    pub origin: [f32; 3],
    pub vectors: [[f32; 3]; 3],
}

/// A stream of triangle strips and fans terminated by a zero length run.
#[derive(Debug, PartialEq, Clone)]
pub struct TriangleCommands {
    pub runs: Vec<TriangleRun>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TriangleRun {
    pub kind: TriangleRunKind,
    pub vertices: Vec<TriangleVertex>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TriangleRunKind {
    Strip,
    Fan,
}

#[derive(Debug, BinRead, PartialEq, Eq, Clone, Copy)]
pub struct TriangleVertex {
    /// Index into the model's vertices and vertex bone indices.
    pub position_index: u16,
    /// Index into the model's normals.
    pub normal_index: u16,
    /// Texture coordinates in pixels.
    pub s: i16,
    pub t: i16,
}

impl BinRead for TriangleCommands {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: binrw::Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let mut runs = Vec::new();
        loop {
            let header = i16::read_options(reader, endian, ())?;
            if header == 0 {
                break;
            }

            // Positive lengths are strips and negative lengths are fans.
            let kind = if header > 0 {
                TriangleRunKind::Strip
            } else {
                TriangleRunKind::Fan
            };
            let count = header.unsigned_abs() as usize;

            let mut vertices = Vec::with_capacity(count);
            for _ in 0..count {
                vertices.push(TriangleVertex::read_options(reader, endian, ())?);
            }

            runs.push(TriangleRun { kind, vertices });
        }

        Ok(Self { runs })
    }
}
