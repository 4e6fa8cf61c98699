#![allow(dead_code)]
//! Builders for small synthetic model files.
use std::path::PathBuf;

pub const HEADER_SIZE: usize = 244;
pub const SEQUENCE_HEADER_SIZE: usize = 76;

/// The spans for a single animation channel as `(total, values)`.
pub type Spans = Vec<(u8, Vec<i16>)>;

/// The X, Y, Z position and X, Y, Z rotation channels for a bone.
pub type BoneChannels = [Option<Spans>; 6];

#[derive(Debug, Default)]
pub struct Writer {
    pub bytes: Vec<u8>,
}

impl Writer {
    pub fn position(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn vec3(&mut self, value: [f32; 3]) {
        value.iter().for_each(|v| self.f32(*v));
    }

    pub fn name(&mut self, name: &str, len: usize) {
        let mut bytes = vec![0u8; len];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(&bytes);
    }

    pub fn patch_u32(&mut self, position: usize, value: u32) {
        self.bytes[position..position + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[derive(Debug, Clone)]
pub struct TestBone {
    pub name: &'static str,
    pub parent: i32,
    pub controllers: [i32; 6],
    pub values: [f32; 6],
    pub scales: [f32; 6],
}

impl TestBone {
    pub fn root() -> Self {
        Self {
            name: "root",
            parent: -1,
            controllers: [-1; 6],
            values: [0.0; 6],
            scales: [1.0; 6],
        }
    }

    pub fn child(name: &'static str, parent: i32, position: [f32; 3]) -> Self {
        Self {
            name,
            parent,
            values: [position[0], position[1], position[2], 0.0, 0.0, 0.0],
            ..Self::root()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestController {
    pub bone: i32,
    pub motion_type: u32,
    pub start: f32,
    pub end: f32,
    pub rest: i32,
    pub index: i32,
}

#[derive(Debug, Clone)]
pub struct TestTexture {
    pub name: &'static str,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
    pub palette: Vec<u8>,
}

impl TestTexture {
    /// A texture using a single palette index for every pixel.
    pub fn solid(name: &'static str, width: u32, height: u32, index: u8) -> Self {
        Self {
            name,
            flags: 0,
            width,
            height,
            indices: vec![index; (width * height) as usize],
            palette: gray_palette(),
        }
    }
}

/// A palette where entry `i` is `(i, i, i)`.
pub fn gray_palette() -> Vec<u8> {
    (0..=255u8).flat_map(|i| [i, i, i]).collect()
}

#[derive(Debug, Clone)]
pub enum Run {
    Strip(Vec<[i16; 4]>),
    Fan(Vec<[i16; 4]>),
}

#[derive(Debug, Clone)]
pub struct TestMesh {
    pub skin_ref: u32,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone)]
pub enum AnimSource {
    /// Animation data stored in the main file.
    Embedded(Vec<u8>),
    /// An offset into an external sequence group file.
    External(u32),
}

#[derive(Debug, Clone)]
pub struct TestSequence {
    pub label: &'static str,
    pub fps: f32,
    pub looping: bool,
    pub frame_count: u32,
    pub blend_count: u32,
    pub motion_type: u32,
    pub motion_bone: i32,
    pub sequence_group: u32,
    pub anim: AnimSource,
    /// Events as `(frame, event, options)`.
    pub events: Vec<(i32, i32, &'static str)>,
}

impl TestSequence {
    pub fn embedded(label: &'static str, frame_count: u32, blends: &[Vec<BoneChannels>]) -> Self {
        Self {
            label,
            fps: 10.0,
            looping: true,
            frame_count,
            blend_count: blends.len() as u32,
            motion_type: 0,
            motion_bone: 0,
            sequence_group: 0,
            anim: AnimSource::Embedded(anim_data(blends)),
            events: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TestModel {
    pub name: &'static str,
    pub bones: Vec<TestBone>,
    pub controllers: Vec<TestController>,
    pub textures: Vec<TestTexture>,
    pub skin_families: Vec<Vec<u16>>,
    pub positions: Vec<[f32; 3]>,
    /// The bone for each position or bone 0 for all positions if empty.
    pub vertex_bones: Vec<u8>,
    pub normals: Vec<[f32; 3]>,
    pub meshes: Vec<TestMesh>,
    pub sequences: Vec<TestSequence>,
    /// The number of sequence groups stored in external files.
    pub external_groups: usize,
    /// Hitboxes as `(bone, group)` with a unit box.
    pub hitboxes: Vec<(i32, i32)>,
    /// Attachments as `(name, bone, origin)`.
    pub attachments: Vec<(&'static str, i32, [f32; 3])>,
    /// A square table of transition nodes.
    pub transitions: Vec<Vec<u8>>,
}

impl TestModel {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.bytes.extend_from_slice(b"IDST");
        w.u32(10);
        w.name(self.name, 64);
        w.bytes.resize(HEADER_SIZE, 0);

        let bone_offset = w.position();
        for bone in &self.bones {
            w.name(bone.name, 32);
            w.i32(bone.parent);
            w.u32(0);
            bone.controllers.iter().for_each(|c| w.i32(*c));
            bone.values.iter().for_each(|v| w.f32(*v));
            bone.scales.iter().for_each(|v| w.f32(*v));
        }

        let controller_offset = w.position();
        for c in &self.controllers {
            w.i32(c.bone);
            w.u32(c.motion_type);
            w.f32(c.start);
            w.f32(c.end);
            w.i32(c.rest);
            w.i32(c.index);
        }

        // Embedded animations use a group 0 data offset of 0.
        let anim_offsets: Vec<_> = self
            .sequences
            .iter()
            .map(|s| match &s.anim {
                AnimSource::Embedded(data) => {
                    let offset = w.position();
                    w.bytes.extend_from_slice(data);
                    offset
                }
                AnimSource::External(offset) => *offset,
            })
            .collect();

        let event_offsets: Vec<_> = self
            .sequences
            .iter()
            .map(|s| {
                let offset = w.position();
                for (frame, event, options) in &s.events {
                    w.i32(*frame);
                    w.i32(*event);
                    w.i32(0);
                    w.name(options, 64);
                }
                offset
            })
            .collect();

        let sequence_offset = w.position();
        for ((s, anim_offset), event_offset) in
            self.sequences.iter().zip(anim_offsets).zip(event_offsets)
        {
            w.name(s.label, 32);
            w.f32(s.fps);
            w.u32(s.looping as u32);
            w.i32(0);
            w.i32(0);
            w.u32(s.events.len() as u32);
            w.u32(event_offset);
            w.u32(s.frame_count);
            // pivots
            w.u32(0);
            w.u32(0);
            w.u32(s.motion_type);
            w.i32(s.motion_bone);
            w.vec3([0.0; 3]);
            w.u32(0);
            w.u32(0);
            w.vec3([-1.0; 3]);
            w.vec3([1.0; 3]);
            w.u32(s.blend_count);
            w.u32(anim_offset);
            w.u32(0);
            w.u32(0);
            w.f32(0.0);
            w.f32(0.0);
            w.f32(1.0);
            w.f32(1.0);
            w.i32(0);
            w.u32(s.sequence_group);
            w.i32(0);
            w.i32(0);
            w.i32(0);
            w.i32(0);
        }

        let group_count = 1 + self.external_groups;
        let group_offset = w.position();
        for i in 0..group_count {
            w.name(if i == 0 { "default" } else { "group" }, 32);
            w.name(&format!("models/test{i:02}.mdl"), 64);
            w.u32(0);
            w.u32(0);
        }

        let texture_data_offsets: Vec<_> = self
            .textures
            .iter()
            .map(|t| {
                let offset = w.position();
                w.bytes.extend_from_slice(&t.indices);
                w.bytes.extend_from_slice(&t.palette);
                offset
            })
            .collect();

        let texture_offset = w.position();
        for (t, data_offset) in self.textures.iter().zip(texture_data_offsets) {
            w.name(t.name, 64);
            w.u32(t.flags);
            w.u32(t.width);
            w.u32(t.height);
            w.u32(data_offset);
        }

        let skin_offset = w.position();
        for family in &self.skin_families {
            family
                .iter()
                .for_each(|i| w.bytes.extend_from_slice(&i.to_le_bytes()));
        }

        let hitbox_offset = w.position();
        for (bone, group) in &self.hitboxes {
            w.i32(*bone);
            w.i32(*group);
            w.vec3([-1.0; 3]);
            w.vec3([1.0; 3]);
        }

        let attachment_offset = w.position();
        for (name, bone, origin) in &self.attachments {
            w.name(name, 32);
            w.i32(0);
            w.i32(*bone);
            w.vec3(*origin);
            w.bytes.resize(w.bytes.len() + 36, 0);
        }

        let transition_offset = w.position();
        self.transitions
            .iter()
            .for_each(|row| w.bytes.extend_from_slice(row));

        let body_part_offset = self.write_body_part(&mut w);

        let len = w.bytes.len() as u32;
        w.patch_u32(72, len);
        let counts = [
            (140, self.bones.len(), bone_offset),
            (148, self.controllers.len(), controller_offset),
            (156, self.hitboxes.len(), hitbox_offset),
            (164, self.sequences.len(), sequence_offset),
            (172, group_count, group_offset),
            (180, self.textures.len(), texture_offset),
            (204, 1, body_part_offset),
            (212, self.attachments.len(), attachment_offset),
            (236, self.transitions.len(), transition_offset),
        ];
        for (position, count, offset) in counts {
            w.patch_u32(position, count as u32);
            w.patch_u32(position + 4, offset);
        }
        w.patch_u32(192, self.skin_families.first().map(Vec::len).unwrap_or(0) as u32);
        w.patch_u32(196, self.skin_families.len() as u32);
        w.patch_u32(200, skin_offset);

        w.bytes
    }

    fn write_body_part(&self, w: &mut Writer) -> u32 {
        let position_offset = w.position();
        self.positions.iter().for_each(|p| w.vec3(*p));

        let vertex_info_offset = w.position();
        if self.vertex_bones.is_empty() {
            w.bytes.resize(w.bytes.len() + self.positions.len(), 0);
        } else {
            w.bytes.extend_from_slice(&self.vertex_bones);
        }

        let normal_offset = w.position();
        self.normals.iter().for_each(|n| w.vec3(*n));

        let normal_info_offset = w.position();
        w.bytes.resize(w.bytes.len() + self.normals.len(), 0);

        let command_offsets: Vec<_> = self
            .meshes
            .iter()
            .map(|mesh| {
                let offset = w.position();
                for run in &mesh.runs {
                    let (sign, vertices) = match run {
                        Run::Strip(vertices) => (1, vertices),
                        Run::Fan(vertices) => (-1, vertices),
                    };
                    w.i16(sign * vertices.len() as i16);
                    vertices.iter().flatten().for_each(|v| w.i16(*v));
                }
                w.i16(0);
                offset
            })
            .collect();

        let mesh_offset = w.position();
        for (mesh, command_offset) in self.meshes.iter().zip(command_offsets) {
            w.u32(0);
            w.u32(command_offset);
            w.u32(mesh.skin_ref);
            w.u32(0);
            w.u32(0);
        }

        let model_offset = w.position();
        w.name("body_reference", 64);
        w.i32(0);
        w.f32(0.0);
        w.u32(self.meshes.len() as u32);
        w.u32(mesh_offset);
        w.u32(self.positions.len() as u32);
        w.u32(vertex_info_offset);
        w.u32(position_offset);
        w.u32(self.normals.len() as u32);
        w.u32(normal_info_offset);
        w.u32(normal_offset);
        w.u32(0);
        w.u32(0);

        let body_part_offset = w.position();
        w.name("body", 64);
        w.u32(1);
        w.i32(1);
        w.u32(model_offset);
        body_part_offset
    }
}

/// Encode [AnimChannels] for each blend and bone followed by the channel values.
pub fn anim_data(blends: &[Vec<BoneChannels>]) -> Vec<u8> {
    let block_count: usize = blends.iter().map(Vec::len).sum();

    let mut w = Writer::default();
    w.bytes.resize(block_count * 12, 0);
    for (i, channels) in blends.iter().flatten().enumerate() {
        let block = i * 12;
        for (c, spans) in channels.iter().enumerate() {
            if let Some(spans) = spans {
                // Offsets are relative to the channels for this bone.
                let offset = (w.bytes.len() - block) as u16;
                w.bytes[block + c * 2..block + c * 2 + 2].copy_from_slice(&offset.to_le_bytes());
                for (total, values) in spans {
                    w.u8(values.len() as u8);
                    w.u8(*total);
                    values.iter().for_each(|v| w.i16(*v));
                }
            }
        }
    }
    w.bytes
}

/// Channels with only the X position animated.
pub fn x_channels(spans: Spans) -> BoneChannels {
    let mut channels: BoneChannels = Default::default();
    channels[0] = Some(spans);
    channels
}

/// A sequence group file with `anim` immediately after the header.
pub fn sequence_group_file(anim: &[u8]) -> Vec<u8> {
    let mut w = Writer::default();
    w.bytes.extend_from_slice(b"IDSQ");
    w.u32(10);
    w.name("test01", 64);
    w.u32((SEQUENCE_HEADER_SIZE + anim.len()) as u32);
    w.bytes.extend_from_slice(anim);
    w.bytes
}

/// A new empty folder for files used by a single test.
pub fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mdl_model_{name}_{}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
