//! Body parts, sub-models, and meshes converted to indexed triangle lists.
use glam::{Vec2, Vec3, vec2};
use log::error;
use mdl_lib::{
    mdl::{StudioHeader, TextureDescriptor, TriangleCommands},
    offset::OffsetReader,
};

use crate::{
    error::{DecodeError, ReferenceKind, check_reference},
    vertex::{Vertex, VertexSet, triangle_list},
};

/// A swappable slot with alternative versions of a model part like heads or weapons.
#[derive(Debug, PartialEq, Clone)]
pub struct BodyPart {
    pub name: String,
    /// The divisor for selecting a model from a packed body value.
    pub base: i32,
    /// The alternative models with only one model drawn at a time.
    pub models: Vec<Model>,
}

/// A sub-model with meshes that share the same vertices.
#[derive(Debug, PartialEq, Clone)]
pub struct Model {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub meshes: Vec<Mesh>,
}

/// A triangle list for a single texture.
#[derive(Debug, PartialEq, Clone)]
pub struct Mesh {
    /// The index into [textures](crate::ModelRoot::textures)
    /// or `None` if the texture could not be resolved or decoded.
    pub texture_index: Option<usize>,
    /// The index into each skin family for selecting an alternate texture.
    pub skin_ref: usize,
    /// Triangle list indices into the [vertices](struct.Model.html#structfield.vertices) of the model.
    pub indices: Vec<u32>,
}

impl BodyPart {
    /// The index in [models](#structfield.models) selected by the packed `body` value
    /// or `None` if there are no models.
    pub fn active_model_index(&self, body: u32) -> Option<usize> {
        if self.models.is_empty() {
            return None;
        }

        match u32::try_from(self.base) {
            Ok(base) if base > 0 => Some((body / base) as usize % self.models.len()),
            _ => Some(0),
        }
    }

    /// The model selected by the packed `body` value.
    pub fn active_model(&self, body: u32) -> Option<&Model> {
        self.active_model_index(body).and_then(|i| self.models.get(i))
    }
}

/// The texture data for resolving a mesh's skin reference.
pub(crate) struct MeshTextures<'a> {
    /// Descriptor indices for the skin family used for meshes.
    pub skins: &'a [u16],
    pub descriptors: &'a [TextureDescriptor],
    /// The decoded texture index for each descriptor.
    pub texture_indices: &'a [Option<usize>],
}

impl MeshTextures<'_> {
    fn descriptor_index(&self, skin_ref: usize) -> Result<usize, DecodeError> {
        let skin_ref = check_reference(ReferenceKind::SkinRef, skin_ref, self.skins.len())?;
        check_reference(
            ReferenceKind::Texture,
            self.skins[skin_ref] as usize,
            self.descriptors.len(),
        )
    }

    /// The decoded texture and the scale to normalize pixel coordinates.
    fn resolve(&self, skin_ref: usize) -> (Option<usize>, Vec2) {
        match self.descriptor_index(skin_ref) {
            Ok(i) => {
                let descriptor = &self.descriptors[i];
                let scale = vec2(
                    1.0 / descriptor.width.max(1) as f32,
                    1.0 / descriptor.height.max(1) as f32,
                );
                (self.texture_indices.get(i).copied().flatten(), scale)
            }
            Err(e) => {
                error!("Error resolving texture for skin reference {skin_ref}: {e}");
                (None, Vec2::ONE)
            }
        }
    }
}

// Per vertex data shared by all meshes of a model.
struct VertexData {
    positions: Vec<[f32; 3]>,
    bone_indices: Vec<u8>,
    normals: Vec<[f32; 3]>,
}

/// Decode every sub-model of every body part.
///
/// Models with invalid vertex data are logged and have no meshes.
pub(crate) fn decode_body_parts(
    header: &StudioHeader,
    reader: &OffsetReader,
    textures: &MeshTextures,
    bone_count: usize,
) -> Vec<BodyPart> {
    header
        .body_parts
        .iter()
        .map(|body_part| BodyPart {
            name: body_part.name.clone(),
            base: body_part.base,
            models: body_part
                .models
                .iter()
                .map(|model| {
                    Model::decode(model, reader, textures, bone_count).unwrap_or_else(|e| {
                        error!(
                            "Error decoding model {:?} in body part {:?}: {e}",
                            model.name, body_part.name
                        );
                        Model {
                            name: model.name.clone(),
                            vertices: Vec::new(),
                            meshes: Vec::new(),
                        }
                    })
                })
                .collect(),
        })
        .collect()
}

impl Model {
    fn decode(
        model: &mdl_lib::mdl::Model,
        reader: &OffsetReader,
        textures: &MeshTextures,
        bone_count: usize,
    ) -> Result<Self, DecodeError> {
        let vertex_count = model.vertex_count as usize;
        let data = VertexData {
            positions: reader.read_vec(model.vertex_offset as u64, vertex_count)?,
            bone_indices: reader.read_vec(model.vertex_info_offset as u64, vertex_count)?,
            normals: reader.read_vec(model.normal_offset as u64, model.normal_count as usize)?,
        };

        let mut vertices = VertexSet::new();
        let meshes = model
            .meshes
            .iter()
            .enumerate()
            .filter_map(|(i, mesh)| {
                Mesh::decode(mesh, reader, &data, textures, bone_count, &mut vertices)
                    .inspect_err(|e| {
                        error!("Error decoding mesh {i} for model {:?}: {e}", model.name)
                    })
                    .ok()
            })
            .collect();

        Ok(Self {
            name: model.name.clone(),
            vertices: vertices.into_vertices(),
            meshes,
        })
    }
}

impl Mesh {
    fn decode(
        mesh: &mdl_lib::mdl::Mesh,
        reader: &OffsetReader,
        data: &VertexData,
        textures: &MeshTextures,
        bone_count: usize,
        vertices: &mut VertexSet,
    ) -> Result<Self, DecodeError> {
        let commands: TriangleCommands = reader.read(mesh.triangle_offset as u64)?;

        // Check every reference before adding vertices to the shared set.
        for vertex in commands.runs.iter().flat_map(|r| &r.vertices) {
            let position_index = check_reference(
                ReferenceKind::Vertex,
                vertex.position_index as usize,
                data.positions.len(),
            )?;
            check_reference(
                ReferenceKind::Normal,
                vertex.normal_index as usize,
                data.normals.len(),
            )?;
            check_reference(
                ReferenceKind::Bone,
                data.bone_indices[position_index] as usize,
                bone_count,
            )?;
        }

        let skin_ref = mesh.skin_ref as usize;
        let (texture_index, uv_scale) = textures.resolve(skin_ref);

        let indices = triangle_list(&commands.runs, vertices, |v| {
            let position_index = v.position_index as usize;
            Vertex {
                position: Vec3::from(data.positions[position_index]),
                normal: Vec3::from(data.normals[v.normal_index as usize]),
                uv: vec2(v.s as f32, v.t as f32) * uv_scale,
                bone_index: data.bone_indices[position_index] as usize,
            }
        });

        Ok(Self {
            texture_index,
            skin_ref,
            indices,
        })
    }
}
