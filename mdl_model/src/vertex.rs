//! Conversion of triangle strips and fans to indexed triangle lists.
use ahash::AHashMap;
use glam::{Vec2, Vec3};
use mdl_lib::mdl::{TriangleRun, TriangleRunKind};
use ordered_float::OrderedFloat;

/// A unique combination of vertex attributes shared by the meshes of a [Model](crate::Model).
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// Texture coordinates normalized by the texture dimensions.
    pub uv: Vec2,
    /// The index of the bone in [bones](crate::skeleton::Skeleton::bones) that moves this vertex.
    pub bone_index: usize,
}

/// Vertices that compare equal only appear once.
///
/// Vertices are equal if the position, normal, and uv are equal.
/// The bone index is not compared, so the first inserted vertex wins.
/// NaN values never compare equal, so vertices containing NaN are never shared.
#[derive(Debug, Default)]
pub struct VertexSet {
    vertices: Vec<Vertex>,
    vertex_to_index: AHashMap<[OrderedFloat<f32>; 8], u32>,
}

impl VertexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `vertex` and return the index of the new or existing equal vertex.
    pub fn insert(&mut self, vertex: Vertex) -> u32 {
        let key = vertex_key(&vertex);
        if key.iter().any(|f| f.is_nan()) {
            self.vertices.push(vertex);
            return self.vertices.len() as u32 - 1;
        }

        *self.vertex_to_index.entry(key).or_insert_with(|| {
            self.vertices.push(vertex);
            self.vertices.len() as u32 - 1
        })
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn into_vertices(self) -> Vec<Vertex> {
        self.vertices
    }
}

fn vertex_key(v: &Vertex) -> [OrderedFloat<f32>; 8] {
    [
        v.position.x,
        v.position.y,
        v.position.z,
        v.normal.x,
        v.normal.y,
        v.normal.z,
        v.uv.x,
        v.uv.y,
    ]
    .map(OrderedFloat)
}

/// Append triangle list indices for a run of `indices`.
///
/// Strips alternate the winding order of every other triangle to keep the same facing.
/// ```text
/// strip: 0 1 2 3 4 -> (0, 1, 2) (2, 1, 3) (2, 3, 4)
/// fan:   0 1 2 3 4 -> (0, 1, 2) (0, 2, 3) (0, 3, 4)
/// ```
pub fn triangle_list_indices(kind: TriangleRunKind, indices: &[u32], triangles: &mut Vec<u32>) {
    for j in 2..indices.len() {
        match kind {
            TriangleRunKind::Strip => {
                if j % 2 == 1 {
                    triangles.extend_from_slice(&[indices[j - 1], indices[j - 2], indices[j]]);
                } else {
                    triangles.extend_from_slice(&[indices[j - 2], indices[j - 1], indices[j]]);
                }
            }
            TriangleRunKind::Fan => {
                triangles.extend_from_slice(&[indices[0], indices[j - 1], indices[j]]);
            }
        }
    }
}

/// Convert `runs` to a triangle list of indices into `vertices`.
///
/// The caller is responsible for checking that every run vertex refers to valid attributes.
pub fn triangle_list<F>(runs: &[TriangleRun], vertices: &mut VertexSet, mut vertex: F) -> Vec<u32>
where
    F: FnMut(&mdl_lib::mdl::TriangleVertex) -> Vertex,
{
    let mut triangles = Vec::new();
    let mut run_indices = Vec::new();
    for run in runs {
        run_indices.clear();
        run_indices.extend(run.vertices.iter().map(|v| vertices.insert(vertex(v))));
        triangle_list_indices(run.kind, &run_indices, &mut triangles);
    }
    triangles
}
