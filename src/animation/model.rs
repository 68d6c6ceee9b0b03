use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::{
    skeleton::{BoneId, Skeleton},
    track::Track,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoords: [f32; 2],
    /// `[first influence, influence count]` into `Mesh::bone_weights`.
    pub bone_weight_range: [u32; 2],
}

/// One skin influence. The bone id is stored as a float so the pair packs straight into an
/// RGBA32F texel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BoneWeight {
    pub bone: f32,
    pub weight: f32,
}

impl BoneWeight {
    pub fn new(bone: BoneId, weight: f32) -> Self {
        Self {
            bone: bone as f32,
            weight,
        }
    }

    pub fn bone_id(&self) -> BoneId {
        self.bone as BoneId
    }
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bone_weights: Vec<BoneWeight>,
}

impl Mesh {
    /// Appends `other`, rebasing its indices and influence ranges.
    pub fn append(&mut self, mut other: Mesh) {
        let index_base = self.vertices.len() as u32;
        let weight_base = self.bone_weights.len() as u32;
        for vertex in &mut other.vertices {
            vertex.bone_weight_range[0] += weight_base;
        }
        self.vertices.append(&mut other.vertices);
        self.indices
            .extend(other.indices.iter().map(|index| index + index_base));
        self.bone_weights.append(&mut other.bone_weights);
    }

    pub fn influences(&self, vertex: usize) -> &[BoneWeight] {
        let [first, count] = self.vertices[vertex].bone_weight_range;
        &self.bone_weights[first as usize..(first + count) as usize]
    }
}

/// Playback state owned by the controlling application.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationSelection {
    pub speed: f32,
    pub play_track: usize,
    /// Vertices driven by this bone get tinted by the vertex stage.
    pub highlight_bone: Option<BoneId>,
}

impl Default for AnimationSelection {
    fn default() -> Self {
        Self {
            speed: 1.0,
            play_track: 0,
            highlight_bone: None,
        }
    }
}

pub struct Model {
    pub skeleton: Skeleton,
    pub tracks: Vec<Track>,
    pub mesh: Mesh,
    pub selection: AnimationSelection,
    pub scale: f32,
}

impl Model {
    pub fn instance_transform(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(self.scale))
    }

    pub fn track_id(&self, name: &str) -> Option<usize> {
        self.tracks.iter().position(|track| track.name == name)
    }

    /// World transforms that undo the bind pose, so skinning leaves the mesh where it was
    /// modelled.
    pub fn rest_pose(&self) -> Vec<Mat4> {
        self.skeleton
            .bones()
            .iter()
            .map(|bone| bone.bind_pose_offset().inverse())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(bone: BoneId) -> Mesh {
        Mesh {
            vertices: (0..3)
                .map(|i| Vertex {
                    position: [i as f32, 0.0, 0.0],
                    bone_weight_range: [i, 1],
                    ..Default::default()
                })
                .collect(),
            indices: vec![0, 1, 2],
            bone_weights: vec![BoneWeight::new(bone, 1.0); 3],
        }
    }

    #[test]
    fn append_rebases_indices_and_influences() {
        let mut mesh = triangle(0);
        mesh.append(triangle(4));
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.vertices[4].bone_weight_range, [4, 1]);
        assert_eq!(mesh.influences(5)[0].bone_id(), 4);
        assert_eq!(mesh.influences(1)[0].bone_id(), 0);
    }
}
