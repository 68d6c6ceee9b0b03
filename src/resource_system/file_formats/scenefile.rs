use serde::{Deserialize, Serialize};

/// Scene baked by the external importer: a node tree, skinned meshes and keyed clips, all
/// cross-referenced by node name.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Scene {
    /// `nodes[0]` is the scene root.
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub meshes: Vec<SceneMesh>,
    #[serde(default)]
    pub animations: Vec<SceneAnimation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SceneNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct SceneMesh {
    pub positions: Vec<[f32; 3]>,
    #[serde(default)]
    pub normals: Vec<[f32; 3]>,
    #[serde(default)]
    pub texcoords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub bones: Vec<SceneBone>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SceneBone {
    /// Name of the node this bone animates.
    pub name: String,
    /// row-major, mesh space to bone space
    pub offset_matrix: [[f32; 4]; 4],
    #[serde(default)]
    pub weights: Vec<VertexWeight>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SceneAnimation {
    pub name: String,
    /// In ticks.
    pub duration: f32,
    pub ticks_per_second: f32,
    pub channels: Vec<SceneChannel>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SceneChannel {
    pub node: String,
    /// xyzw
    pub rotations: Vec<[f32; 4]>,
    pub positions: Vec<[f32; 3]>,
    pub scales: Vec<[f32; 3]>,
}
