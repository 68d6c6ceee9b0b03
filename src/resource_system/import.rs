use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Quat, Vec3};
use log::{debug, error, warn};

use crate::{
    animation::{
        skeleton::BindPoseAssignment, AnimationSelection, Bone, BoneId, BoneWeight, Channel, Mesh,
        Model, Skeleton, Track, Vertex,
    },
    config::ModelConfig,
    error::ImportError,
};

use super::file_formats::scenefile::{Scene, SceneAnimation, SceneMesh};

const WEIGHT_SUM_TOLERANCE: f32 = 1e-3;
const FALLBACK_FRAME_RATE: f32 = 30.0;

/// Builds the skeleton, clips and merged mesh described by `config` from a decoded scene.
///
/// Unknown names and broken hierarchies are fatal. Fixable data problems are logged and
/// patched.
pub fn build_model(scene: &Scene, config: &ModelConfig) -> Result<Model, ImportError> {
    build(scene, config).inspect_err(|err| error!("import failed: {}", err))
}

fn build(scene: &Scene, config: &ModelConfig) -> Result<Model, ImportError> {
    let mut skeleton = if config.import_animation {
        build_skeleton(scene, &config.skeleton_root)?
    } else {
        Skeleton::default()
    };

    let mut mesh = Mesh::default();
    for (idx, scene_mesh) in scene.meshes.iter().enumerate() {
        mesh.append(build_mesh(idx, scene_mesh, &mut skeleton, config.import_animation)?);
    }

    let tracks = if config.import_animation {
        scene
            .animations
            .iter()
            .map(|animation| build_track(animation, &skeleton))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };

    debug!(
        "imported {} bones, {} clips, {} vertices",
        skeleton.len(),
        tracks.len(),
        mesh.vertices.len()
    );
    Ok(Model {
        skeleton,
        tracks,
        mesh,
        selection: AnimationSelection {
            speed: config.speed,
            play_track: config.play_anim_track,
            highlight_bone: None,
        },
        scale: config.scale,
    })
}

/// Breadth-first from `root_name`, so bone ids follow BFS order and parents precede children.
pub fn build_skeleton(scene: &Scene, root_name: &str) -> Result<Skeleton, ImportError> {
    let mut by_name = HashMap::with_capacity(scene.nodes.len());
    for (idx, node) in scene.nodes.iter().enumerate() {
        if by_name.insert(node.name.as_str(), idx).is_some() {
            return Err(ImportError::DuplicateNode(node.name.clone()));
        }
    }
    let root = *by_name
        .get(root_name)
        .ok_or_else(|| ImportError::MissingSkeletonRoot(root_name.to_string()))?;

    let mut bones = vec![Bone::new(root_name.to_string(), None, Vec::new())];
    let mut ids: HashMap<&str, BoneId> = HashMap::from([(root_name, 0)]);
    let mut queue = VecDeque::from([(root, 0)]);
    while let Some((node_idx, bone_id)) = queue.pop_front() {
        let node = &scene.nodes[node_idx];
        for child in &node.children {
            let child_idx =
                *by_name
                    .get(child.as_str())
                    .ok_or_else(|| ImportError::UnknownBone {
                        bone: child.clone(),
                        referenced_by: format!("node '{}'", node.name),
                    })?;
            if ids.contains_key(child.as_str()) {
                return Err(ImportError::CyclicHierarchy(child.clone()));
            }
            let child_id = bones.len();
            ids.insert(child.as_str(), child_id);
            bones.push(Bone::new(child.clone(), Some(bone_id), Vec::new()));
            bones[bone_id].children.push(child_id);
            queue.push_back((child_idx, child_id));
        }
    }
    Ok(Skeleton::from_bones(bones))
}

fn build_mesh(
    mesh_idx: usize,
    scene_mesh: &SceneMesh,
    skeleton: &mut Skeleton,
    skinned: bool,
) -> Result<Mesh, ImportError> {
    let vertex_count = scene_mesh.positions.len();
    let out_of_range = |vertex: u32| ImportError::VertexOutOfRange {
        mesh: mesh_idx,
        vertex,
        vertex_count,
    };
    if let Some(&bad) = scene_mesh
        .indices
        .iter()
        .find(|&&index| index as usize >= vertex_count)
    {
        return Err(out_of_range(bad));
    }

    let mut influences: Vec<Vec<BoneWeight>> = vec![Vec::new(); vertex_count];
    if skinned {
        for bone in &scene_mesh.bones {
            let bone_id = skeleton
                .bone_id(&bone.name)
                .ok_or_else(|| ImportError::UnknownBone {
                    bone: bone.name.clone(),
                    referenced_by: format!("mesh {}", mesh_idx),
                })?;
            let offset = Mat4::from_cols_array_2d(&bone.offset_matrix).transpose();
            if skeleton.set_bind_pose(bone_id, offset) == BindPoseAssignment::Conflict {
                warn!(
                    "mesh {}: conflicting bind pose for '{}', keeping the first",
                    mesh_idx, bone.name
                );
            }
            for weight in &bone.weights {
                let slot = influences
                    .get_mut(weight.vertex as usize)
                    .ok_or_else(|| out_of_range(weight.vertex))?;
                slot.push(BoneWeight::new(bone_id, weight.weight));
            }
        }
    }

    let mut unweighted = 0;
    let mut renormalised = 0;
    let mut mesh = Mesh {
        vertices: Vec::with_capacity(vertex_count),
        indices: scene_mesh.indices.clone(),
        bone_weights: Vec::new(),
    };
    for (idx, mut weights) in influences.into_iter().enumerate() {
        if skinned && !skeleton.is_empty() {
            if weights.is_empty() {
                unweighted += 1;
                weights.push(BoneWeight::new(0, 1.0));
            }
            let sum: f32 = weights.iter().map(|w| w.weight).sum();
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                renormalised += 1;
                if sum > 0.0 {
                    weights.iter_mut().for_each(|w| w.weight /= sum);
                } else {
                    let even = 1.0 / weights.len() as f32;
                    weights.iter_mut().for_each(|w| w.weight = even);
                }
            }
        }
        let first = mesh.bone_weights.len() as u32;
        mesh.vertices.push(Vertex {
            position: scene_mesh.positions[idx],
            normal: scene_mesh.normals.get(idx).copied().unwrap_or_default(),
            texcoords: scene_mesh.texcoords.get(idx).copied().unwrap_or_default(),
            bone_weight_range: [first, weights.len() as u32],
        });
        mesh.bone_weights.extend(weights);
    }
    if unweighted > 0 {
        warn!(
            "mesh {}: {} vertices had no bone weights, bound to the root",
            mesh_idx, unweighted
        );
    }
    if renormalised > 0 {
        warn!(
            "mesh {}: renormalised bone weights of {} vertices",
            mesh_idx, renormalised
        );
    }
    Ok(mesh)
}

fn build_track(animation: &SceneAnimation, skeleton: &Skeleton) -> Result<Track, ImportError> {
    let name = Track::display_name(&animation.name).to_string();
    let mut channels: Vec<Option<Channel>> = vec![None; skeleton.len()];
    for scene_channel in &animation.channels {
        let bone_id =
            skeleton
                .bone_id(&scene_channel.node)
                .ok_or_else(|| ImportError::UnknownBone {
                    bone: scene_channel.node.clone(),
                    referenced_by: format!("clip '{}'", name),
                })?;
        let (rotations, positions, scales) = (
            scene_channel.rotations.len(),
            scene_channel.positions.len(),
            scene_channel.scales.len(),
        );
        if rotations != positions || rotations != scales {
            return Err(ImportError::ChannelKeyMismatch {
                clip: name,
                bone: scene_channel.node.clone(),
                rotations,
                positions,
                scales,
            });
        }
        if rotations == 0 {
            return Err(ImportError::EmptyChannel {
                clip: name,
                bone: scene_channel.node.clone(),
            });
        }
        let channel = Channel {
            rotations: scene_channel
                .rotations
                .iter()
                .map(|q| Quat::from_array(*q).normalize())
                .collect(),
            positions: scene_channel.positions.iter().map(|p| Vec3::from_array(*p)).collect(),
            scales: scene_channel.scales.iter().map(|s| Vec3::from_array(*s)).collect(),
        };
        if channels[bone_id].replace(channel).is_some() {
            warn!(
                "clip '{}': bone '{}' keyed twice, keeping the last",
                name, scene_channel.node
            );
        }
    }

    let frames = channels
        .iter()
        .flatten()
        .map(Channel::len)
        .max()
        .unwrap_or(0)
        .max(2);
    let mut rest = 0;
    let mut padded = 0;
    let channels = channels
        .into_iter()
        .map(|channel| match channel {
            Some(mut channel) => {
                if channel.len() < frames {
                    padded += 1;
                    channel.pad_to(frames);
                }
                channel
            }
            None => {
                rest += 1;
                Channel::rest(frames)
            }
        })
        .collect();
    if rest > 0 {
        warn!("clip '{}': {} bones have no keys, holding rest pose", name, rest);
    }
    if padded > 0 {
        warn!(
            "clip '{}': padded {} short channels to {} frames",
            name, padded, frames
        );
    }

    let frame_per_second = if animation.ticks_per_second > 0.0 {
        animation.ticks_per_second
    } else {
        warn!(
            "clip '{}': no sample rate, assuming {} fps",
            name, FALLBACK_FRAME_RATE
        );
        FALLBACK_FRAME_RATE
    };
    debug!(
        "clip '{}': {} frames at {} fps ({} ticks declared)",
        name, frames, frame_per_second, animation.duration
    );
    Ok(Track {
        name,
        duration: frames,
        frame_per_second,
        channels,
    })
}
