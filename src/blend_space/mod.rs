pub mod triangle;
pub mod triangulation;

use glam::Vec2;
use log::{info, trace};

pub use triangle::{Node, Triangle};

use crate::{
    animation::{playhead::advance_frame_id, pose, BlendSelection, InterframeWeights, Model},
    config::BlendSpaceConfig,
    error::ConfigError,
    render::pose_sink::PoseSink,
};

/// A triangulated 2D control plane mapping query points to a weighted blend of three clips.
pub struct BlendSpace {
    nodes: Vec<Node>,
    triangles: Vec<Triangle>,
    /// Indexed by track id. Every track advances, not just the three being blended.
    frame_ids: Vec<usize>,
    position: Vec2,
    resolved: BlendSelection,
}

impl BlendSpace {
    /// `nodes` must reference tracks below `track_count` and must not be empty.
    pub fn new(nodes: Vec<Node>, track_count: usize) -> Self {
        let triangles = triangulation::triangulate(&nodes);
        let (resolved, position) = match triangles.first() {
            Some(triangle) => (
                BlendSelection {
                    track_ids: triangle.nodes.map(|node| node.track.unwrap_or(0)),
                    weights: [1.0, 0.0, 0.0],
                },
                triangle.nodes[0].position,
            ),
            None => (
                BlendSelection::single(nodes.first().and_then(|n| n.track).unwrap_or(0)),
                nodes.first().map_or(Vec2::ZERO, |n| n.position),
            ),
        };
        Self {
            nodes,
            triangles,
            frame_ids: vec![0; track_count],
            position,
            resolved,
        }
    }

    pub fn from_config(config: &BlendSpaceConfig, track_count: usize) -> Result<Self, ConfigError> {
        if config.node.is_empty() {
            return Err(ConfigError::EmptyBlendSpace);
        }
        let nodes = config
            .node
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                if node.anim_id >= track_count {
                    return Err(ConfigError::UnknownClip {
                        node: idx,
                        anim_id: node.anim_id,
                        track_count,
                    });
                }
                Ok(Node::new(Vec2::new(node.x, node.y), node.anim_id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let blend_space = Self::new(nodes, track_count);
        info!(
            "blend space: {} nodes, {} triangles",
            blend_space.nodes.len(),
            blend_space.triangles.len()
        );
        Ok(blend_space)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn frame_ids(&self) -> &[usize] {
        &self.frame_ids
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn resolved(&self) -> &BlendSelection {
        &self.resolved
    }

    /// Frames per second of the clip carrying the most weight, scaled by the playback speed.
    /// This paces the shared interframe weights.
    pub fn frame_rate(&self, model: &Model) -> f32 {
        model
            .tracks
            .get(self.resolved.dominant_track())
            .map_or(0.0, |track| track.frame_per_second * model.selection.speed)
    }

    /// Commits pending frames on every track, resolves `query` and publishes the blended pose.
    ///
    /// A query outside the triangulated region keeps the previous selection.
    pub fn update(
        &mut self,
        model: &Model,
        query: Vec2,
        interframe: &mut InterframeWeights,
        sink: &mut dyn PoseSink,
    ) {
        let crossed = interframe.commit();
        if crossed > 0 {
            for (frame_id, track) in self.frame_ids.iter_mut().zip(&model.tracks) {
                *frame_id = advance_frame_id(*frame_id, crossed, track.duration);
            }
        }

        self.position = query;
        match triangulation::locate(&self.triangles, query) {
            Some((idx, weights)) => {
                let triangle = &self.triangles[idx];
                self.resolved = BlendSelection {
                    track_ids: triangle.nodes.map(|node| node.track.unwrap_or(0)),
                    weights,
                };
            }
            None => trace!("blend space: {} is outside the hull", query),
        }

        let bones = pose::evaluate(
            &model.skeleton,
            &model.tracks,
            &self.frame_ids,
            &self.resolved,
            *interframe,
        );
        sink.publish(&bones);
    }
}
