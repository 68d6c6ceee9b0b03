use glam::{Mat4, Quat, Vec3};

use super::{
    playhead::InterframeWeights,
    skeleton::Skeleton,
    track::{Trs, Track},
};

/// Three tracks and their blend weights, as resolved from a blend space lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendSelection {
    pub track_ids: [usize; 3],
    /// Expected to sum to at most 1.
    pub weights: [f32; 3],
}

impl BlendSelection {
    /// Plays `track_id` alone.
    pub fn single(track_id: usize) -> Self {
        Self {
            track_ids: [track_id; 3],
            weights: [1.0, 0.0, 0.0],
        }
    }

    /// The track carrying the largest weight.
    pub fn dominant_track(&self) -> usize {
        let mut best = 0;
        for j in 1..3 {
            if self.weights[j] > self.weights[best] {
                best = j;
            }
        }
        self.track_ids[best]
    }
}

/// Blends three rotations with two nested slerps.
///
/// This approximates a 3-way spherical average and is order dependent. When the first two
/// weights are both zero the intermediate rotation falls back to the identity.
pub fn blend_rotations(rotations: [Quat; 3], weights: [f32; 3]) -> Quat {
    let first_two = weights[0] + weights[1];
    let intermediate = if first_two > 0.0 {
        rotations[0].slerp(rotations[1], weights[1] / first_two)
    } else {
        Quat::IDENTITY
    };
    let total = first_two + weights[2];
    if total > 0.0 {
        intermediate.slerp(rotations[2], weights[2] / total)
    } else {
        intermediate
    }
}

/// Local (parent-relative) pose of every bone for the given selection.
pub fn blend_local_pose(
    skeleton: &Skeleton,
    tracks: &[Track],
    frame_ids: &[usize],
    selection: &BlendSelection,
    interframe: InterframeWeights,
) -> Vec<Trs> {
    (0..skeleton.len())
        .map(|bone| {
            let mut t = Vec3::ZERO;
            let mut s = Vec3::ZERO;
            let mut rotations = [Quat::IDENTITY; 3];
            for j in 0..3 {
                let track_id = selection.track_ids[j];
                let sample = tracks[track_id].channels[bone].sample(frame_ids[track_id], interframe);
                t += selection.weights[j] * sample.t;
                s += selection.weights[j] * sample.s;
                rotations[j] = sample.r;
            }
            Trs {
                t,
                r: blend_rotations(rotations, selection.weights),
                s,
            }
        })
        .collect()
}

pub fn sample_local_pose(
    skeleton: &Skeleton,
    track: &Track,
    frame_id: usize,
    interframe: InterframeWeights,
) -> Vec<Trs> {
    track.channels[..skeleton.len()]
        .iter()
        .map(|channel| channel.sample(frame_id, interframe))
        .collect()
}

/// Accumulates the local transforms from `bone` up to the root.
///
/// Each level maps the accumulated translation through the parent's scale, rotation and
/// translation, multiplies scales and pre-multiplies rotations. The result is
/// `translate * scale * rotate`.
pub fn world_transform(skeleton: &Skeleton, locals: &[Trs], bone: usize) -> Mat4 {
    let mut world = Trs::IDENTITY;
    for id in skeleton.ancestry(bone) {
        let local = &locals[id];
        world = Trs {
            t: local.t + local.r * (local.s * world.t),
            r: local.r * world.r,
            s: local.s * world.s,
        };
    }
    Mat4::from_translation(world.t) * Mat4::from_scale(world.s) * Mat4::from_quat(world.r)
}

pub fn compose_world(skeleton: &Skeleton, locals: &[Trs]) -> Vec<Mat4> {
    (0..skeleton.len())
        .map(|bone| world_transform(skeleton, locals, bone))
        .collect()
}

/// Evaluates the world transform of every bone for a three-way blend.
///
/// `frame_ids` is indexed by track id; each selected track must have a key at
/// `frame_ids[track] + 1`.
pub fn evaluate(
    skeleton: &Skeleton,
    tracks: &[Track],
    frame_ids: &[usize],
    selection: &BlendSelection,
    interframe: InterframeWeights,
) -> Vec<Mat4> {
    let locals = blend_local_pose(skeleton, tracks, frame_ids, selection, interframe);
    compose_world(skeleton, &locals)
}

/// Unblended evaluation of a single track.
pub fn evaluate_single(
    skeleton: &Skeleton,
    track: &Track,
    frame_id: usize,
    interframe: InterframeWeights,
) -> Vec<Mat4> {
    let locals = sample_local_pose(skeleton, track, frame_id, interframe);
    compose_world(skeleton, &locals)
}
