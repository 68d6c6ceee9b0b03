use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::{ArcSwap, Guard};
use glam::{Mat4, Quat, Vec3};

use crate::animation::BlendSelection;

/// Everything a renderer needs to draw one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameSnapshot {
    pub frame_index: u64,
    /// Simulated seconds this frame advanced.
    pub delta_time: f32,
    pub model_transform: Mat4,
    pub bone_transforms: Vec<Mat4>,
    pub highlight_bone: Option<usize>,
    /// Only set while a blend space drives the model.
    pub blend: Option<BlendSelection>,
    pub boid_transforms: Vec<Mat4>,
}

/// The two newest frames, so a renderer running faster than the tick rate can draw between them.
#[derive(Clone, Debug)]
pub struct PublishedFrames {
    pub previous: Arc<FrameSnapshot>,
    pub latest: Arc<FrameSnapshot>,
    pub latest_at: Instant,
}

impl PublishedFrames {
    /// How far `now` is into the tick after `latest`, in `[0, 1]`.
    pub fn alpha(&self, now: Instant) -> f32 {
        if self.latest.delta_time <= 0.0 {
            return 1.0;
        }
        let since = now.saturating_duration_since(self.latest_at);
        (since.as_secs_f32() / self.latest.delta_time).clamp(0.0, 1.0)
    }

    /// Bone transforms between `previous` and `latest`. Falls back to `latest` when the
    /// skeletons differ.
    pub fn interpolated_bones(&self, alpha: f32) -> Vec<Mat4> {
        if self.previous.bone_transforms.len() != self.latest.bone_transforms.len() {
            return self.latest.bone_transforms.clone();
        }
        self.previous
            .bone_transforms
            .iter()
            .zip(&self.latest.bone_transforms)
            .map(|(from, to)| interpolate(from, to, alpha))
            .collect()
    }
}

fn interpolate(from: &Mat4, to: &Mat4, alpha: f32) -> Mat4 {
    let (s0, r0, t0): (Vec3, Quat, Vec3) = from.to_scale_rotation_translation();
    let (s1, r1, t1) = to.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(s0.lerp(s1, alpha), r0.slerp(r1, alpha), t0.lerp(t1, alpha))
}

pub type FramesGuard = Guard<Arc<PublishedFrames>>;

/// Single-writer handoff from the frame loop to readers. Readers always observe a complete
/// frame, and frame indices only move forward.
pub struct FrameHandoff {
    frames: ArcSwap<PublishedFrames>,
}

impl FrameHandoff {
    pub fn new(init: FrameSnapshot) -> Self {
        let init = Arc::new(init);
        Self {
            frames: ArcSwap::from_pointee(PublishedFrames {
                previous: init.clone(),
                latest: init,
                latest_at: Instant::now(),
            }),
        }
    }

    /// Makes `snapshot` the latest frame. A snapshot that is not newer than the latest one is
    /// dropped and `false` returned.
    pub fn publish(&self, snapshot: FrameSnapshot) -> bool {
        let current = self.frames.load();
        if snapshot.frame_index <= current.latest.frame_index {
            log::debug!(
                "dropping frame {}, frame {} is already published",
                snapshot.frame_index,
                current.latest.frame_index
            );
            return false;
        }
        self.frames.store(Arc::new(PublishedFrames {
            previous: current.latest.clone(),
            latest: Arc::new(snapshot),
            latest_at: Instant::now(),
        }));
        true
    }

    pub fn load(&self) -> FramesGuard {
        self.frames.load()
    }

    pub fn latest_index(&self) -> u64 {
        self.frames.load().latest.frame_index
    }

    /// Time since the latest frame was published.
    pub fn age(&self) -> Duration {
        self.frames.load().latest_at.elapsed()
    }
}

impl Default for FrameHandoff {
    fn default() -> Self {
        Self::new(FrameSnapshot::default())
    }
}
