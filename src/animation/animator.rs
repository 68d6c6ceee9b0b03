use glam::Mat4;

use super::{model::Model, playhead::Playhead, pose};

/// Plays one clip at a time. Every clip keeps its own playhead, so switching back to a clip
/// resumes where it was left.
pub struct Animator {
    playheads: Vec<Playhead>,
}

impl Animator {
    pub fn new(track_count: usize) -> Self {
        Self {
            playheads: vec![Playhead::default(); track_count],
        }
    }

    pub fn playhead(&self, track: usize) -> Option<&Playhead> {
        self.playheads.get(track)
    }

    /// Advances the selected clip and returns the world transform of every bone.
    pub fn update(&mut self, model: &Model, delta_time: f32) -> Vec<Mat4> {
        let track_id = model.selection.play_track;
        let (Some(track), Some(playhead)) =
            (model.tracks.get(track_id), self.playheads.get_mut(track_id))
        else {
            return model.rest_pose();
        };
        let crossed = playhead.advance(delta_time, model.selection.speed, track);
        if crossed > 0 {
            log::trace!("{}: frame {}", track.name, playhead.frame_id);
        }
        pose::evaluate_single(&model.skeleton, track, playhead.frame_id, playhead.weights)
    }
}
