use super::track::Track;

/// Lerp factors for the two keys around the current frame.
///
/// `left` and `right` are applied independently, callers keep `left == 1 - right`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterframeWeights {
    pub left: f32,
    pub right: f32,
}

impl InterframeWeights {
    pub const START: Self = Self {
        left: 1.0,
        right: 0.0,
    };

    pub fn new(right: f32) -> Self {
        Self {
            left: 1.0 - right,
            right,
        }
    }

    /// `frame_rate` is `speed * frame_per_second`, i.e. the reciprocal of one frame's duration.
    pub fn accumulate(&mut self, delta_time: f32, frame_rate: f32) {
        if delta_time <= 0.0 || frame_rate <= 0.0 || !frame_rate.is_finite() {
            return;
        }
        self.right += delta_time * frame_rate;
        self.left = 1.0 - self.right;
    }

    pub fn is_due(&self) -> bool {
        self.right >= 1.0
    }

    /// Consumes every whole frame boundary crossed so far and returns how many there were.
    /// The fractional remainder stays in `right`.
    pub fn commit(&mut self) -> usize {
        if !self.is_due() {
            return 0;
        }
        let crossed = self.right.floor();
        self.right -= crossed;
        self.left = 1.0 - self.right;
        crossed as usize
    }
}

impl Default for InterframeWeights {
    fn default() -> Self {
        Self::START
    }
}

/// Advances `frame_id` by `steps`, wrapping to 0 once it reaches `duration - 1`
/// so that `frame_id + 1` is always a valid key.
pub fn advance_frame_id(frame_id: usize, steps: usize, duration: usize) -> usize {
    let cycle = duration.saturating_sub(1);
    if cycle == 0 {
        return 0;
    }
    (frame_id % cycle + steps % cycle) % cycle
}

/// Per-track playback state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Playhead {
    pub frame_id: usize,
    pub weights: InterframeWeights,
}

impl Playhead {
    /// Returns the number of frames committed this tick.
    pub fn advance(&mut self, delta_time: f32, speed: f32, track: &Track) -> usize {
        self.weights
            .accumulate(delta_time, speed * track.frame_per_second);
        let crossed = self.weights.commit();
        if crossed > 0 {
            self.frame_id = advance_frame_id(self.frame_id, crossed, track.duration);
        }
        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::track::Channel;

    fn track(duration: usize, fps: f32) -> Track {
        Track {
            name: "clip".into(),
            duration,
            frame_per_second: fps,
            channels: vec![Channel::rest(duration)],
        }
    }

    #[test]
    fn zero_delta_never_commits() {
        let track = track(10, 30.0);
        let mut playhead = Playhead {
            frame_id: 3,
            weights: InterframeWeights::new(0.75),
        };
        for _ in 0..100 {
            assert_eq!(playhead.advance(0.0, 1.0, &track), 0);
        }
        assert_eq!(playhead.frame_id, 3);
        assert_eq!(playhead.weights, InterframeWeights::new(0.75));
    }

    #[test]
    fn frame_id_wraps_before_last_key() {
        assert_eq!(advance_frame_id(7, 1, 10), 8);
        assert_eq!(advance_frame_id(8, 1, 10), 0);
        assert_eq!(advance_frame_id(8, 3, 10), 2);
        assert_eq!(advance_frame_id(0, 5, 2), 0);
        assert_eq!(advance_frame_id(4, 1, 0), 0);
    }

    #[test]
    fn commits_once_per_frame_boundary() {
        let track = track(10, 30.0);
        let mut playhead = Playhead::default();
        let dt = 0.0013_f32;
        let mut commits = 0;
        // 257 ticks covers just over 10 frames at 30 fps
        for tick in 1..=257 {
            commits += playhead.advance(dt, 1.0, &track);
            let expected = (tick as f64 * dt as f64 * 30.0).floor() as usize;
            assert_eq!(commits, expected, "tick {}", tick);
        }
        assert_eq!(commits, 10);
        assert_eq!(playhead.frame_id, 10 % 9);
        assert!(playhead.weights.right < 1.0);
        assert!((playhead.weights.left + playhead.weights.right - 1.0).abs() < 1e-6);
    }

    #[test]
    fn speed_scales_frame_rate() {
        let track = track(10, 30.0);
        let mut playhead = Playhead::default();
        assert_eq!(playhead.advance(1.0 / 30.0 + 1e-4, 2.0, &track), 2);
        assert_eq!(playhead.frame_id, 2);
        let mut paused = Playhead::default();
        assert_eq!(paused.advance(1.0, 0.0, &track), 0);
    }
}
