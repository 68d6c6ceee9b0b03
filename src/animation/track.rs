use glam::{Quat, Vec3};

use super::playhead::InterframeWeights;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trs {
    pub t: Vec3,
    pub r: Quat,
    pub s: Vec3,
}

impl Trs {
    pub const IDENTITY: Self = Self {
        t: Vec3::ZERO,
        r: Quat::IDENTITY,
        s: Vec3::ONE,
    };
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Keyed samples for one bone, indexed by frame id.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    pub rotations: Vec<Quat>,
    pub positions: Vec<Vec3>,
    pub scales: Vec<Vec3>,
}

impl Channel {
    /// Rest pose held for `frames` keys.
    pub fn rest(frames: usize) -> Self {
        Self {
            rotations: vec![Quat::IDENTITY; frames],
            positions: vec![Vec3::ZERO; frames],
            scales: vec![Vec3::ONE; frames],
        }
    }

    pub fn len(&self) -> usize {
        self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotations.is_empty()
    }

    /// Repeats the last key until the channel holds `frames` keys.
    pub fn pad_to(&mut self, frames: usize) {
        if let (Some(&r), Some(&p), Some(&s)) = (
            self.rotations.last(),
            self.positions.last(),
            self.scales.last(),
        ) {
            self.rotations.resize(frames, r);
            self.positions.resize(frames, p);
            self.scales.resize(frames, s);
        }
    }

    /// Interpolates between `frame_id` and `frame_id + 1`.
    ///
    /// Translation and scale use both weights as independent lerp factors, rotation slerps by
    /// the right weight alone.
    pub fn sample(&self, frame_id: usize, weights: InterframeWeights) -> Trs {
        debug_assert!(
            frame_id + 1 < self.len(),
            "frame {} + 1 out of range for a channel with {} keys",
            frame_id,
            self.len()
        );
        let (l, r) = (frame_id, frame_id + 1);
        Trs {
            t: weights.left * self.positions[l] + weights.right * self.positions[r],
            r: self.rotations[l].slerp(self.rotations[r], weights.right),
            s: weights.left * self.scales[l] + weights.right * self.scales[r],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Track {
    pub name: String,
    /// Number of keyed frames.
    pub duration: usize,
    pub frame_per_second: f32,
    /// One per bone, in skeleton order.
    pub channels: Vec<Channel>,
}

impl Track {
    /// Importers name clips `Armature|Walk`; only the part after the last `|` is kept.
    pub fn display_name(raw: &str) -> &str {
        raw.rsplit('|').next().unwrap_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_key_channel() -> Channel {
        Channel {
            rotations: vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)],
            positions: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
            scales: vec![Vec3::ONE, Vec3::splat(3.0)],
        }
    }

    #[test]
    fn sample_interpolates_between_keys() {
        let channel = two_key_channel();
        let sample = channel.sample(0, InterframeWeights::new(0.5));
        assert!(sample.t.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        assert!(sample.s.abs_diff_eq(Vec3::splat(2.0), 1e-6));
        assert!(sample.r.abs_diff_eq(Quat::from_rotation_y(0.5), 1e-5));
    }

    #[test]
    fn pad_repeats_last_key() {
        let mut channel = two_key_channel();
        channel.pad_to(4);
        assert_eq!(channel.len(), 4);
        assert_eq!(channel.positions[3], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(channel.scales.len(), 4);
    }

    #[test]
    fn display_name_strips_armature_prefix() {
        assert_eq!(Track::display_name("Armature|Walk"), "Walk");
        assert_eq!(Track::display_name("a|b|Run"), "Run");
        assert_eq!(Track::display_name("Idle"), "Idle");
    }
}
