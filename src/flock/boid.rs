use glam::{Mat4, Quat, Vec3};

use crate::config::FlockConfig;

/// Steering constants for one flock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlockParams {
    pub min_distance: f32,
    pub visual_range: f32,
    pub avoid_factor: f32,
    pub center_factor: f32,
    pub align_factor: f32,
    pub wander_factor: f32,
    pub turn_factor: f32,
    pub half_extent: f32,
}

impl From<&FlockConfig> for FlockParams {
    fn from(config: &FlockConfig) -> Self {
        Self {
            min_distance: config.min_distance,
            visual_range: config.visual_range,
            avoid_factor: config.avoid_factor,
            center_factor: config.center_factor,
            align_factor: config.align_factor,
            wander_factor: config.wander_factor,
            turn_factor: config.turn_factor,
            half_extent: config.domain_half_extent,
        }
    }
}

impl Default for FlockParams {
    fn default() -> Self {
        Self::from(&FlockConfig::default())
    }
}

/// PCG output permutation. Mirrored in `boids.wgsl`; keep both in sync.
pub fn pcg_hash(x: u32) -> u32 {
    let state = x.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn unit_float(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0
}

/// Point each boid drifts toward this tick, uniform in `[-half_extent, half_extent]^3`.
pub fn wander_point(tick: u32, index: u32, half_extent: f32) -> Vec3 {
    let seed = pcg_hash(tick ^ pcg_hash(index));
    let unit = Vec3::new(
        unit_float(pcg_hash(seed)),
        unit_float(pcg_hash(seed.wrapping_add(1))),
        unit_float(pcg_hash(seed.wrapping_add(2))),
    );
    (unit * 2.0 - 1.0) * half_extent
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Boid {
    pub position: Vec3,
    /// Accumulated heading change since spawn.
    pub rotation: Quat,
    /// Unit length once the boid has been stepped.
    pub velocity: Vec3,
}

impl Boid {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::Z,
        }
    }

    pub fn affine(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_quat(self.rotation)
    }

    /// New unit velocity for the boid at `index` given the whole flock as of the last tick.
    pub fn steer(&self, index: usize, flock: &[Boid], params: &FlockParams, tick: u32) -> Vec3 {
        let mut separation = Vec3::ZERO;
        let mut center = Vec3::ZERO;
        let mut heading = Vec3::ZERO;
        let mut neighbours = 0u32;
        for (other_index, other) in flock.iter().enumerate() {
            if other_index == index {
                continue;
            }
            let distance = self.position.distance(other.position);
            if distance < params.min_distance {
                separation += self.position - other.position;
            }
            if distance < params.visual_range {
                center += other.position;
                heading += other.velocity;
                neighbours += 1;
            }
        }

        let mut velocity = self.velocity;
        if neighbours > 0 {
            let n = neighbours as f32;
            velocity += params.center_factor * (center / n - self.position);
            velocity += params.align_factor * (heading / n - self.velocity);
        }
        velocity += params.avoid_factor * separation;

        let wander = wander_point(tick, index as u32, params.half_extent);
        velocity += Vec3::select(
            self.position.cmplt(wander),
            Vec3::splat(params.wander_factor),
            Vec3::splat(-params.wander_factor),
        );

        let h = Vec3::splat(params.half_extent);
        velocity += Vec3::select(self.position.cmpgt(h), Vec3::splat(-params.turn_factor), Vec3::ZERO);
        velocity += Vec3::select(self.position.cmplt(-h), Vec3::splat(params.turn_factor), Vec3::ZERO);

        velocity.try_normalize().unwrap_or(self.velocity)
    }

    /// Turns the orientation by the arc from the old to the new heading, then moves.
    pub fn integrate(&mut self, velocity: Vec3, delta_time: f32) {
        let from = self.velocity.normalize_or(Vec3::Z);
        let to = velocity.normalize_or(from);
        self.rotation = (Quat::from_rotation_arc(from, to) * self.rotation).normalize();
        self.velocity = velocity;
        self.position += velocity * delta_time;
    }
}
