pub mod boid;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub use boid::{Boid, FlockParams};

use crate::{
    config::{FlockBackendKind, FlockConfig},
    error::GpuError,
    job_system::WorkerPool,
    render::{flock_compute::FlockCompute, wgpu_context::GpuContext},
};

pub enum FlockBackend {
    Cpu(WorkerPool),
    Gpu(Box<FlockCompute>),
}

/// A population of boids stepped together once per tick.
pub struct Flock {
    boids: Vec<Boid>,
    params: FlockParams,
    backend: FlockBackend,
    tick: u32,
    /// The device copy no longer matches `boids`.
    device_stale: bool,
    rng: StdRng,
}

impl Flock {
    /// Falls back to the worker pool when the config asks for the GPU but no context exists.
    pub fn new(config: &FlockConfig, gpu: Option<Arc<GpuContext>>) -> Self {
        let backend = match (config.backend, gpu) {
            (FlockBackendKind::Gpu, Some(context)) => {
                FlockBackend::Gpu(Box::new(FlockCompute::new(context)))
            }
            (FlockBackendKind::Gpu, None) => {
                warn!("flock: no gpu available, stepping on the cpu instead");
                FlockBackend::Cpu(WorkerPool::new(config.workers))
            }
            (FlockBackendKind::Cpu, _) => FlockBackend::Cpu(WorkerPool::new(config.workers)),
        };
        let mut flock = Self::from_boids(Vec::new(), FlockParams::from(config), backend);
        flock.rng = StdRng::from_os_rng();
        flock.resize(config.population);
        info!(
            "flock: {} boids on {}",
            flock.len(),
            match flock.backend {
                FlockBackend::Cpu(ref pool) => format!("{} cpu workers", pool.workers()),
                FlockBackend::Gpu(_) => "the gpu".to_string(),
            }
        );
        flock
    }

    pub fn from_boids(boids: Vec<Boid>, params: FlockParams, backend: FlockBackend) -> Self {
        Self {
            boids,
            params,
            backend,
            tick: 0,
            device_stale: true,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Truncates, or appends boids at random positions inside the domain.
    pub fn resize(&mut self, population: usize) {
        if population == self.boids.len() {
            return;
        }
        let h = self.params.half_extent;
        while self.boids.len() < population {
            let position = Vec3::new(
                self.rng.random_range(-h..=h),
                self.rng.random_range(-h..=h),
                self.rng.random_range(-h..=h),
            );
            self.boids.push(Boid::new(position));
        }
        self.boids.truncate(population);
        self.device_stale = true;
        debug!("flock: resized to {}", population);
    }

    /// Steps every boid against the flock as it was at the start of the tick.
    pub fn update(&mut self, delta_time: f32) -> Result<(), GpuError> {
        match &mut self.backend {
            FlockBackend::Cpu(pool) => {
                let snapshot = self.boids.clone();
                let params = self.params;
                let tick = self.tick;
                pool.for_each_chunk_mut(&mut self.boids, |first, chunk| {
                    for (offset, boid) in chunk.iter_mut().enumerate() {
                        let index = first + offset;
                        let velocity = snapshot[index].steer(index, &snapshot, &params, tick);
                        boid.integrate(velocity, delta_time);
                    }
                });
            }
            FlockBackend::Gpu(compute) => {
                compute.step(
                    &mut self.boids,
                    &self.params,
                    delta_time,
                    self.tick,
                    self.device_stale,
                )?;
                self.device_stale = false;
            }
        }
        self.tick = self.tick.wrapping_add(1);
        Ok(())
    }

    pub fn affine_transforms(&self) -> Vec<Mat4> {
        self.boids.iter().map(Boid::affine).collect()
    }
}
