use std::sync::Arc;

use glam::{Quat, Vec3};
use wgpu::util::DeviceExt as _;

use crate::{
    error::GpuError,
    flock::{Boid, FlockParams},
};

use super::wgpu_context::GpuContext;

const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuBoid {
    pub position: [f32; 4],
    pub rotation: [f32; 4],
    pub velocity: [f32; 4],
}

impl From<&Boid> for GpuBoid {
    fn from(boid: &Boid) -> Self {
        Self {
            position: boid.position.extend(1.0).to_array(),
            rotation: boid.rotation.to_array(),
            velocity: boid.velocity.extend(0.0).to_array(),
        }
    }
}

impl From<&GpuBoid> for Boid {
    fn from(boid: &GpuBoid) -> Self {
        Self {
            position: Vec3::from_slice(&boid.position[..3]),
            rotation: Quat::from_array(boid.rotation),
            velocity: Vec3::from_slice(&boid.velocity[..3]),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FlockUniform {
    pub min_distance: f32,
    pub visual_range: f32,
    pub avoid_factor: f32,
    pub center_factor: f32,
    pub align_factor: f32,
    pub wander_factor: f32,
    pub turn_factor: f32,
    pub half_extent: f32,
    pub delta_time: f32,
    pub boid_count: u32,
    pub tick: u32,
    _pad: u32,
}

impl FlockUniform {
    pub fn new(params: &FlockParams, delta_time: f32, boid_count: u32, tick: u32) -> Self {
        Self {
            min_distance: params.min_distance,
            visual_range: params.visual_range,
            avoid_factor: params.avoid_factor,
            center_factor: params.center_factor,
            align_factor: params.align_factor,
            wander_factor: params.wander_factor,
            turn_factor: params.turn_factor,
            half_extent: params.half_extent,
            delta_time,
            boid_count,
            tick,
            _pad: 0,
        }
    }
}

struct BoidBuffers {
    capacity: usize,
    storage: [wgpu::Buffer; 2],
    /// `bind_groups[i]` reads `storage[i]` and writes the other one.
    bind_groups: [wgpu::BindGroup; 2],
    readback: wgpu::Buffer,
}

/// Steps the flock in a compute shader, ping-ponging between two storage buffers and reading
/// the result back before returning.
pub struct FlockCompute {
    context: Arc<GpuContext>,
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    buffers: Option<BoidBuffers>,
    /// Storage buffer holding the latest boids.
    front: usize,
}

impl FlockCompute {
    pub fn desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("Flock Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        }
    }

    pub fn new(context: Arc<GpuContext>) -> Self {
        let device = &context.device;
        let layout = device.create_bind_group_layout(&Self::desc());
        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/boids.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flock Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Flock Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: Default::default(),
            cache: None,
        });
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Flock Uniform"),
            contents: bytemuck::bytes_of(&FlockUniform::new(&FlockParams::default(), 0.0, 0, 0)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            context,
            pipeline,
            layout,
            uniform,
            buffers: None,
            front: 0,
        }
    }

    fn allocate(&self, capacity: usize) -> BoidBuffers {
        let device = &self.context.device;
        let size = (capacity * std::mem::size_of::<GpuBoid>()) as wgpu::BufferAddress;
        let storage = [0, 1].map(|idx| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if idx == 0 { "Boids SSBO 0" } else { "Boids SSBO 1" }),
                size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });
        let bind_groups = [0, 1].map(|src| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Flock Bind Group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: storage[src].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: storage[1 - src].as_entire_binding(),
                    },
                ],
            })
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Boids Readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        log::debug!("flock compute: allocated room for {} boids", capacity);
        BoidBuffers {
            capacity,
            storage,
            bind_groups,
            readback,
        }
    }

    /// Runs one tick. `upload` must be set whenever `boids` changed on the CPU since the last
    /// call; growing past the allocated capacity uploads regardless.
    pub fn step(
        &mut self,
        boids: &mut [Boid],
        params: &FlockParams,
        delta_time: f32,
        tick: u32,
        upload: bool,
    ) -> Result<(), GpuError> {
        if boids.is_empty() {
            return Ok(());
        }
        let count = boids.len();
        let mut upload = upload;
        if self.buffers.as_ref().map_or(true, |b| b.capacity < count) {
            self.buffers = Some(self.allocate(count.next_power_of_two()));
            self.front = 0;
            upload = true;
        }
        let Some(buffers) = self.buffers.as_ref() else {
            return Ok(());
        };
        let queue = &self.context.queue;
        if upload {
            let data: Vec<GpuBoid> = boids.iter().map(GpuBoid::from).collect();
            queue.write_buffer(&buffers.storage[self.front], 0, bytemuck::cast_slice(&data));
        }
        let uniform = FlockUniform::new(params, delta_time, count as u32, tick);
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&uniform));

        let back = 1 - self.front;
        let size = (count * std::mem::size_of::<GpuBoid>()) as wgpu::BufferAddress;
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flock Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Flock Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_groups[self.front], &[]);
            pass.dispatch_workgroups((count as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&buffers.storage[back], 0, &buffers.readback, 0, size);
        queue.submit(Some(encoder.finish()));

        self.context.read_buffer(&buffers.readback, size, |bytes| {
            let stepped: &[GpuBoid] = bytemuck::cast_slice(bytes);
            for (boid, gpu) in boids.iter_mut().zip(stepped) {
                *boid = Boid::from(gpu);
            }
        })?;
        self.front = back;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_layouts_match_shader_structs() {
        assert_eq!(std::mem::size_of::<GpuBoid>(), 48);
        assert_eq!(std::mem::size_of::<FlockUniform>(), 48);
    }

    #[test]
    fn boid_survives_gpu_layout() {
        let boid = Boid {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            velocity: Vec3::X,
        };
        assert_eq!(Boid::from(&GpuBoid::from(&boid)), boid);
    }
}
