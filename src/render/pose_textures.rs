use std::sync::Arc;

use glam::Mat4;
use wgpu::util::DeviceExt as _;

use crate::{
    animation::{BoneWeight, Model},
    error::GpuError,
};

use super::{pose_sink::PoseSink, wgpu_context::GpuContext};

/// Texels per row of every lookup texture.
pub const TEXTURE_WIDTH: u32 = 1024;
const TEXEL_SIZE: u32 = 16;
const NO_HIGHLIGHT: i32 = -1;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkinUniform {
    pub bone_count: u32,
    /// -1 when nothing is highlighted.
    pub highlight_bone: i32,
    _pad: [u32; 2],
}

/// Rows needed to hold `texels` at `TEXTURE_WIDTH` per row.
pub fn rows_for(texels: usize) -> u32 {
    (texels as u32).div_ceil(TEXTURE_WIDTH).max(1)
}

fn matrix_texels(matrices: &[Mat4]) -> Vec<[f32; 4]> {
    matrices
        .iter()
        .flat_map(|m| [m.x_axis, m.y_axis, m.z_axis, m.w_axis].map(|column| column.to_array()))
        .collect()
}

/// Two `(bone, weight)` pairs per texel.
fn skin_texels(weights: &[BoneWeight]) -> Vec<[f32; 4]> {
    weights
        .chunks(2)
        .map(|pair| match pair {
            [a, b] => [a.bone, a.weight, b.bone, b.weight],
            [a] => [a.bone, a.weight, 0.0, 0.0],
            _ => [0.0; 4],
        })
        .collect()
}

struct LookupTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    rows: u32,
}

impl LookupTexture {
    fn new(device: &wgpu::Device, label: &str, texels: usize) -> Self {
        let rows = rows_for(texels);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: TEXTURE_WIDTH,
                height: rows,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            rows,
        }
    }

    fn write(&self, queue: &wgpu::Queue, texels: &[[f32; 4]]) {
        let mut padded = texels.to_vec();
        padded.resize((TEXTURE_WIDTH * self.rows) as usize, [0.0; 4]);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&padded),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(TEXTURE_WIDTH * TEXEL_SIZE),
                rows_per_image: Some(self.rows),
            },
            wgpu::Extent3d {
                width: TEXTURE_WIDTH,
                height: self.rows,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Publishes poses into float textures the skinning vertex stage samples.
///
/// Bindings: 0 skin weights, 1 bind pose, 2 pose, 3 [`SkinUniform`]. The queue orders every
/// write before any draw submitted after `publish` returns.
pub struct GpuPoseSink {
    context: Arc<GpuContext>,
    skin_weights: LookupTexture,
    bind_pose: LookupTexture,
    pose: LookupTexture,
    uniform: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    bone_count: usize,
}

impl GpuPoseSink {
    pub fn desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("Skinning Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        }
    }

    /// Uploads the model's skin weights and bind pose once; the pose starts at rest.
    pub fn new(context: Arc<GpuContext>, model: &Model) -> Self {
        let device = &context.device;
        let bone_count = model.skeleton.len();
        let skin = skin_texels(&model.mesh.bone_weights);
        let skin_weights = LookupTexture::new(device, "Skin Weights", skin.len());
        let bind_pose = LookupTexture::new(device, "Bind Pose", bone_count * 4);
        let pose = LookupTexture::new(device, "Pose", bone_count * 4);
        skin_weights.write(&context.queue, &skin);
        bind_pose.write(
            &context.queue,
            &matrix_texels(&model.skeleton.bind_pose_offsets()),
        );
        pose.write(&context.queue, &matrix_texels(&model.rest_pose()));

        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skinning Uniform"),
            contents: bytemuck::bytes_of(&SkinUniform {
                bone_count: bone_count as u32,
                highlight_bone: NO_HIGHLIGHT,
                _pad: [0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let layout = device.create_bind_group_layout(&Self::desc());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skinning Bind Group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&skin_weights.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&bind_pose.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&pose.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform.as_entire_binding(),
                },
            ],
        });
        log::debug!(
            "pose textures: {} bones, {} skin texels",
            bone_count,
            skin.len()
        );
        Self {
            context,
            skin_weights,
            bind_pose,
            pose,
            uniform,
            layout,
            bind_group,
            bone_count,
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Rows of the skin weight, bind pose and pose textures.
    pub fn texture_rows(&self) -> [u32; 3] {
        [self.skin_weights.rows, self.bind_pose.rows, self.pose.rows]
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn set_highlight_bone(&mut self, bone: Option<usize>) {
        let uniform = SkinUniform {
            bone_count: self.bone_count as u32,
            highlight_bone: bone.map_or(NO_HIGHLIGHT, |b| b as i32),
            _pad: [0; 2],
        };
        self.context
            .queue
            .write_buffer(&self.uniform, 0, bytemuck::bytes_of(&uniform));
    }

    /// Copies the pose texture back. Only meant for tests and diagnostics.
    pub fn read_pose(&self) -> Result<Vec<Mat4>, GpuError> {
        let device = &self.context.device;
        let size = (TEXTURE_WIDTH * TEXEL_SIZE * self.pose.rows) as wgpu::BufferAddress;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pose Readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Pose Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.pose.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(TEXTURE_WIDTH * TEXEL_SIZE),
                    rows_per_image: Some(self.pose.rows),
                },
            },
            wgpu::Extent3d {
                width: TEXTURE_WIDTH,
                height: self.pose.rows,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(Some(encoder.finish()));
        let bone_count = self.bone_count;
        self.context.read_buffer(&buffer, size, |bytes| {
            let floats: &[f32] = bytemuck::cast_slice(bytes);
            floats
                .chunks_exact(16)
                .take(bone_count)
                .map(Mat4::from_cols_slice)
                .collect()
        })
    }
}

impl PoseSink for GpuPoseSink {
    fn publish(&mut self, bone_transforms: &[Mat4]) {
        if bone_transforms.len() != self.bone_count {
            log::warn!(
                "pose textures: got {} bones, expected {}",
                bone_transforms.len(),
                self.bone_count
            );
        }
        let count = bone_transforms.len().min(self.bone_count);
        self.pose
            .write(&self.context.queue, &matrix_texels(&bone_transforms[..count]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn matrices_pack_as_four_column_texels() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let texels = matrix_texels(&[m, Mat4::IDENTITY]);
        assert_eq!(texels.len(), 8);
        assert_eq!(texels[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(texels[4], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn skin_weights_pack_two_per_texel() {
        let weights = [
            BoneWeight::new(2, 0.25),
            BoneWeight::new(5, 0.75),
            BoneWeight::new(1, 1.0),
        ];
        let texels = skin_texels(&weights);
        assert_eq!(texels, vec![[2.0, 0.25, 5.0, 0.75], [1.0, 1.0, 0.0, 0.0]]);
    }

    #[test]
    fn rows_cover_tiled_layout() {
        assert_eq!(rows_for(0), 1);
        assert_eq!(rows_for(1024), 1);
        assert_eq!(rows_for(1025), 2);
        assert_eq!(std::mem::size_of::<SkinUniform>(), 16);
    }
}
