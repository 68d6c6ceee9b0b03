use pollster::FutureExt as _;

use crate::error::GpuError;

/// Device and queue shared by the pose textures and the flock compute pass.
pub struct GpuContext {
    pub adapter_info: wgpu::AdapterInfo,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Opens a device without a surface.
    pub fn headless() -> Result<Self, GpuError> {
        Self::request().block_on()
    }

    async fn request() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let adapter_info = adapter.get_info();
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("anim-viewer device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await?;
        log::info!(
            "gpu: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );
        Ok(Self {
            adapter_info,
            device,
            queue,
        })
    }

    /// Blocks until `buffer` is mapped for reading, then hands its bytes to `read`.
    pub fn read_buffer<R>(
        &self,
        buffer: &wgpu::Buffer,
        size: wgpu::BufferAddress,
        read: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, GpuError> {
        let slice = buffer.slice(..size);
        let (tx, rx) = crossbeam::channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait)?;
        rx.recv().map_err(|_| GpuError::ReadbackDropped)??;
        let result = {
            let data = slice.get_mapped_range();
            read(&data)
        };
        buffer.unmap();
        Ok(result)
    }
}
