use wgpu::{
    Buffer, BufferDescriptor, BufferUsages, CommandEncoder, CommandEncoderDescriptor, Extent3d,
    Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages, TextureView,
    TextureViewDescriptor,
};

use crate::barrier::Barrier;
use crate::descriptor::{BufferDesc, Extent2d, ImageDesc, ImageFormat};
use crate::device::Device;

/// A texture together with its default view.
#[derive(Debug, Clone)]
pub struct WgpuImage {
    pub texture: Texture,
    pub view: TextureView,
}

impl WgpuImage {
    pub fn new(texture: Texture) -> Self {
        let view = texture.create_view(&TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Drives the frame graph on a wgpu device and queue.
///
/// wgpu tracks resource states itself, so barriers are only traced.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_size: Extent2d,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        Self {
            device,
            queue,
            surface_size: Extent2d::new(width, height),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_size = Extent2d::new(width, height);
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

pub fn texture_format(format: ImageFormat) -> TextureFormat {
    match format {
        ImageFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        ImageFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
        ImageFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
        ImageFormat::Rgba16Float => TextureFormat::Rgba16Float,
        ImageFormat::Rgba32Float => TextureFormat::Rgba32Float,
        ImageFormat::R32Float => TextureFormat::R32Float,
        ImageFormat::R32Uint => TextureFormat::R32Uint,
        ImageFormat::Depth32Float => TextureFormat::Depth32Float,
    }
}

fn texture_usage(format: ImageFormat) -> TextureUsages {
    let base = TextureUsages::RENDER_ATTACHMENT
        | TextureUsages::TEXTURE_BINDING
        | TextureUsages::COPY_SRC;
    if format.is_depth() {
        return base;
    }
    match format {
        ImageFormat::Rgba8UnormSrgb | ImageFormat::Bgra8UnormSrgb => base | TextureUsages::COPY_DST,
        _ => base | TextureUsages::COPY_DST | TextureUsages::STORAGE_BINDING,
    }
}

impl Device for WgpuDevice {
    type Image = WgpuImage;
    type Buffer = Buffer;
    type Recorder = CommandEncoder;

    fn create_image(&mut self, label: &str, desc: &ImageDesc, extent: Extent2d) -> WgpuImage {
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: desc.array_layers,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: texture_format(desc.format),
            usage: texture_usage(desc.format),
            view_formats: &[],
        });
        WgpuImage::new(texture)
    }

    fn create_buffer(&mut self, label: &str, desc: &BufferDesc) -> Buffer {
        let size = desc.size.max(wgpu::COPY_BUFFER_ALIGNMENT);
        let size = size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size,
            usage: BufferUsages::STORAGE
                | BufferUsages::UNIFORM
                | BufferUsages::INDIRECT
                | BufferUsages::VERTEX
                | BufferUsages::INDEX
                | BufferUsages::COPY_SRC
                | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn destroy_image(&mut self, image: WgpuImage) {
        image.texture.destroy();
    }

    fn destroy_buffer(&mut self, buffer: Buffer) {
        buffer.destroy();
    }

    fn open_command_recorder(&mut self, label: &str) -> CommandEncoder {
        self.device
            .create_command_encoder(&CommandEncoderDescriptor { label: Some(label) })
    }

    fn record_barrier(&mut self, _recorder: &mut CommandEncoder, barrier: &Barrier) {
        log::trace!(
            "wgpu handles {} transition {:?} -> {:?}",
            barrier.resource,
            barrier.src_access,
            barrier.dst_access
        );
    }

    fn submit(&mut self, recorder: CommandEncoder) {
        self.queue.submit(std::iter::once(recorder.finish()));
    }

    fn output_surface_size(&self) -> Extent2d {
        self.surface_size
    }
}
