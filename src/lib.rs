pub mod passes;

use frame_graph::{
    Access, CompileError, Device as _, ExecuteError, FrameGraph, FrameGraphConfig, PoolStats,
    WgpuDevice,
};
use passes::{ExposureState, FrameParams, FrameTargets, Pipelines, View};
use web_time::Instant;
use wgpu::InstanceDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to request adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("Failed to request a device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),

    #[error("Failed to wait for the device: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("Failed to map the exposure readback: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("Exposure readback was dropped before it completed")]
    ReadbackCancelled,
}

/// Renders frames offscreen and reports what the frame graph did with them.
#[derive(Debug, Clone, clap::Parser)]
#[command(version, about)]
pub struct Options {
    /// Number of frames to render.
    #[arg(long, default_value_t = 120)]
    pub frames: u32,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Frame at which the output is resized to `--resize-width`x`--resize-height`.
    #[arg(long)]
    pub resize_at: Option<u32>,

    #[arg(long, default_value_t = 1920)]
    pub resize_width: u32,

    #[arg(long, default_value_t = 1080)]
    pub resize_height: u32,

    /// Present scene depth instead of the tonemapped color.
    #[arg(long)]
    pub depth_view: bool,

    /// Log every compiled frame at `info`.
    #[arg(long)]
    pub verbose: bool,
}

pub struct Gpu {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl Gpu {
    pub async fn new_async() -> Result<Self, AppError> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("WGPU Adapter: {:?}", adapter.get_info());
        log::debug!("WGPU Adapter Features: {:#?}", adapter.features());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                memory_hints: wgpu::MemoryHints::default(),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self { device, queue })
    }
}

pub struct Renderer {
    graph: FrameGraph<WgpuDevice>,
    pipelines: Pipelines,
    targets: FrameTargets,
    frame_params: wgpu::Buffer,
    view: View,
}

impl Renderer {
    pub const KEY_VALUE: f32 = 0.18;

    pub fn new(gpu: Gpu, width: u32, height: u32, config: FrameGraphConfig, view: View) -> Self {
        let pipelines = Pipelines::new(&gpu.device);
        let targets = FrameTargets {
            output: create_output_texture(&gpu.device, width, height),
            readback: gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Exposure Readback"),
                size: std::mem::size_of::<ExposureState>() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };
        let frame_params = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Params"),
            size: std::mem::size_of::<FrameParams>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let device = WgpuDevice::new(gpu.device, gpu.queue, width, height);
        Self {
            graph: FrameGraph::with_config(device, config),
            pipelines,
            targets,
            frame_params,
            view,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let device = self.graph.device().device();
        self.targets.output.destroy();
        self.targets.output = create_output_texture(device, width, height);
        self.graph.device_mut().resize(width, height);
        log::info!("Resized output to {width}x{height}");
    }

    /// Declares, compiles and executes one frame, then reads back its exposure.
    pub async fn render_frame(&mut self, time: f32) -> Result<ExposureState, AppError> {
        let size = self.graph.device().output_surface_size();
        let params = FrameParams {
            time,
            key_value: Self::KEY_VALUE,
            width: size.width as f32,
            height: size.height as f32,
        };
        self.graph
            .device()
            .queue()
            .write_buffer(&self.frame_params, 0, bytemuck::bytes_of(&params));

        if let Err(error) = self.declare_frame() {
            self.graph.discard_frame();
            return Err(error.into());
        }
        self.graph.compile_for_surface()?;
        self.graph.execute()?;

        self.read_exposure().await
    }

    fn declare_frame(&mut self) -> frame_graph::Result<()> {
        self.graph.import_buffer(
            passes::FRAME_PARAMS,
            self.frame_params.clone(),
            Access::TRANSFER_WRITE,
        )?;
        passes::declare_frame(&mut self.graph, &self.pipelines, &self.targets, self.view)
    }

    async fn read_exposure(&self) -> Result<ExposureState, AppError> {
        let slice = self.targets.readback.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.graph.device().device().poll(wgpu::PollType::Wait)?;
        receiver.await.map_err(|_| AppError::ReadbackCancelled)??;

        let state = {
            let data = slice.get_mapped_range();
            bytemuck::pod_read_unaligned(&data[..std::mem::size_of::<ExposureState>()])
        };
        self.targets.readback.unmap();
        Ok(state)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.graph.pool_stats()
    }
}

fn create_output_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Output Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: frame_graph::texture_format(passes::LDR_FORMAT),
        usage: wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

pub async fn run(options: Options) -> Result<(), AppError> {
    let gpu = Gpu::new_async().await?;
    let config = FrameGraphConfig {
        verbose: options.verbose,
        warn_on_culled: false,
    };
    let view = if options.depth_view {
        View::Depth
    } else {
        View::Tonemapped
    };
    let mut renderer = Renderer::new(gpu, options.width, options.height, config, view);

    let start = Instant::now();
    let mut last = Instant::now();
    for frame in 0..options.frames {
        if options.resize_at == Some(frame) {
            renderer.resize(options.resize_width, options.resize_height);
        }

        let time = start.elapsed().as_secs_f32();
        let exposure = renderer.render_frame(time).await?;
        log::debug!(
            "Frame {frame}: exposure {:.3} (luminance {:.4}, {} frame(s) adapted), {:.2} ms",
            exposure.value,
            exposure.luminance,
            exposure.frames,
            last.elapsed().as_secs_f64() * 1000.0
        );
        last = Instant::now();
    }

    let stats = renderer.pool_stats();
    log::info!(
        "Rendered {} frame(s) in {:.2?}",
        options.frames,
        start.elapsed()
    );
    log::info!(
        "Pool created {} image(s) and {} buffer(s), destroyed {} image(s) and {} buffer(s)",
        stats.images_created,
        stats.buffers_created,
        stats.images_destroyed,
        stats.buffers_destroyed
    );
    Ok(())
}
