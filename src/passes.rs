pub mod depth_view_pass;
pub mod exposure_pass;
pub mod present_pass;
pub mod readback_pass;
pub mod scene_pass;
pub mod shader_common;
pub mod tonemap_pass;

pub use depth_view_pass::DepthViewPassData;
pub use exposure_pass::{ExposurePassData, ExposureState};
pub use scene_pass::ScenePassData;
pub use tonemap_pass::TonemapPassData;

use frame_graph::{BufferDesc, FrameGraph, ImageFormat, WgpuDevice};

pub const FRAME_PARAMS: &str = "frame_params";
pub const SCENE_COLOR: &str = "scene_color";
pub const SCENE_DEPTH: &str = "scene_depth";
pub const EXPOSURE: &str = "exposure";
pub const EXPOSURE_READBACK: &str = "exposure_readback";
pub const LDR_COLOR: &str = "ldr_color";
pub const DEPTH_VIEW: &str = "depth_view";
pub const OUTPUT: &str = "output";

pub const HDR_FORMAT: ImageFormat = ImageFormat::Rgba16Float;
pub const LDR_FORMAT: ImageFormat = ImageFormat::Rgba8Unorm;

pub fn exposure_desc() -> BufferDesc {
    BufferDesc::new(std::mem::size_of::<ExposureState>() as u64).with_history()
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameParams {
    pub time: f32,
    pub key_value: f32,
    pub width: f32,
    pub height: f32,
}

/// Pipelines shared by every frame.
pub struct Pipelines {
    pub scene: ScenePassData,
    pub exposure: ExposurePassData,
    pub tonemap: TonemapPassData,
    pub depth_view: DepthViewPassData,
}

impl Pipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            scene: ScenePassData::new(device),
            exposure: ExposurePassData::new(device),
            tonemap: TonemapPassData::new(device),
            depth_view: DepthViewPassData::new(device),
        }
    }
}

/// What reaches the output texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Tonemapped,
    Depth,
}

pub struct FrameTargets {
    pub output: wgpu::Texture,
    pub readback: wgpu::Buffer,
}

/// Declares one frame. Both post passes are always declared; whichever one
/// `view` does not present is culled by the graph.
pub fn declare_frame(
    graph: &mut FrameGraph<WgpuDevice>,
    pipelines: &Pipelines,
    targets: &FrameTargets,
    view: View,
) -> frame_graph::Result<()> {
    scene_pass::declare(graph, &pipelines.scene)?;
    exposure_pass::declare(graph, &pipelines.exposure)?;
    readback_pass::declare(graph, targets.readback.clone())?;
    tonemap_pass::declare(graph, &pipelines.tonemap)?;
    depth_view_pass::declare(graph, &pipelines.depth_view)?;

    let source = match view {
        View::Tonemapped => LDR_COLOR,
        View::Depth => DEPTH_VIEW,
    };
    present_pass::declare(graph, source, targets.output.clone())
}
