use std::borrow::Cow;
use std::sync::Arc;

use frame_graph::{Access, FrameGraph, WgpuDevice};
use wgpu::{BindGroupLayout, ComputePipeline};

use super::shader_common::{FRAME_PARAMS_STRUCT, texture_entry, uniform_entry};
use super::{EXPOSURE, FRAME_PARAMS, SCENE_COLOR, exposure_desc};

const EXPOSURE_SHADER: &str = "
struct Exposure {
    value: f32,
    luminance: f32,
    frames: u32,
    padding: u32,
};

@group(0) @binding(0)
var scene_color: texture_2d<f32>;

@group(0) @binding(1)
var<storage, read> previous: Exposure;

@group(0) @binding(2)
var<storage, read_write> current: Exposure;

@group(0) @binding(3)
var<uniform> frame: FrameParams;

const GRID: u32 = 8u;

@compute @workgroup_size(1)
fn compute_main() {
    let size = textureDimensions(scene_color);
    var total = 0.0;
    for (var y = 0u; y < GRID; y = y + 1u) {
        for (var x = 0u; x < GRID; x = x + 1u) {
            let texel = vec2<u32>(
                (x * 2u + 1u) * size.x / (GRID * 2u),
                (y * 2u + 1u) * size.y / (GRID * 2u),
            );
            let color = textureLoad(scene_color, texel, 0).rgb;
            let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
            total = total + log(max(luminance, 0.0001));
        }
    }

    let average = exp(total / f32(GRID * GRID));
    var adapted = average;
    if (previous.frames > 0u) {
        adapted = mix(previous.luminance, average, 0.05);
    }

    current.luminance = adapted;
    current.value = frame.key_value / max(adapted, 0.0001);
    current.frames = previous.frames + 1u;
    current.padding = 0u;
}
";

/// Mirrors `Exposure` in the shader.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ExposureState {
    pub value: f32,
    pub luminance: f32,
    pub frames: u32,
    pub padding: u32,
}

pub struct ExposurePassData {
    pub pipeline: Arc<ComputePipeline>,
    pub bind_group_layout: Arc<BindGroupLayout>,
}

impl ExposurePassData {
    pub fn new(device: &wgpu::Device) -> Self {
        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Exposure Bind Group Layout"),
            entries: &[
                texture_entry(
                    0,
                    wgpu::ShaderStages::COMPUTE,
                    wgpu::TextureSampleType::Float { filterable: false },
                ),
                storage_entry(1, true),
                storage_entry(2, false),
                uniform_entry(3, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Exposure Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(format!(
                "{FRAME_PARAMS_STRUCT}\n{EXPOSURE_SHADER}"
            ))),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Exposure Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Exposure Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("compute_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline: Arc::new(pipeline),
            bind_group_layout: Arc::new(bind_group_layout),
        }
    }
}

/// Adapts last frame's exposure towards the average luminance of the scene.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    data: &ExposurePassData,
) -> frame_graph::Result<()> {
    let device = graph.device().device().clone();
    let pipeline = data.pipeline.clone();
    let bind_group_layout = data.bind_group_layout.clone();

    let mut pass = graph.add_compute_pass("exposure");
    let params = pass.read_external(FRAME_PARAMS, Access::SHADER_READ)?;
    let scene = pass.read_image(SCENE_COLOR, Access::COMPUTE_SAMPLE)?;
    let previous = pass.read_history_buffer(EXPOSURE, exposure_desc(), Access::COMPUTE_READ)?;
    let current = pass.write_buffer(EXPOSURE, exposure_desc(), Access::COMPUTE_WRITE)?;

    pass.set_callback(move |context| {
        let params = context.buffer(params)?;
        let scene = context.image(scene)?;
        let previous = context.buffer(previous)?;
        let current = context.buffer(current)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Exposure Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scene.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: previous.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: current.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut compute_pass = context
            .recorder()
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Exposure Compute Pass"),
                timestamp_writes: None,
            });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(1, 1, 1);
        Ok(())
    });
    Ok(())
}
