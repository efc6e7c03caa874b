use std::sync::Arc;

use frame_graph::{Access, FrameGraph, ImageDesc, WgpuDevice};
use wgpu::{BindGroupLayout, Operations, RenderPassColorAttachment, RenderPipeline, Sampler};

use super::shader_common::{fullscreen_pipeline, texture_entry, uniform_entry};
use super::{EXPOSURE, LDR_COLOR, LDR_FORMAT, SCENE_COLOR};

const TONEMAP_FRAGMENT_SHADER: &str = "
struct Exposure {
    value: f32,
    luminance: f32,
    frames: u32,
    padding: u32,
};

@group(0) @binding(0)
var scene_color: texture_2d<f32>;

@group(0) @binding(1)
var scene_sampler: sampler;

@group(0) @binding(2)
var<uniform> exposure: Exposure;

@fragment
fn fragment_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let hdr = textureSample(scene_color, scene_sampler, in.uv).rgb * exposure.value;
    let mapped = (hdr * (2.51 * hdr + 0.03)) / (hdr * (2.43 * hdr + 0.59) + 0.14);
    return vec4<f32>(clamp(mapped, vec3<f32>(0.0), vec3<f32>(1.0)), 1.0);
}
";

pub struct TonemapPassData {
    pub pipeline: Arc<RenderPipeline>,
    pub bind_group_layout: Arc<BindGroupLayout>,
    pub sampler: Arc<Sampler>,
}

impl TonemapPassData {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tonemap Bind Group Layout"),
            entries: &[
                texture_entry(
                    0,
                    wgpu::ShaderStages::FRAGMENT,
                    wgpu::TextureSampleType::Float { filterable: true },
                ),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Tonemap Pipeline",
            TONEMAP_FRAGMENT_SHADER,
            &bind_group_layout,
            frame_graph::texture_format(LDR_FORMAT),
            None,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tonemap Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline: Arc::new(pipeline),
            bind_group_layout: Arc::new(bind_group_layout),
            sampler: Arc::new(sampler),
        }
    }
}

/// Maps the HDR scene into displayable range using the adapted exposure.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    data: &TonemapPassData,
) -> frame_graph::Result<()> {
    let device = graph.device().device().clone();
    let pipeline = data.pipeline.clone();
    let bind_group_layout = data.bind_group_layout.clone();
    let sampler = data.sampler.clone();

    let mut pass = graph.add_graphics_pass("tonemap");
    let scene = pass.read_image(SCENE_COLOR, Access::FRAGMENT_SAMPLE)?;
    let exposure = pass.read_buffer(EXPOSURE, Access::SHADER_READ)?;
    let output = pass.write_image(LDR_COLOR, ImageDesc::surface(LDR_FORMAT), Access::COLOR_WRITE)?;

    pass.set_callback(move |context| {
        let scene = context.image(scene)?;
        let exposure = context.buffer(exposure)?;
        let output = context.image(output)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tonemap Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scene.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: exposure.as_entire_binding(),
                },
            ],
        });

        let mut render_pass = context
            .recorder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Tonemap Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &output.view,
                    resolve_target: None,
                    ops: Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

        render_pass.set_pipeline(&pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    });
    Ok(())
}
