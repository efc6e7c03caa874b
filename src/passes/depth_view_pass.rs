use std::sync::Arc;

use frame_graph::{Access, FrameGraph, ImageDesc, WgpuDevice};
use wgpu::{BindGroupLayout, Operations, RenderPassColorAttachment, RenderPipeline};

use super::shader_common::{fullscreen_pipeline, texture_entry};
use super::{DEPTH_VIEW, LDR_FORMAT, SCENE_DEPTH};

const DEPTH_VIEW_FRAGMENT_SHADER: &str = "
@group(0) @binding(0)
var scene_depth: texture_depth_2d;

@fragment
fn fragment_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let depth = textureLoad(scene_depth, vec2<i32>(in.position.xy), 0);
    return vec4<f32>(vec3<f32>(1.0 - depth), 1.0);
}
";

pub struct DepthViewPassData {
    pub pipeline: Arc<RenderPipeline>,
    pub bind_group_layout: Arc<BindGroupLayout>,
}

impl DepthViewPassData {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Depth View Bind Group Layout"),
            entries: &[texture_entry(
                0,
                wgpu::ShaderStages::FRAGMENT,
                wgpu::TextureSampleType::Depth,
            )],
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Depth View Pipeline",
            DEPTH_VIEW_FRAGMENT_SHADER,
            &bind_group_layout,
            frame_graph::texture_format(LDR_FORMAT),
            None,
        );

        Self {
            pipeline: Arc::new(pipeline),
            bind_group_layout: Arc::new(bind_group_layout),
        }
    }
}

/// Visualizes scene depth as grayscale.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    data: &DepthViewPassData,
) -> frame_graph::Result<()> {
    let device = graph.device().device().clone();
    let pipeline = data.pipeline.clone();
    let bind_group_layout = data.bind_group_layout.clone();

    let mut pass = graph.add_graphics_pass("depth_view");
    let depth = pass.read_image(SCENE_DEPTH, Access::FRAGMENT_SAMPLE)?;
    let output = pass.write_image(DEPTH_VIEW, ImageDesc::surface(LDR_FORMAT), Access::COLOR_WRITE)?;

    pass.set_callback(move |context| {
        let depth = context.image(depth)?;
        let output = context.image(output)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Depth View Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&depth.view),
            }],
        });

        let mut render_pass = context
            .recorder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth View Render Pass"),
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
