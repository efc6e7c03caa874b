use std::sync::Arc;

use frame_graph::{Access, FrameGraph, ImageDesc, ImageFormat, WgpuDevice};
use wgpu::{
    BindGroupLayout, Operations, RenderPassColorAttachment, RenderPassDepthStencilAttachment,
    RenderPipeline,
};

use super::shader_common::{fullscreen_pipeline, uniform_entry};
use super::{FRAME_PARAMS, HDR_FORMAT, SCENE_COLOR, SCENE_DEPTH};

const SCENE_FRAGMENT_SHADER: &str = "
@group(0) @binding(0)
var<uniform> frame: FrameParams;

struct FragmentOutput {
    @location(0) color: vec4<f32>,
    @builtin(frag_depth) depth: f32,
};

@fragment
fn fragment_main(in: VertexOutput) -> FragmentOutput {
    let aspect = frame.width / max(frame.height, 1.0);
    let p = (in.uv - vec2<f32>(0.5, 0.5)) * vec2<f32>(aspect, 1.0);
    let orbit = vec2<f32>(cos(frame.time), sin(frame.time)) * 0.25;
    let d = length(p - orbit);
    let glow = 4.0 / (1.0 + 40.0 * d * d);
    let sky = mix(vec3<f32>(0.05, 0.07, 0.12), vec3<f32>(0.3, 0.4, 0.6), in.uv.y);
    let pulse = 0.5 + 0.5 * sin(frame.time * 0.5);

    var out: FragmentOutput;
    out.color = vec4<f32>(sky * (0.5 + 2.0 * pulse) + vec3<f32>(1.0, 0.8, 0.5) * glow, 1.0);
    out.depth = clamp(d, 0.0, 1.0);
    return out;
}
";

pub struct ScenePassData {
    pub pipeline: Arc<RenderPipeline>,
    pub bind_group_layout: Arc<BindGroupLayout>,
}

impl ScenePassData {
    pub fn new(device: &wgpu::Device) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });

        let pipeline = fullscreen_pipeline(
            device,
            "Scene Pipeline",
            SCENE_FRAGMENT_SHADER,
            &bind_group_layout,
            frame_graph::texture_format(HDR_FORMAT),
            Some(wgpu::DepthStencilState {
                format: frame_graph::texture_format(ImageFormat::Depth32Float),
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        );

        Self {
            pipeline: Arc::new(pipeline),
            bind_group_layout: Arc::new(bind_group_layout),
        }
    }
}

/// Renders the HDR scene color and its depth.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    data: &ScenePassData,
) -> frame_graph::Result<()> {
    let device = graph.device().device().clone();
    let pipeline = data.pipeline.clone();
    let bind_group_layout = data.bind_group_layout.clone();

    let mut pass = graph.add_graphics_pass("scene");
    let params = pass.read_external(FRAME_PARAMS, Access::SHADER_READ)?;
    let color = pass.write_image(SCENE_COLOR, ImageDesc::surface(HDR_FORMAT), Access::COLOR_WRITE)?;
    let depth = pass.write_image(
        SCENE_DEPTH,
        ImageDesc::surface(ImageFormat::Depth32Float),
        Access::DEPTH_STENCIL_WRITE,
    )?;

    pass.set_callback(move |context| {
        let params = context.buffer(params)?;
        let color = context.image(color)?;
        let depth = context.image(depth)?;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            }],
        });

        let mut render_pass = context
            .recorder()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &color.view,
                    resolve_target: None,
                    ops: Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
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
