use frame_graph::{Access, ExecuteError, FrameGraph, WgpuDevice, WgpuImage};

use super::OUTPUT;

/// Copies `source` into the output texture, which becomes the presentation
/// target of the frame.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    source: &str,
    output: wgpu::Texture,
) -> frame_graph::Result<()> {
    let mut pass = graph.add_transfer_pass("present");
    let source = pass.read_image(source, Access::TRANSFER_READ)?;
    let output = pass.write_presentation(OUTPUT, WgpuImage::new(output), Access::TRANSFER_WRITE)?;

    pass.set_callback(move |context| {
        let extent = context.image_extent(source)?;
        let source = context.image(source)?;
        let output = context.image(output)?;

        let size = output.texture.size();
        if size.width != extent.width || size.height != extent.height {
            return Err(ExecuteError::PassFailed {
                pass: context.pass_name().to_string(),
                message: format!(
                    "output is {}x{} but the frame was compiled at {}x{}",
                    size.width, size.height, extent.width, extent.height
                ),
            });
        }

        context.recorder().copy_texture_to_texture(
            source.texture.as_image_copy(),
            output.texture.as_image_copy(),
            wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    });
    Ok(())
}
