use frame_graph::{Access, FrameGraph, WgpuDevice};

use super::{EXPOSURE, EXPOSURE_READBACK, ExposureState};

/// Copies this frame's exposure into a mappable buffer owned by the app.
pub fn declare(
    graph: &mut FrameGraph<WgpuDevice>,
    readback: wgpu::Buffer,
) -> frame_graph::Result<()> {
    let mut pass = graph.add_transfer_pass("exposure_readback");
    let exposure = pass.read_buffer(EXPOSURE, Access::TRANSFER_READ)?;
    let readback = pass.write_external_buffer(EXPOSURE_READBACK, readback, Access::TRANSFER_WRITE)?;

    pass.set_callback(move |context| {
        let exposure = context.buffer(exposure)?;
        let readback = context.buffer(readback)?;
        context.recorder().copy_buffer_to_buffer(
            exposure,
            0,
            readback,
            0,
            std::mem::size_of::<ExposureState>() as wgpu::BufferAddress,
        );
        Ok(())
    });
    Ok(())
}
