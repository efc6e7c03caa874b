use crate::barrier::Barrier;
use crate::descriptor::{BufferDesc, Extent2d, ImageDesc};

/// The GPU backend the frame graph drives.
///
/// The graph only allocates, destroys, records barriers and submits through
/// this trait. What a pass records in between is up to its callback, which
/// receives the backend's own recorder type.
pub trait Device {
    type Image;
    type Buffer;
    type Recorder;

    fn create_image(&mut self, label: &str, desc: &ImageDesc, extent: Extent2d) -> Self::Image;

    fn create_buffer(&mut self, label: &str, desc: &BufferDesc) -> Self::Buffer;

    fn destroy_image(&mut self, image: Self::Image);

    fn destroy_buffer(&mut self, buffer: Self::Buffer);

    fn open_command_recorder(&mut self, label: &str) -> Self::Recorder;

    fn record_barrier(&mut self, recorder: &mut Self::Recorder, barrier: &Barrier);

    fn submit(&mut self, recorder: Self::Recorder);

    fn output_surface_size(&self) -> Extent2d;
}
