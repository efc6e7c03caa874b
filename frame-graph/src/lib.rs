mod access;
mod barrier;
mod descriptor;
mod device;
mod error;
mod graph;
mod handle;
mod pass;
mod pool;
mod resolve;
mod resources;
mod wgpu_backend;

pub use access::{Access, AccessMask, PassKind, PipelineStage};
pub use barrier::{Barrier, BarrierPlan, ResourceState, synthesize};
pub use descriptor::{BufferDesc, Extent2d, ImageDesc, ImageFormat, SizeClass};
pub use device::Device;
pub use error::{CompileError, ExecuteError, Result};
pub use graph::{FrameGraph, FrameGraphConfig, FrameState};
pub use handle::{PassId, ResourceHandle, ResourceKind};
pub use pass::{Pass, PassBuilder, PassCallback, PassContext, ResourceUse, UseKind};
pub use pool::{PoolStats, PooledImage, ResourcePool};
pub use resolve::Schedule;
pub use resources::FrameResources;
pub use wgpu_backend::{WgpuDevice, WgpuImage, texture_format};
