//! wgpu implementation of the rendering backend.
//!
//! [`Gpu`] owns the device and window surface; [`WgpuBackend`] turns batches
//! into render passes on top of it.

mod backend;
mod context;
mod pipeline;
mod readback;
mod vertex;

pub use backend::WgpuBackend;
pub use context::{Gpu, GpuInit, SurfaceErrorAction};
pub use pipeline::{SpritePipelines, blend_state};
pub use vertex::SpriteVertex;
