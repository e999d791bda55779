//! Pre-rendering static tile layers, and pushing the results to the GPU.

pub mod composite;
pub mod gpu;
pub mod surface;

pub use composite::LayerSurfaces;
pub use gpu::{GpuLayers, SessionRenderer, SheetCache, SheetTextures};
pub use surface::Surface;
