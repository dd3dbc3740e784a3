mod batch;
mod material;
mod mesh;
mod queue;

pub use batch::{draw_group, BatchStats};
pub use material::{BindContext, Material, MaterialId};
pub use mesh::{DrawBackend, DrawState, MeshBuilder, OverlayMesh, OverlayVertex};
pub use queue::{apply_fade, RenderQueue, MAX_BATCH_ELEMENTS};
