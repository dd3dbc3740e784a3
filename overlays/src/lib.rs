//! Overlays: projected decal quads clipped onto world geometry.
//!
//! Each overlay is a designer-placed quad with its own projection basis. At
//! load time it is clipped against every surface it touches, planar or
//! displaced, and the pieces are stored as fragments in a pool. Every frame
//! the fragments on visible surfaces are faded, queued per material and
//! lightmap page, and handed to a [`render::DrawBackend`] as triangle fans.

pub mod basis;
pub mod clip;
pub mod config;
pub mod disp_clip;
pub mod error;
pub mod manager;
pub mod math;
pub mod overlay;
pub mod pool;
pub mod records;
pub mod render;
pub mod sort;
pub mod surface_clip;
pub mod world;

pub use crate::config::OverlayConfig;
pub use crate::error::{BuildFault, LoadError};
pub use crate::manager::{OverlayManager, OverlayStats};
pub use crate::math::{Plane, Vec2, Vec3};
pub use crate::overlay::{FadeRange, Overlay, OverlayDesc, OverlayId, RENDER_ORDER_COUNT};
pub use crate::pool::{Fragment, FragmentHandle, FragmentPool, FragmentVertex};
pub use crate::render::{
    BatchStats, BindContext, DrawBackend, DrawState, Material, MaterialId, OverlayMesh,
    OverlayVertex,
};
pub use crate::sort::{LightmapPage, SortId, SortRef, SortRegistry, MAX_SORT_GROUPS};
pub use crate::world::{
    CellDiagonal, DisplacementSurface, GridDisplacement, SurfaceGeometry, SurfaceHandle,
    WorldGeometry,
};
