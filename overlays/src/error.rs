//! Error types for overlay loading and fragment building.

use thiserror::Error;

/// Fatal problems with the raw overlay records. Any of these aborts the whole load.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("{lump} lump is {len} bytes, not a multiple of the {stride}-byte record")]
    LumpSize {
        lump: &'static str,
        len: usize,
        stride: usize,
    },

    #[error("overlay {overlay} has render order {value}, the maximum is {max}")]
    RenderOrder { overlay: i32, value: u16, max: u16 },

    #[error("overlay {overlay} references {count} faces, the maximum is {max}")]
    FaceCount { overlay: i32, count: u16, max: u16 },

    #[error("fade lump has {fades} records for {overlays} overlays")]
    FadeCount { overlays: usize, fades: usize },

    #[error("overlay {overlay} has a non-convex or self-intersecting uv quad")]
    NonConvexQuad { overlay: i32 },
}

/// Geometric faults hit while clipping one overlay against one surface.
///
/// These never leave the build pipeline: the caller logs them and moves on to
/// the next surface.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum BuildFault {
    #[error("overlay basis is degenerate")]
    DegenerateBasis,

    #[error("barycentric remap produced a non-finite result")]
    NonFiniteBarycentric,

    #[error("fragment vertex has non-finite attributes")]
    NonFiniteVertex,

    #[error("surface plane is parallel to the overlay projection")]
    ParallelProjection,
}
