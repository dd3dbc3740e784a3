//! Queries into already-loaded level geometry.
//!
//! The overlay system never owns world surfaces. It asks a [`WorldGeometry`]
//! for the polygon, plane and lightmap data of each surface an overlay touches,
//! and for the extra grid data of displacement surfaces.

use std::rc::Rc;

use crate::math::{bilerp, Plane, Vec2, Vec3};
use crate::render::Material;
use crate::sort::LightmapPage;

/// Index of a world surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u32);

/// Planar data for one surface.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceGeometry<'a> {
    /// Convex polygon in fan order.
    pub vertices: &'a [Vec3],
    pub plane: Plane,
    pub lightmap_page: LightmapPage,
    /// Written as the third texture coordinate of lightmapped batches.
    pub lightmap_offset: f32,
}

/// Level geometry as seen by the overlay builder.
pub trait WorldGeometry {
    /// Material bound to a texture-info index.
    fn material_for_tex_info(&self, tex_info: i16) -> Option<Rc<Material>>;

    /// Polygon data for a surface, `None` for an unknown handle.
    fn surface(&self, surface: SurfaceHandle) -> Option<SurfaceGeometry<'_>>;

    /// Displacement data when the surface is subdivided.
    fn displacement(&self, surface: SurfaceHandle) -> Option<&dyn DisplacementSurface>;

    /// Lightmap coordinate of a world point on a planar surface.
    fn lightmap_coord(&self, surface: SurfaceHandle, pos: Vec3) -> Vec2;
}

/// How a displacement cell is split into its two triangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellDiagonal {
    /// From the cell's `(0,0)` corner to its `(1,1)` corner.
    Rising,
    /// From the cell's `(1,0)` corner to its `(0,1)` corner.
    Falling,
}

/// A regularly subdivided, non-planar surface.
///
/// Uv space covers the unit square; corner order is `(0,0), (1,0), (1,1), (0,1)`.
pub trait DisplacementSurface {
    /// Number of grid cells along each side.
    fn side_length(&self) -> usize;

    /// World positions of the four base corners.
    fn corners(&self) -> [Vec3; 4];

    /// Displaced world position at a uv point.
    fn uv_to_world(&self, uv: Vec2) -> Vec3;

    /// Lightmap coordinates at the four corners.
    fn corner_lightmap_coords(&self) -> [Vec2; 4];

    /// Triangulation of cell `(x, y)`. Alternates in a checkerboard by default.
    fn cell_diagonal(&self, x: usize, y: usize) -> CellDiagonal {
        if (x + y) % 2 == 0 {
            CellDiagonal::Rising
        } else {
            CellDiagonal::Falling
        }
    }
}

/// Displacement defined by a bilinear base patch plus a height per grid vertex.
#[derive(Clone, Debug)]
pub struct GridDisplacement {
    side_length: usize,
    corners: [Vec3; 4],
    normal: Vec3,
    /// Row-major `(side_length + 1)^2` heights along `normal`.
    heights: Vec<f32>,
    lightmap_corners: [Vec2; 4],
}

impl GridDisplacement {
    /// Flat grid over the given corners.
    pub fn new(side_length: usize, corners: [Vec3; 4], lightmap_corners: [Vec2; 4]) -> Self {
        let side_length = side_length.max(1);
        let normal = (corners[1] - corners[0])
            .cross(corners[3] - corners[0])
            .normalize_or_zero();
        let verts = side_length + 1;
        Self {
            side_length,
            corners,
            normal,
            heights: vec![0.0; verts * verts],
            lightmap_corners,
        }
    }

    /// Set the height of grid vertex `(x, y)`. Out-of-range vertices are ignored.
    pub fn set_height(&mut self, x: usize, y: usize, height: f32) {
        let verts = self.side_length + 1;
        if x < verts && y < verts {
            self.heights[y * verts + x] = height;
        }
    }

    pub fn height(&self, x: usize, y: usize) -> f32 {
        let verts = self.side_length + 1;
        self.heights[y.min(self.side_length) * verts + x.min(self.side_length)]
    }

    /// Height at a uv point, interpolated over the triangle of its cell.
    fn height_at(&self, uv: Vec2) -> f32 {
        let n = self.side_length as f32;
        let grid = (uv * n).clamp(Vec2::ZERO, Vec2::splat(n));
        let cx = (grid.x.floor() as usize).min(self.side_length - 1);
        let cy = (grid.y.floor() as usize).min(self.side_length - 1);
        let fx = grid.x - cx as f32;
        let fy = grid.y - cy as f32;

        let h00 = self.height(cx, cy);
        let h10 = self.height(cx + 1, cy);
        let h11 = self.height(cx + 1, cy + 1);
        let h01 = self.height(cx, cy + 1);

        match self.cell_diagonal(cx, cy) {
            CellDiagonal::Rising if fx >= fy => h00 + (h10 - h00) * fx + (h11 - h10) * fy,
            CellDiagonal::Rising => h00 + (h11 - h01) * fx + (h01 - h00) * fy,
            CellDiagonal::Falling if fx + fy <= 1.0 => h00 + (h10 - h00) * fx + (h01 - h00) * fy,
            CellDiagonal::Falling => h11 + (h11 - h01) * (fx - 1.0) + (h11 - h10) * (fy - 1.0),
        }
    }
}

impl DisplacementSurface for GridDisplacement {
    fn side_length(&self) -> usize {
        self.side_length
    }

    fn corners(&self) -> [Vec3; 4] {
        self.corners
    }

    fn uv_to_world(&self, uv: Vec2) -> Vec3 {
        bilerp(self.corners, uv) + self.normal * self.height_at(uv)
    }

    fn corner_lightmap_coords(&self) -> [Vec2; 4] {
        self.lightmap_corners
    }
}
