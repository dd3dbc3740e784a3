//! Overlay definitions.

use std::fmt;
use std::rc::Rc;

use crate::basis::{build_basis, OverlayBasis};
use crate::clip::{ClipPolygon, ClipVertex};
use crate::error::LoadError;
use crate::math::{Vec2, Vec3};
use crate::render::BindContext;
use crate::world::SurfaceHandle;

/// Number of render-order buckets. Overlays in lower buckets draw first.
pub const RENDER_ORDER_COUNT: u16 = 4;

/// Index of an overlay in its manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u32);

/// Per-overlay fade range, in squared distance from the viewer to the overlay origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeRange {
    pub min_sq: f32,
    pub max_sq: f32,
}

impl FadeRange {
    /// Alpha at squared distance `dist_sq`, clamped to `[0, 1]`.
    pub fn alpha(&self, dist_sq: f32) -> f32 {
        fade_alpha(dist_sq, self.min_sq, self.max_sq)
    }
}

/// Linear falloff from 1 at `min` to 0 at `max`.
pub(crate) fn fade_alpha(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        return if value <= min { 1.0 } else { 0.0 };
    }
    (1.0 - (value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Everything needed to create an overlay, independent of the record format.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDesc {
    /// Id from the source data, used in log messages.
    pub source_id: i32,
    pub tex_info: i16,
    pub render_order: u16,
    pub origin: Vec3,
    pub normal: Vec3,
    pub u_axis: Vec3,
    pub flip: bool,
    /// Quad corners in the overlay plane, ordered `(0,0), (1,0), (1,1), (0,1)`
    /// in texture space.
    pub uv_points: [Vec2; 4],
    /// Texture `u` range across the quad.
    pub u_range: (f32, f32),
    /// Texture `v` range across the quad.
    pub v_range: (f32, f32),
    pub surfaces: Vec<SurfaceHandle>,
    pub fade: Option<FadeRange>,
}

impl Default for OverlayDesc {
    fn default() -> Self {
        Self {
            source_id: 0,
            tex_info: 0,
            render_order: 0,
            origin: Vec3::ZERO,
            normal: Vec3::Z,
            u_axis: Vec3::X,
            flip: false,
            uv_points: [
                Vec2::new(-0.5, -0.5),
                Vec2::new(0.5, -0.5),
                Vec2::new(0.5, 0.5),
                Vec2::new(-0.5, 0.5),
            ],
            u_range: (0.0, 1.0),
            v_range: (0.0, 1.0),
            surfaces: Vec::new(),
            fade: None,
        }
    }
}

/// Shape of an overlay's uv quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuadShape {
    Convex,
    /// Zero area; builds nothing but is not an error.
    Degenerate,
    /// Non-convex or self-intersecting.
    Invalid,
}

/// Classify a quad by the turn direction at each corner.
pub fn quad_shape(points: &[Vec2; 4]) -> QuadShape {
    const EPS: f32 = 1e-6;
    let mut positive = 0;
    let mut negative = 0;
    for i in 0..4 {
        let a = points[i];
        let b = points[(i + 1) % 4];
        let c = points[(i + 2) % 4];
        let e0 = b - a;
        let e1 = c - b;
        let turn = e0.x * e1.y - e0.y * e1.x;
        if turn > EPS {
            positive += 1;
        } else if turn < -EPS {
            negative += 1;
        }
    }

    if positive > 0 && negative > 0 {
        return QuadShape::Invalid;
    }
    if positive + negative < 3 {
        return QuadShape::Degenerate;
    }

    let twice_area: f32 = (0..4)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % 4];
            a.x * b.y - a.y * b.x
        })
        .sum();
    if twice_area.abs() <= EPS {
        QuadShape::Degenerate
    } else {
        QuadShape::Convex
    }
}

/// A designer-placed overlay with its projection basis.
pub struct Overlay {
    pub id: OverlayId,
    pub source_id: i32,
    pub tex_info: i16,
    pub render_order: u16,
    pub basis: OverlayBasis,
    pub uv_points: [Vec2; 4],
    /// Texture coordinate at each quad corner.
    pub corner_tex: [Vec2; 4],
    pub surfaces: Vec<SurfaceHandle>,
    pub fade: Option<FadeRange>,
    pub bind_context: Option<Rc<dyn BindContext>>,
    /// False when the basis could not be built; such overlays never get fragments.
    pub valid: bool,
}

impl Overlay {
    /// Validate a description and build the overlay's basis.
    ///
    /// Record problems are errors. A degenerate normal is only logged: the
    /// overlay is kept but marked invalid.
    pub fn from_desc(id: OverlayId, desc: OverlayDesc) -> Result<Self, LoadError> {
        if desc.render_order >= RENDER_ORDER_COUNT {
            return Err(LoadError::RenderOrder {
                overlay: desc.source_id,
                value: desc.render_order,
                max: RENDER_ORDER_COUNT - 1,
            });
        }
        if quad_shape(&desc.uv_points) == QuadShape::Invalid {
            return Err(LoadError::NonConvexQuad {
                overlay: desc.source_id,
            });
        }

        let (basis, valid) = match build_basis(desc.origin, desc.normal, desc.u_axis, desc.flip) {
            Ok(basis) => (basis, true),
            Err(fault) => {
                log::error!(
                    "overlay {} at {:?} is invalid: {}",
                    desc.source_id,
                    desc.origin,
                    fault
                );
                (OverlayBasis::identity(desc.origin), false)
            }
        };

        let (u0, u1) = desc.u_range;
        let (v0, v1) = desc.v_range;
        Ok(Self {
            id,
            source_id: desc.source_id,
            tex_info: desc.tex_info,
            render_order: desc.render_order,
            basis,
            uv_points: desc.uv_points,
            corner_tex: [
                Vec2::new(u0, v0),
                Vec2::new(u1, v0),
                Vec2::new(u1, v1),
                Vec2::new(u0, v1),
            ],
            surfaces: desc.surfaces,
            fade: desc.fade,
            bind_context: None,
            valid,
        })
    }

    pub fn origin(&self) -> Vec3 {
        self.basis.origin
    }

    /// The uv quad in overlay-local coordinates, carrying its corner texture
    /// coordinates and unit-square positions.
    pub fn quad_polygon(&self) -> ClipPolygon {
        const UNIT: [Vec2; 4] = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];
        ClipPolygon::new(
            (0..4)
                .map(|i| {
                    ClipVertex::with_tex(self.uv_points[i].extend(0.0), self.corner_tex[i], UNIT[i])
                })
                .collect(),
        )
    }

    /// Quad corners in world space.
    pub fn quad_world(&self) -> [Vec3; 4] {
        self.uv_points.map(|p| self.basis.to_world(p))
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("id", &self.id)
            .field("source_id", &self.source_id)
            .field("render_order", &self.render_order)
            .field("origin", &self.basis.origin)
            .field("surfaces", &self.surfaces.len())
            .field("valid", &self.valid)
            .finish()
    }
}
