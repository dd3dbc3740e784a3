//! Overlay projection basis.
//!
//! Every overlay projects onto the world along its normal. The basis places the
//! overlay's uv quad in world space: local `(x, y)` maps to
//! `origin + u * x + v * y`.

use crate::error::BuildFault;
use crate::math::{any_perpendicular, Vec2, Vec3};

const DEGENERATE_LENGTH: f32 = 1e-4;

/// Orthonormal `(u, v, normal)` frame anchored at the overlay origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayBasis {
    pub origin: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub normal: Vec3,
}

impl OverlayBasis {
    /// World position of a point in the overlay plane.
    pub fn to_world(&self, local: Vec2) -> Vec3 {
        self.origin + self.u * local.x + self.v * local.y
    }

    /// Local coordinates of a world point: `x`/`y` in the plane, `z` along the normal.
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        let d = world - self.origin;
        Vec3::new(d.dot(self.u), d.dot(self.v), d.dot(self.normal))
    }

    /// Fallback frame used for overlays whose input normal is unusable.
    pub fn identity(origin: Vec3) -> Self {
        Self {
            origin,
            u: Vec3::X,
            v: Vec3::Y,
            normal: Vec3::Z,
        }
    }
}

/// Pulls the u axis out of the spare `z` components of the first three quad points.
///
/// The record format stores the axis there; once read the components are zeroed
/// so the points are plain in-plane coordinates.
pub fn unpack_u_axis(points: &mut [Vec3; 4]) -> Vec3 {
    let axis = Vec3::new(points[0].z, points[1].z, points[2].z);
    for point in points.iter_mut().take(3) {
        point.z = 0.0;
    }
    axis
}

/// Builds the orthonormal basis for an overlay.
///
/// A zero-length normal fails with [`BuildFault::DegenerateBasis`]. A degenerate
/// u axis is only logged: the basis falls back to an arbitrary in-plane axis so
/// the overlay still builds with finite values.
pub fn build_basis(
    origin: Vec3,
    normal: Vec3,
    u_axis: Vec3,
    flip: bool,
) -> Result<OverlayBasis, BuildFault> {
    if !normal.is_finite() || normal.length() < DEGENERATE_LENGTH {
        return Err(BuildFault::DegenerateBasis);
    }
    let normal = normal.normalize();

    let in_plane = u_axis - normal * u_axis.dot(normal);
    let u = if in_plane.is_finite() && in_plane.length() >= DEGENERATE_LENGTH {
        in_plane.normalize()
    } else {
        log::warn!(
            "overlay at {:?} has a degenerate u axis {:?}, using an arbitrary one",
            origin,
            u_axis
        );
        any_perpendicular(normal)
    };

    let mut v = normal.cross(u).normalize();
    if flip {
        v = -v;
    }

    Ok(OverlayBasis {
        origin,
        u,
        v,
        normal,
    })
}
