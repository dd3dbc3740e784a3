//! Clipping an overlay quad against a planar world surface.
//!
//! All clipping happens in overlay-local space, where the overlay normal is
//! +Z. The surface polygon is flattened into the overlay plane and turned into
//! one inward-facing plane per edge; the quad is intersected with each in
//! turn. Survivors are projected back onto the surface along the overlay
//! normal and retextured through an inverse bilinear map of the quad.

use crate::clip::{clip_to_back, ClipPolygon};
use crate::error::BuildFault;
use crate::math::{bilerp, fan_area, inverse_bilinear, Plane, Vec2, Vec3};
use crate::overlay::Overlay;
use crate::pool::FragmentVertex;
use crate::world::SurfaceGeometry;

/// World-space lift along the surface normal, against z-fighting.
pub const SURFACE_OFFSET: f32 = 0.1;

/// Surfaces whose projected area is below this are skipped.
pub const DEGENERATE_AREA: f32 = 1e-3;

/// Inward-facing edge planes of a convex polygon lying in the `z = 0` plane.
///
/// Each plane contains its edge and the +Z axis; a vertex off the edge lies
/// on its negative side. Zero-length edges are skipped.
pub fn edge_planes(polygon: &[Vec3]) -> Vec<Plane> {
    let count = polygon.len();
    let mut planes = Vec::with_capacity(count);
    for i in 0..count {
        let a = polygon[i];
        let b = polygon[(i + 1) % count];
        let normal = Vec3::Z.cross(b - a);
        if normal.length() <= f32::EPSILON {
            continue;
        }
        let plane = Plane::from_point_normal(a, normal.normalize());

        // Orient against the vertex farthest from the edge; for a triangle
        // that is the one vertex not on it.
        let reference = polygon
            .iter()
            .map(|&p| plane.distance(p))
            .fold(0.0f32, |best, d| if d.abs() > best.abs() { d } else { best });
        planes.push(if reference > 0.0 { plane.flipped() } else { plane });
    }
    planes
}

/// Intersect `quad` with a convex polygon, both in overlay-local space.
///
/// The polygon is flattened to `z = 0` first. Returns `None` when nothing of
/// the quad lies inside, or the flattened polygon has no area.
pub fn clip_quad_to_polygon(quad: ClipPolygon, polygon_local: &[Vec3]) -> Option<ClipPolygon> {
    let flat: Vec<Vec3> = polygon_local.iter().map(|p| p.truncate().extend(0.0)).collect();
    if fan_area(&flat) < DEGENERATE_AREA {
        return None;
    }
    let mut poly = clip_to_back(quad, &edge_planes(&flat))?;
    for v in &mut poly.verts {
        v.pos.z = 0.0;
    }
    Some(poly)
}

/// Reassign texture coordinates from the quad's corners.
///
/// `tex[1]` becomes the vertex's position in the quad's unit square and
/// `tex[0]` the bilinear blend of the corner texture coordinates.
pub fn remap_to_quad(poly: &mut ClipPolygon, overlay: &Overlay) -> Result<(), BuildFault> {
    for v in &mut poly.verts {
        let st = inverse_bilinear(v.pos.truncate(), overlay.uv_points)
            .ok_or(BuildFault::NonFiniteBarycentric)?;
        v.tex = [bilerp(overlay.corner_tex, st), st];
    }
    Ok(())
}

/// Clip an overlay against one planar surface.
///
/// `lightmap` maps a world point on the surface to its lightmap coordinate.
/// Returns `Ok(None)` when the overlay misses the surface.
pub fn clip_to_surface(
    overlay: &Overlay,
    surface: &SurfaceGeometry<'_>,
    lightmap: impl Fn(Vec3) -> Vec2,
) -> Result<Option<Vec<FragmentVertex>>, BuildFault> {
    let local: Vec<Vec3> = surface
        .vertices
        .iter()
        .map(|&p| overlay.basis.to_local(p))
        .collect();
    let Some(mut poly) = clip_quad_to_polygon(overlay.quad_polygon(), &local) else {
        return Ok(None);
    };
    remap_to_quad(&mut poly, overlay)?;

    let normal = surface.plane.normal;
    let mut verts = Vec::with_capacity(poly.len());
    for v in &poly.verts {
        let in_plane = overlay.basis.to_world(v.pos.truncate());
        let t = surface
            .plane
            .intersect_ray(in_plane, overlay.basis.normal)
            .ok_or(BuildFault::ParallelProjection)?;
        let on_surface = in_plane + overlay.basis.normal * t;

        let vertex = FragmentVertex {
            pos: on_surface + normal * SURFACE_OFFSET,
            normal,
            tex: v.tex,
            lightmap: lightmap(on_surface),
            alpha: 1.0,
        };
        if !is_finite(&vertex) {
            return Err(BuildFault::NonFiniteVertex);
        }
        verts.push(vertex);
    }
    Ok(Some(verts))
}

pub(crate) fn is_finite(v: &FragmentVertex) -> bool {
    v.pos.is_finite()
        && v.normal.is_finite()
        && v.tex.iter().all(|t| t.is_finite())
        && v.lightmap.is_finite()
}
