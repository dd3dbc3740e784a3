//! Clipping an overlay against a displacement surface.
//!
//! Stage one clips the quad against the displacement's base corners exactly
//! like a planar surface, then re-expresses the survivor in the displacement's
//! grid space, where cell `(i, j)` spans `[i, i+1] x [j, j+1]`. Stage two
//! chops that polygon along the grid: vertical lines, horizontal lines, then
//! the two diagonal families. Each resulting piece is mapped back to world
//! space through the displacement's own uv function.

use crate::clip::{clip_polygon, ClipPolygon};
use crate::error::BuildFault;
use crate::math::{bilerp, dominant_axis, inverse_bilinear, Plane, Vec2, Vec3};
use crate::overlay::Overlay;
use crate::pool::FragmentVertex;
use crate::surface_clip::{clip_quad_to_polygon, is_finite, remap_to_quad, SURFACE_OFFSET};
use crate::world::{CellDiagonal, DisplacementSurface};

const CORNER_EPSILON: f32 = 1e-3;

/// Clip an overlay against a displacement, returning one vertex list per piece.
pub fn clip_to_displacement(
    overlay: &Overlay,
    disp: &dyn DisplacementSurface,
) -> Result<Vec<Vec<FragmentVertex>>, BuildFault> {
    let side = disp.side_length().max(1);
    let Some(grid_poly) = base_fragment(overlay, disp, side)? else {
        return Ok(Vec::new());
    };

    let mut fragments = Vec::new();
    for piece in split_into_cells(grid_poly, side, |x, y| disp.cell_diagonal(x, y)) {
        if let Some(verts) = to_world(&piece, overlay, disp, side)? {
            fragments.push(verts);
        }
    }
    Ok(fragments)
}

/// Stage one: the part of the quad over the displacement, in grid space.
fn base_fragment(
    overlay: &Overlay,
    disp: &dyn DisplacementSurface,
    side: usize,
) -> Result<Option<ClipPolygon>, BuildFault> {
    let corners_local = disp.corners().map(|c| overlay.basis.to_local(c));
    let Some(mut poly) = clip_quad_to_polygon(overlay.quad_polygon(), &corners_local) else {
        return Ok(None);
    };
    remap_to_quad(&mut poly, overlay)?;

    let corners_2d = corners_local.map(|c| c.truncate());
    let scale = side as f32;
    for v in &mut poly.verts {
        let uv = inverse_bilinear(v.pos.truncate(), corners_2d)
            .ok_or(BuildFault::NonFiniteBarycentric)?;
        let uv = uv.clamp(Vec2::ZERO, Vec2::ONE);
        v.pos = (uv * scale).extend(0.0);
    }
    Ok(Some(poly))
}

/// Stage two: chop a grid-space polygon into per-cell, per-triangle pieces.
///
/// Every split keeps both halves. A piece that covers its whole cell is left
/// as a quad, rotated so its fan diagonal is the cell's own diagonal.
pub fn split_into_cells(
    poly: ClipPolygon,
    side: usize,
    diagonal: impl Fn(usize, usize) -> CellDiagonal,
) -> Vec<ClipPolygon> {
    let mut pieces = vec![poly];

    for k in 1..side {
        let plane = Plane::new(Vec3::X, k as f32);
        pieces = split_all(pieces, &plane, |_| true);
    }
    for k in 1..side {
        let plane = Plane::new(Vec3::Y, k as f32);
        pieces = split_all(pieces, &plane, |_| true);
    }

    // Rising diagonals: x - y = k through cells with i - j == k.
    let rising = Vec3::new(1.0, -1.0, 0.0).normalize();
    let side_i = side as i64;
    for k in -(side_i - 1)..side_i {
        let plane = Plane::new(rising, k as f32 * rising.x);
        pieces = split_all(pieces, &plane, |piece| {
            let (i, j) = cell_of(piece, side);
            i as i64 - j as i64 == k
                && diagonal(i, j) == CellDiagonal::Rising
                && !covers_cell(piece, i, j)
        });
    }

    // Falling diagonals: x + y = k through cells with i + j + 1 == k.
    let falling = Vec3::new(1.0, 1.0, 0.0).normalize();
    for k in 1..2 * side_i {
        let plane = Plane::new(falling, k as f32 * falling.x);
        pieces = split_all(pieces, &plane, |piece| {
            let (i, j) = cell_of(piece, side);
            (i + j + 1) as i64 == k
                && diagonal(i, j) == CellDiagonal::Falling
                && !covers_cell(piece, i, j)
        });
    }

    for piece in &mut pieces {
        let (i, j) = cell_of(piece, side);
        if covers_cell(piece, i, j) {
            let start = match diagonal(i, j) {
                CellDiagonal::Rising => Vec2::new(i as f32, j as f32),
                CellDiagonal::Falling => Vec2::new(i as f32 + 1.0, j as f32),
            };
            if let Some(at) = piece
                .verts
                .iter()
                .position(|v| (v.pos.truncate() - start).length() < CORNER_EPSILON)
            {
                piece.verts.rotate_left(at);
            } else {
                // Start from the other end of the same diagonal.
                let opposite = Vec2::new(2.0 * i as f32 + 1.0, 2.0 * j as f32 + 1.0) - start;
                if let Some(at) = piece
                    .verts
                    .iter()
                    .position(|v| (v.pos.truncate() - opposite).length() < CORNER_EPSILON)
                {
                    piece.verts.rotate_left(at);
                }
            }
        }
    }
    pieces
}

fn split_all(
    pieces: Vec<ClipPolygon>,
    plane: &Plane,
    applies: impl Fn(&ClipPolygon) -> bool,
) -> Vec<ClipPolygon> {
    let mut out = Vec::with_capacity(pieces.len() + 1);
    for piece in pieces {
        if !applies(&piece) {
            out.push(piece);
            continue;
        }
        let split = clip_polygon(&piece, plane);
        out.extend(split.front);
        out.extend(split.back);
    }
    out
}

/// Grid cell a piece belongs to, taken from its centroid.
fn cell_of(piece: &ClipPolygon, side: usize) -> (usize, usize) {
    let c = piece.centroid();
    let clamp = |v: f32| (v.floor().max(0.0) as usize).min(side - 1);
    (clamp(c.x), clamp(c.y))
}

fn covers_cell(piece: &ClipPolygon, i: usize, j: usize) -> bool {
    if piece.len() != 4 {
        return false;
    }
    let (x, y) = (i as f32, j as f32);
    [
        Vec2::new(x, y),
        Vec2::new(x + 1.0, y),
        Vec2::new(x + 1.0, y + 1.0),
        Vec2::new(x, y + 1.0),
    ]
    .iter()
    .all(|corner| {
        piece
            .positions()
            .any(|p| (p.truncate() - *corner).length() < CORNER_EPSILON)
    })
}

/// Map a grid-space piece to world space.
fn to_world(
    piece: &ClipPolygon,
    overlay: &Overlay,
    disp: &dyn DisplacementSurface,
    side: usize,
) -> Result<Option<Vec<FragmentVertex>>, BuildFault> {
    if piece.len() < 3 {
        return Ok(None);
    }
    let scale = side as f32;
    let lightmap_corners = disp.corner_lightmap_coords();
    let lift = overlay.basis.normal * SURFACE_OFFSET;

    let mut verts: Vec<FragmentVertex> = piece
        .verts
        .iter()
        .map(|v| {
            let uv = v.pos.truncate() / scale;
            FragmentVertex {
                pos: disp.uv_to_world(uv),
                normal: Vec3::ZERO,
                tex: v.tex,
                lightmap: bilerp(lightmap_corners, uv),
                alpha: 1.0,
            }
        })
        .collect();

    let face = (verts[1].pos - verts[0].pos).cross(verts[2].pos - verts[0].pos);
    let mut normal = face.normalize_or_zero();
    if normal.length() < 0.5 {
        normal = dominant_axis(overlay.basis.normal);
    }
    if normal.dot(overlay.basis.normal) < 0.0 {
        // Keep the first vertex so a whole-cell quad keeps its fan diagonal.
        verts[1..].reverse();
        normal = -normal;
    }

    for v in &mut verts {
        v.pos += lift;
        v.normal = normal;
        if !is_finite(v) {
            return Err(BuildFault::NonFiniteVertex);
        }
    }
    Ok(Some(verts))
}
