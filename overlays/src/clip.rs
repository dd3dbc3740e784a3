//! Convex polygon clipping against a single plane (Sutherland-Hodgman split).
//!
//! Every clipper in the crate funnels through [`clip_polygon`]. Polygons carry
//! two texture-coordinate pairs that are interpolated at split points along with
//! the position.

use crate::math::{Plane, Vec2, Vec3, CLIP_EPSILON};

/// Polygon vertex as seen by the clipper.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClipVertex {
    pub pos: Vec3,
    pub tex: [Vec2; 2],
}

impl ClipVertex {
    pub fn new(pos: Vec3) -> Self {
        Self {
            pos,
            tex: [Vec2::ZERO; 2],
        }
    }

    pub fn with_tex(pos: Vec3, tex0: Vec2, tex1: Vec2) -> Self {
        Self {
            pos,
            tex: [tex0, tex1],
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            pos: self.pos.lerp(other.pos, t),
            tex: [
                self.tex[0].lerp(other.tex[0], t),
                self.tex[1].lerp(other.tex[1], t),
            ],
        }
    }
}

/// Convex polygon with vertices in winding order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClipPolygon {
    pub verts: Vec<ClipVertex>,
}

impl ClipPolygon {
    pub fn new(verts: Vec<ClipVertex>) -> Self {
        Self { verts }
    }

    /// Polygon with zeroed texture coordinates.
    pub fn from_positions(points: &[Vec3]) -> Self {
        Self {
            verts: points.iter().copied().map(ClipVertex::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.verts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verts.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.verts.iter().map(|v| v.pos)
    }

    /// Average of the vertex positions.
    pub fn centroid(&self) -> Vec3 {
        if self.verts.is_empty() {
            return Vec3::ZERO;
        }
        self.positions().sum::<Vec3>() / self.verts.len() as f32
    }
}

/// Which side of a plane a point falls on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    On,
}

impl Side {
    pub fn classify(distance: f32) -> Self {
        if distance > CLIP_EPSILON {
            Side::Front
        } else if distance < -CLIP_EPSILON {
            Side::Back
        } else {
            Side::On
        }
    }
}

/// The two halves of a split. Either side may be empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Split {
    pub front: Option<ClipPolygon>,
    pub back: Option<ClipPolygon>,
}

/// Splits `poly` by `plane`.
///
/// A polygon with no vertex strictly in front goes to the back whole, and one
/// with no vertex strictly behind goes to the front whole; the empty side is
/// never allocated. Vertices within [`CLIP_EPSILON`] of the plane are emitted
/// into both halves. Halves with fewer than three vertices are dropped.
pub fn clip_polygon(poly: &ClipPolygon, plane: &Plane) -> Split {
    let dists: Vec<f32> = poly.positions().map(|p| plane.distance(p)).collect();
    let sides: Vec<Side> = dists.iter().map(|&d| Side::classify(d)).collect();

    let has_front = sides.contains(&Side::Front);
    let has_back = sides.contains(&Side::Back);
    if !has_front {
        return Split {
            front: None,
            back: keep(poly.clone()),
        };
    }
    if !has_back {
        return Split {
            front: keep(poly.clone()),
            back: None,
        };
    }

    let count = poly.len();
    let mut front = Vec::with_capacity(count + 1);
    let mut back = Vec::with_capacity(count + 1);

    for i in 0..count {
        let j = (i + 1) % count;
        let cur = &poly.verts[i];

        match sides[i] {
            Side::On => {
                front.push(*cur);
                back.push(*cur);
            }
            Side::Front => front.push(*cur),
            Side::Back => back.push(*cur),
        }

        if sides[i] == Side::On || sides[j] == Side::On || sides[i] == sides[j] {
            continue;
        }

        let t = dists[i] / (dists[i] - dists[j]);
        let split = cur.lerp(&poly.verts[j], t);
        front.push(split);
        back.push(split);
    }

    Split {
        front: keep(ClipPolygon::new(front)),
        back: keep(ClipPolygon::new(back)),
    }
}

/// Intersects `poly` with the back half-spaces of every plane in turn.
///
/// Stops as soon as nothing is left.
pub fn clip_to_back(poly: ClipPolygon, planes: &[Plane]) -> Option<ClipPolygon> {
    let mut current = keep(poly)?;
    for plane in planes {
        current = clip_polygon(&current, plane).back?;
    }
    Some(current)
}

fn keep(poly: ClipPolygon) -> Option<ClipPolygon> {
    (poly.len() >= 3).then_some(poly)
}
