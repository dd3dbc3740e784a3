use std::ops::{Add, Mul};

pub use glam::{Vec2, Vec3};

/// Distance below which a point is treated as lying on a clip plane.
pub const CLIP_EPSILON: f32 = 1e-4;

/// Plane in normal/distance form: points `p` with `normal.dot(p) == dist`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f32,
}

impl Plane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self { normal, dist }
    }

    /// Plane through `point` facing along `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            dist: normal.dot(point),
        }
    }

    /// Plane through three points, facing along `(b - a) x (c - a)`.
    ///
    /// Returns `None` when the points are collinear.
    pub fn from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<Self> {
        let normal = (b - a).cross(c - a);
        let len = normal.length();
        if len <= f32::EPSILON {
            return None;
        }
        Some(Self::from_point_normal(a, normal / len))
    }

    /// Signed distance from the plane (positive on the side the normal points to).
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }

    /// Returns the same plane facing the other way.
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            dist: -self.dist,
        }
    }

    /// Parameter `t` where the ray `origin + dir * t` meets the plane.
    pub fn intersect_ray(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let denom = self.normal.dot(dir);
        if denom.abs() <= 1e-6 {
            return None;
        }
        Some((self.dist - self.normal.dot(origin)) / denom)
    }
}

/// Area of the triangle `abc`.
pub fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    0.5 * (b - a).cross(c - a).length()
}

/// Area of a convex polygon, triangulated as a fan from its first vertex.
pub fn fan_area(points: &[Vec3]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    points
        .windows(2)
        .skip(1)
        .map(|pair| triangle_area(points[0], pair[0], pair[1]))
        .sum()
}

/// Unit vector perpendicular to `normal`.
pub fn any_perpendicular(normal: Vec3) -> Vec3 {
    let axis = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    normal.cross(axis).normalize_or_zero()
}

/// Signed unit axis closest to `dir`, or +Z for a zero vector.
pub fn dominant_axis(dir: Vec3) -> Vec3 {
    let abs = dir.abs();
    if abs.x >= abs.y && abs.x >= abs.z && abs.x > 0.0 {
        Vec3::X * dir.x.signum()
    } else if abs.y >= abs.z && abs.y > 0.0 {
        Vec3::Y * dir.y.signum()
    } else if abs.z > 0.0 {
        Vec3::Z * dir.z.signum()
    } else {
        Vec3::Z
    }
}

fn cross2(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Bilinear blend of four corner values.
///
/// Corners are ordered `(0,0), (1,0), (1,1), (0,1)` in `st` space.
pub fn bilerp<T>(corners: [T; 4], st: Vec2) -> T
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    let (s, t) = (st.x, st.y);
    corners[0] * ((1.0 - s) * (1.0 - t))
        + corners[1] * (s * (1.0 - t))
        + corners[2] * (s * t)
        + corners[3] * ((1.0 - s) * t)
}

/// Finds `st` such that `bilerp(quad, st) == point`.
///
/// Works for any convex quad, including ones that are not parallelograms.
/// Returns `None` when the quad is degenerate around `point` or the solve
/// goes non-finite.
pub fn inverse_bilinear(point: Vec2, quad: [Vec2; 4]) -> Option<Vec2> {
    let e = quad[1] - quad[0];
    let f = quad[3] - quad[0];
    let g = quad[0] - quad[1] + quad[2] - quad[3];
    let h = point - quad[0];

    let k2 = cross2(g, f);
    let k1 = cross2(e, f) + cross2(h, g);
    let k0 = cross2(h, e);

    let st = if k2.abs() <= 1e-6 * k1.abs() {
        // Opposite edges are parallel: the quadratic collapses to a line.
        let t = -k0 / k1;
        Vec2::new(solve_s(h, e, f, g, t), t)
    } else {
        let disc = k1 * k1 - 4.0 * k0 * k2;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let inv = 0.5 / k2;
        let t1 = (-k1 - root) * inv;
        let t2 = (-k1 + root) * inv;
        let a = Vec2::new(solve_s(h, e, f, g, t1), t1);
        let b = Vec2::new(solve_s(h, e, f, g, t2), t2);
        if outside_unit(a) <= outside_unit(b) {
            a
        } else {
            b
        }
    };

    st.is_finite().then_some(st)
}

fn solve_s(h: Vec2, e: Vec2, f: Vec2, g: Vec2, t: f32) -> f32 {
    let dx = e.x + g.x * t;
    let dy = e.y + g.y * t;
    if dx.abs() >= dy.abs() {
        (h.x - f.x * t) / dx
    } else {
        (h.y - f.y * t) / dy
    }
}

/// How far `st` lies outside the unit square (zero when inside).
fn outside_unit(st: Vec2) -> f32 {
    if !st.is_finite() {
        return f32::INFINITY;
    }
    let below = (-st).max(Vec2::ZERO);
    let above = (st - Vec2::ONE).max(Vec2::ZERO);
    below.x + below.y + above.x + above.y
}
