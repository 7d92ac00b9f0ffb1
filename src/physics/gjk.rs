//! GJK intersection test on the Minkowski difference of two colliders.

use glam::Vec3;

use crate::error::CollisionError;

use super::collider::Collider;

/// Default iteration bound for the GJK loop.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Squared length below which a search direction is treated as zero.
const DEGENERATE_EPSILON: f32 = 1e-12;

/// A point of the Minkowski difference `A - B`, with the point on A that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SupportPoint {
    /// Support point on shape A.
    pub a: Vec3,
    /// `a - support_b(-direction)`.
    pub p: Vec3,
}

impl SupportPoint {
    /// Minkowski difference support function.
    #[inline]
    pub fn new(a: &Collider, b: &Collider, direction: Vec3) -> Self {
        let on_a = a.support_point(direction);
        let on_b = b.support_point(-direction);
        Self {
            a: on_a,
            p: on_a - on_b,
        }
    }

    /// The support point on shape B.
    #[inline]
    pub fn b(&self) -> Vec3 {
        self.a - self.p
    }
}

/// The simplex evolved by GJK (up to 4 vertices in 3D), most recent point first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simplex {
    points: [SupportPoint; 4],
    len: usize,
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn points(&self) -> &[SupportPoint] {
        &self.points[..self.len]
    }

    /// Insert a point in front of the others.
    pub fn push_front(&mut self, point: SupportPoint) {
        debug_assert!(self.len < 4, "simplex already holds 4 points");
        let kept = self.len.min(3);
        self.points.copy_within(0..kept, 1);
        self.points[0] = point;
        self.len = kept + 1;
    }

    fn set(&mut self, points: &[SupportPoint]) {
        self.points[..points.len()].copy_from_slice(points);
        self.len = points.len();
    }
}

/// GJK intersection test.
///
/// Returns `Ok(Some(simplex))` with a tetrahedron enclosing the origin if the
/// shapes overlap, `Ok(None)` if they are separated or exactly touching.
pub fn gjk_intersection(
    a: &Collider,
    b: &Collider,
    max_iterations: u32,
) -> Result<Option<Simplex>, CollisionError> {
    let mut direction = a.center() - b.center();
    if direction.length_squared() <= DEGENERATE_EPSILON {
        direction = Vec3::X;
    }

    let mut simplex = Simplex::new();
    let first = SupportPoint::new(a, b, direction);
    simplex.push_front(first);
    direction = -first.p;

    if direction.length_squared() <= DEGENERATE_EPSILON {
        // The origin sits on the boundary of the Minkowski difference.
        return Ok(None);
    }

    for _ in 0..max_iterations {
        let point = SupportPoint::new(a, b, direction);
        if point.p.dot(direction) <= 0.0 {
            return Ok(None);
        }
        simplex.push_front(point);

        if do_simplex(&mut simplex, &mut direction) {
            return Ok(Some(simplex));
        }

        if direction.length_squared() <= DEGENERATE_EPSILON {
            return Ok(None);
        }
    }

    Err(CollisionError::GjkIterationLimit {
        iterations: max_iterations,
    })
}

/// Boolean form of [`gjk_intersection`]. Iteration exhaustion counts as no hit.
pub fn test_intersection(a: &Collider, b: &Collider, max_iterations: u32) -> bool {
    matches!(gjk_intersection(a, b, max_iterations), Ok(Some(_)))
}

/// Reduce the simplex to the feature closest to the origin and update the
/// search direction. Returns true if the simplex encloses the origin.
fn do_simplex(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    match simplex.len() {
        2 => do_simplex_line(simplex, direction),
        3 => do_simplex_triangle(simplex, direction),
        4 => do_simplex_tetrahedron(simplex, direction),
        n => {
            debug_assert!(false, "invalid simplex size {n}");
            false
        }
    }
}

fn do_simplex_line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, ..] = simplex.points;
    let ab = b.p - a.p;
    let ao = -a.p;
    let ab_len_sq = ab.length_squared();

    if ab_len_sq > DEGENERATE_EPSILON && ab.dot(ao) > 0.0 {
        // Component of AO perpendicular to AB.
        let perpendicular = ao - ab * (ab.dot(ao) / ab_len_sq);
        *direction = if perpendicular.length_squared() > DEGENERATE_EPSILON {
            perpendicular
        } else {
            // The origin is on the segment; any normal to it will do.
            ab.any_orthonormal_vector()
        };
    } else {
        simplex.set(&[a]);
        *direction = ao;
    }
    false
}

fn do_simplex_triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, _] = simplex.points;
    let ab = b.p - a.p;
    let ac = c.p - a.p;
    let ao = -a.p;
    let abc = ab.cross(ac);

    if abc.length_squared() <= DEGENERATE_EPSILON {
        simplex.set(&[a, b]);
        return do_simplex_line(simplex, direction);
    }

    if abc.cross(ac).dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            simplex.set(&[a, c]);
        } else {
            simplex.set(&[a, b]);
        }
        return do_simplex_line(simplex, direction);
    }

    if ab.cross(abc).dot(ao) > 0.0 {
        simplex.set(&[a, b]);
        return do_simplex_line(simplex, direction);
    }

    // Origin is above or below the triangle
    if abc.dot(ao) > 0.0 {
        *direction = abc;
    } else {
        simplex.set(&[a, c, b]);
        *direction = -abc;
    }
    false
}

fn do_simplex_tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, d] = simplex.points;
    let ab = b.p - a.p;
    let ac = c.p - a.p;
    let ad = d.p - a.p;
    let ao = -a.p;

    let abc = ab.cross(ac);
    let acd = ac.cross(ad);
    let adb = ad.cross(ab);

    if abc.dot(ao) > 0.0 {
        simplex.set(&[a, b, c]);
        return do_simplex_triangle(simplex, direction);
    }
    if acd.dot(ao) > 0.0 {
        simplex.set(&[a, c, d]);
        return do_simplex_triangle(simplex, direction);
    }
    if adb.dot(ao) > 0.0 {
        simplex.set(&[a, d, b]);
        return do_simplex_triangle(simplex, direction);
    }

    // Origin is inside the tetrahedron
    true
}
