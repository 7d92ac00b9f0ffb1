//! Expanding Polytope Algorithm: penetration depth, normal and contact point
//! from a GJK simplex that encloses the origin.

use glam::Vec3;

use crate::error::CollisionError;

use super::collider::Collider;
use super::gjk::{Simplex, SupportPoint};

/// Default iteration bound for the EPA loop.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
/// Default convergence distance.
pub const DEFAULT_TOLERANCE: f32 = 1e-4;

const VOLUME_EPSILON: f32 = 1e-10;
const AREA_EPSILON: f32 = 1e-12;

/// Result of a converged EPA query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penetration {
    /// Unit contact normal, pointing from B toward A. Moving A by
    /// `normal * depth` separates the shapes.
    pub normal: Vec3,
    /// Penetration depth.
    pub depth: f32,
    /// Deepest point of A inside B, in world space.
    pub point_a: Vec3,
    /// Matching point on the surface of B.
    pub point_b: Vec3,
}

/// Triangle of the polytope, wound counter-clockwise seen from outside.
#[derive(Debug, Clone, Copy)]
struct PolytopeFace {
    vertices: [usize; 3],
    /// Outward unit normal, zero for degenerate faces.
    normal: Vec3,
    /// Signed distance from the origin along `normal`.
    distance: f32,
}

/// Convex polytope stored as an arena of vertices and faces addressed by index.
#[derive(Debug)]
struct Polytope {
    vertices: Vec<SupportPoint>,
    faces: Vec<PolytopeFace>,
    /// Horizon edges, reused across insertions.
    edges: Vec<[usize; 2]>,
}

impl Polytope {
    /// Build the initial tetrahedron, orienting each face away from the
    /// vertex it does not use.
    fn from_simplex(simplex: &Simplex) -> Result<Self, CollisionError> {
        let points = simplex.points();
        if points.len() != 4 {
            return Err(CollisionError::DegeneratePolytope);
        }

        let [a, b, c, d] = [points[0].p, points[1].p, points[2].p, points[3].p];
        let volume = (b - a).dot((c - a).cross(d - a));
        if volume.abs() <= VOLUME_EPSILON {
            return Err(CollisionError::DegeneratePolytope);
        }

        let mut polytope = Self {
            vertices: points.to_vec(),
            faces: Vec::with_capacity(32),
            edges: Vec::with_capacity(16),
        };
        for (face, opposite) in [([0, 1, 2], 3), ([0, 3, 1], 2), ([0, 2, 3], 1), ([1, 3, 2], 0)] {
            polytope.add_face_facing_away_from(face, opposite);
        }
        Ok(polytope)
    }

    fn make_face(&self, vertices: [usize; 3]) -> PolytopeFace {
        let a = self.vertices[vertices[0]].p;
        let b = self.vertices[vertices[1]].p;
        let c = self.vertices[vertices[2]].p;
        let normal = (b - a).cross(c - a);
        let len_sq = normal.length_squared();
        if len_sq <= AREA_EPSILON {
            return PolytopeFace {
                vertices,
                normal: Vec3::ZERO,
                distance: f32::INFINITY,
            };
        }
        let normal = normal / len_sq.sqrt();
        PolytopeFace {
            vertices,
            normal,
            distance: normal.dot(a),
        }
    }

    fn add_face_facing_away_from(&mut self, mut vertices: [usize; 3], opposite: usize) {
        let mut face = self.make_face(vertices);
        let to_opposite = self.vertices[opposite].p - self.vertices[vertices[0]].p;
        if face.normal.dot(to_opposite) > 0.0 {
            vertices.swap(1, 2);
            face = self.make_face(vertices);
        }
        self.faces.push(face);
    }

    /// Index of the non-degenerate face nearest to the origin.
    fn find_face_closest_origin(&self) -> Option<usize> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.distance.is_finite())
            .min_by(|(_, x), (_, y)| x.distance.total_cmp(&y.distance))
            .map(|(index, _)| index)
    }

    fn contains_point(&self, p: Vec3, tolerance: f32) -> bool {
        let tol_sq = tolerance * tolerance;
        self.vertices
            .iter()
            .any(|v| (v.p - p).length_squared() <= tol_sq)
    }

    fn can_be_seen_by(&self, face: &PolytopeFace, point: Vec3) -> bool {
        face.normal.dot(point - self.vertices[face.vertices[0]].p) > 0.0
    }

    /// The face holding the directed edge `from -> to`.
    fn face_with_edge(&self, from: usize, to: usize) -> Option<usize> {
        self.faces.iter().position(|face| {
            let [a, b, c] = face.vertices;
            (a, b) == (from, to) || (b, c) == (from, to) || (c, a) == (from, to)
        })
    }

    /// Add `point` outside face `start`.
    ///
    /// Visible faces are collected by walking face adjacency from `start`, so
    /// the removed region stays connected. The horizon must close into a
    /// single loop, otherwise the polytope is rejected.
    fn insert_point(&mut self, point: SupportPoint, start: usize) -> Result<(), CollisionError> {
        let new_index = self.vertices.len();
        self.vertices.push(point);
        self.edges.clear();

        let mut removed = vec![false; self.faces.len()];
        removed[start] = true;
        let [a, b, c] = self.faces[start].vertices;
        // Popped in winding order.
        let mut pending = vec![[c, a], [b, c], [a, b]];

        while let Some([from, to]) = pending.pop() {
            let neighbour = self
                .face_with_edge(to, from)
                .ok_or(CollisionError::DegeneratePolytope)?;
            if removed[neighbour] {
                continue;
            }

            let face = self.faces[neighbour];
            if self.can_be_seen_by(&face, point.p) {
                removed[neighbour] = true;
                let [x, y, z] = face.vertices;
                let opposite = if (x, y) == (to, from) {
                    z
                } else if (y, z) == (to, from) {
                    x
                } else {
                    y
                };
                pending.push([opposite, to]);
                pending.push([from, opposite]);
            } else {
                self.edges.push([from, to]);
            }
        }

        if !is_single_loop(&self.edges) {
            return Err(CollisionError::DegeneratePolytope);
        }

        let mut index = 0;
        self.faces.retain(|_| {
            let keep = !removed[index];
            index += 1;
            keep
        });
        for k in 0..self.edges.len() {
            let [a, b] = self.edges[k];
            let face = self.make_face([a, b, new_index]);
            self.faces.push(face);
        }
        Ok(())
    }

    /// Contact data for a converged face.
    fn penetration(&self, face: &PolytopeFace) -> Penetration {
        let [i, j, k] = face.vertices;
        let (v0, v1, v2) = (self.vertices[i], self.vertices[j], self.vertices[k]);

        let projected = face.normal * face.distance;
        let (u, v, w) = barycentric(projected, v0.p, v1.p, v2.p);
        let point_a = v0.a * u + v1.a * v + v2.a * w;

        let normal = -face.normal;
        let depth = face.distance;
        Penetration {
            normal,
            depth,
            point_a,
            point_b: point_a + normal * depth,
        }
    }
}

/// Whether the directed `edges` chain into exactly one closed loop.
fn is_single_loop(edges: &[[usize; 2]]) -> bool {
    if edges.len() < 3 {
        return false;
    }

    let first = edges[0][0];
    let mut current = first;
    for step in 1..=edges.len() {
        let mut outgoing = edges.iter().filter(|e| e[0] == current);
        let (Some(edge), None) = (outgoing.next(), outgoing.next()) else {
            return false;
        };
        current = edge[1];
        if current == first {
            return step == edges.len();
        }
    }
    false
}

/// Barycentric coordinates of `p` with respect to triangle `abc`.
///
/// Falls back to the centroid for triangles too thin to resolve.
fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= f32::EPSILON * d00 * d11 || denom == 0.0 {
        return (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (1.0 - v - w, v, w)
}

/// EPA penetration query.
///
/// `simplex` must be the tetrahedron returned by
/// [`gjk_intersection`](super::gjk::gjk_intersection) for the same pair.
/// Non-convergence within `max_iterations` is reported as
/// [`CollisionError::EpaIterationLimit`].
pub fn epa_penetration(
    simplex: &Simplex,
    a: &Collider,
    b: &Collider,
    max_iterations: u32,
    tolerance: f32,
) -> Result<Penetration, CollisionError> {
    let mut polytope = Polytope::from_simplex(simplex)?;

    for _ in 0..max_iterations {
        let closest = polytope
            .find_face_closest_origin()
            .ok_or(CollisionError::DegeneratePolytope)?;
        let face = polytope.faces[closest];
        // The origin must stay inside the polytope.
        if face.distance < 0.0 {
            return Err(CollisionError::DegeneratePolytope);
        }

        let support = SupportPoint::new(a, b, face.normal);
        let advance = support.p.dot(face.normal) - face.distance;

        if advance < tolerance || polytope.contains_point(support.p, tolerance) {
            return Ok(polytope.penetration(&face));
        }

        polytope.insert_point(support, closest)?;
    }

    Err(CollisionError::EpaIterationLimit {
        iterations: max_iterations,
    })
}
