//! Narrowphase collision detection: per-pair dispatch to plane, sphere and
//! GJK/EPA tests.

use glam::Vec3;
use tracing::debug;

use super::collider::ColliderShape;
use super::contact::{CollisionData, Contact};
use super::epa::{self, epa_penetration};
use super::gjk::{self, gjk_intersection};
use super::rigid_body::RigidBody;
use super::PhysicsConfig;

/// Builds a [`CollisionData`] for a pair of bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionDetector {
    pub gjk_max_iterations: u32,
    pub epa_max_iterations: u32,
    pub epa_tolerance: f32,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self {
            gjk_max_iterations: gjk::DEFAULT_MAX_ITERATIONS,
            epa_max_iterations: epa::DEFAULT_MAX_ITERATIONS,
            epa_tolerance: epa::DEFAULT_TOLERANCE,
        }
    }
}

impl CollisionDetector {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            gjk_max_iterations: config.gjk_max_iterations,
            epa_max_iterations: config.epa_max_iterations,
            epa_tolerance: config.epa_tolerance,
        }
    }

    /// Detect contacts between `a` and `b`.
    ///
    /// The returned manifold keeps the argument order (`body_a == a.id()`)
    /// and holds at least one contact. Touching or separated pairs, and
    /// pairs whose GJK/EPA query failed, yield `None`.
    pub fn detect(&self, a: &RigidBody, b: &RigidBody) -> Option<CollisionData> {
        let plane_a = a.collider().world_plane_normal();
        let plane_b = b.collider().world_plane_normal();

        let data = match (plane_a, plane_b) {
            (Some(_), Some(_)) => return None,
            (None, Some(normal)) => plane_contacts(a, b, normal),
            (Some(normal), None) => plane_contacts(b, a, normal).flipped(),
            (None, None) => match (&a.collider().shape, &b.collider().shape) {
                (ColliderShape::Sphere { radius: ra }, ColliderShape::Sphere { radius: rb }) => {
                    sphere_sphere(a, *ra, b, *rb)
                }
                _ => self.convex_convex(a, b),
            },
        };

        (!data.contacts.is_empty()).then_some(data)
    }

    /// General convex pair: GJK followed by EPA. Produces at most one contact.
    fn convex_convex(&self, a: &RigidBody, b: &RigidBody) -> CollisionData {
        let mut data = CollisionData::new(a.id(), b.id());
        let (ca, cb) = (a.collider(), b.collider());

        let simplex = match gjk_intersection(ca, cb, self.gjk_max_iterations) {
            Ok(Some(simplex)) => simplex,
            Ok(None) => return data,
            Err(err) => {
                debug!(body_a = ?a.id(), body_b = ?b.id(), %err, "skipping pair");
                return data;
            }
        };

        match epa_penetration(&simplex, ca, cb, self.epa_max_iterations, self.epa_tolerance) {
            Ok(hit) if hit.depth > 0.0 => {
                data.contacts.push(Contact::new(
                    a,
                    b,
                    hit.point_a,
                    hit.point_b,
                    hit.normal,
                    hit.depth,
                ));
            }
            Ok(hit) => {
                debug!(
                    body_a = ?a.id(),
                    body_b = ?b.id(),
                    depth = hit.depth,
                    "zero-depth penetration, skipping pair"
                );
            }
            Err(err) => {
                debug!(body_a = ?a.id(), body_b = ?b.id(), %err, "skipping pair");
            }
        }
        data
    }
}

/// Analytic sphere-sphere test.
fn sphere_sphere(a: &RigidBody, radius_a: f32, b: &RigidBody, radius_b: f32) -> CollisionData {
    let mut data = CollisionData::new(a.id(), b.id());
    let center_a = a.collider().center();
    let center_b = b.collider().center();

    let diff = center_a - center_b;
    let dist_sq = diff.length_squared();
    let min_dist = radius_a + radius_b;
    if dist_sq >= min_dist * min_dist {
        return data;
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 { diff / dist } else { Vec3::Y };
    let penetration = min_dist - dist;
    let world_a = center_a - normal * radius_a;
    let world_b = center_b + normal * radius_b;

    data.contacts
        .push(Contact::new(a, b, world_a, world_b, normal, penetration));
    data
}

/// Contacts of a convex body against a static plane. The convex body is A,
/// so every normal equals the plane normal.
///
/// Polyhedral shapes contribute each vertex below the plane; curved shapes
/// their deepest point (both cap spheres for capsules).
fn plane_contacts(convex: &RigidBody, plane: &RigidBody, normal: Vec3) -> CollisionData {
    let mut data = CollisionData::new(convex.id(), plane.id());
    let origin = plane.collider().center();
    let collider = convex.collider();

    let candidates = match (&collider.shape, collider.world_vertices()) {
        (_, Some(vertices)) => vertices,
        (
            ColliderShape::Capsule {
                radius,
                half_height,
            },
            None,
        ) => {
            let to_world = collider.world_transform();
            [*half_height, -*half_height]
                .into_iter()
                .map(|y| to_world.transform_point3(Vec3::new(0.0, y, 0.0)) - normal * *radius)
                .collect()
        }
        (_, None) => vec![collider.support_point(-normal)],
    };

    for point in candidates {
        let distance = (point - origin).dot(normal);
        if distance < 0.0 {
            let world_b = point - normal * distance;
            data.contacts
                .push(Contact::new(convex, plane, point, world_b, normal, -distance));
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::Collider;
    use crate::physics::rigid_body::BodyId;
    use glam::Quat;

    fn dynamic(id: u32, collider: Collider, position: Vec3) -> RigidBody {
        let mut body = RigidBody::new_dynamic(collider, 1.0)
            .unwrap()
            .with_position(position);
        body.id = BodyId(id);
        body
    }

    fn ground(id: u32) -> RigidBody {
        let mut body = RigidBody::new_static(Collider::plane(Vec3::Y).unwrap());
        body.id = BodyId(id);
        body
    }

    fn assert_consistent(data: &CollisionData) {
        for c in &data.contacts {
            assert!(c.penetration > 0.0);
            assert!((c.normal.length() - 1.0).abs() < 1e-4);
            let recomputed = (c.world_b - c.world_a).dot(c.normal);
            assert!((recomputed - c.penetration).abs() < 1e-3, "{c:?}");
        }
    }

    #[test]
    fn test_sphere_sphere_intersection() {
        let a = dynamic(0, Collider::sphere(1.0).unwrap(), Vec3::ZERO);
        let b = dynamic(1, Collider::sphere(1.0).unwrap(), Vec3::new(1.5, 0.0, 0.0));

        let data = CollisionDetector::default().detect(&a, &b).unwrap();
        assert_eq!(data.num_contacts(), 1);
        let contact = data.contacts[0];
        let eps = 1e-4;
        // Normal points toward A.
        assert!((contact.normal - Vec3::NEG_X).length() < eps);
        assert!((contact.penetration - 0.5).abs() < eps);
        assert_consistent(&data);
    }

    #[test]
    fn test_sphere_sphere_no_intersection() {
        let a = dynamic(0, Collider::sphere(1.0).unwrap(), Vec3::ZERO);
        let b = dynamic(1, Collider::sphere(1.0).unwrap(), Vec3::new(3.0, 0.0, 0.0));
        assert!(CollisionDetector::default().detect(&a, &b).is_none());
    }

    #[test]
    fn test_box_resting_on_plane_has_four_contacts() {
        let cube = dynamic(0, Collider::cuboid(Vec3::splat(0.5)).unwrap(), Vec3::new(0.0, 0.49, 0.0));
        let floor = ground(1);

        let data = CollisionDetector::default().detect(&cube, &floor).unwrap();
        assert_eq!(data.body_a, BodyId(0));
        assert_eq!(data.num_contacts(), 4);
        for c in &data.contacts {
            assert_eq!(c.normal, Vec3::Y);
            assert!((c.penetration - 0.01).abs() < 1e-5);
        }
        assert_consistent(&data);
    }

    #[test]
    fn test_plane_first_keeps_argument_order() {
        let cube = dynamic(1, Collider::cuboid(Vec3::splat(0.5)).unwrap(), Vec3::new(0.0, 0.49, 0.0));
        let floor = ground(0);

        let data = CollisionDetector::default().detect(&floor, &cube).unwrap();
        assert_eq!(data.body_a, BodyId(0));
        for c in &data.contacts {
            assert_eq!(c.normal, Vec3::NEG_Y);
        }
        assert_consistent(&data);
    }

    #[test]
    fn test_sphere_on_plane() {
        let ball = dynamic(0, Collider::sphere(0.5).unwrap(), Vec3::new(2.0, 0.4, -1.0));
        let data = CollisionDetector::default().detect(&ball, &ground(1)).unwrap();
        assert_eq!(data.num_contacts(), 1);
        let c = data.contacts[0];
        assert!((c.world_a - Vec3::new(2.0, -0.1, -1.0)).length() < 1e-5);
        assert!((c.world_b - Vec3::new(2.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_capsule_lying_on_plane_touches_with_both_caps() {
        let capsule = Collider::new(ColliderShape::Capsule {
            radius: 0.25,
            half_height: 1.0,
        })
        .unwrap();
        let body = RigidBody::new_dynamic(capsule, 1.0)
            .unwrap()
            .with_position(Vec3::new(0.0, 0.2, 0.0))
            .with_orientation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));

        let data = CollisionDetector::default().detect(&body, &ground(1)).unwrap();
        assert_eq!(data.num_contacts(), 2);
        assert_consistent(&data);
    }

    #[test]
    fn test_plane_pair_is_ignored() {
        assert!(CollisionDetector::default()
            .detect(&ground(0), &ground(1))
            .is_none());
    }

    #[test]
    fn test_gjk_epa_box_pair() {
        let a = dynamic(0, Collider::cuboid(Vec3::splat(1.0)).unwrap(), Vec3::ZERO);
        let b = dynamic(1, Collider::cuboid(Vec3::splat(1.0)).unwrap(), Vec3::new(1.5, 0.2, 0.1));

        let data = CollisionDetector::default().detect(&a, &b).unwrap();
        assert_eq!(data.num_contacts(), 1);
        let c = data.contacts[0];
        assert!((c.penetration - 0.5).abs() < 1e-3);
        assert!((c.normal - Vec3::NEG_X).length() < 1e-3);
        assert_consistent(&data);

        let apart = dynamic(1, Collider::cuboid(Vec3::splat(1.0)).unwrap(), Vec3::new(2.5, 0.0, 0.0));
        assert!(CollisionDetector::default().detect(&a, &apart).is_none());
    }

    #[test]
    fn test_failed_query_skips_pair() {
        let a = dynamic(0, Collider::cuboid(Vec3::splat(1.0)).unwrap(), Vec3::ZERO);
        let b = dynamic(1, Collider::cuboid(Vec3::splat(1.0)).unwrap(), Vec3::new(1.5, 0.2, 0.1));
        let detector = CollisionDetector {
            epa_max_iterations: 0,
            ..CollisionDetector::default()
        };
        assert!(detector.detect(&a, &b).is_none());
    }
}
