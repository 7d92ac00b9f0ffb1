//! Contact data structures and per-contact impulse math.

use glam::{Mat3, Vec3};

use super::rigid_body::{BodyId, RigidBody};

/// Maximum number of contacts kept per body pair.
pub const MAX_CONTACTS: usize = 4;

/// A single contact between two bodies.
///
/// `normal` points toward body A. `world_b` lies on the surface of B and
/// `world_a` is the deepest point of A inside B, so
/// `penetration == (world_b - world_a).dot(normal)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Contact point on A, in world space.
    pub world_a: Vec3,
    /// Contact point on B, in world space.
    pub world_b: Vec3,
    /// `world_a` in A's body space, used to re-project the contact next frame.
    pub local_a: Vec3,
    /// `world_b` in B's body space.
    pub local_b: Vec3,
    pub normal: Vec3,
    pub penetration: f32,
    /// Combined coefficient of restitution.
    pub restitution: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    /// Set once the contact has survived a refresh of the collision cache.
    pub persistent: bool,
    /// `world_a` and `world_b` as first detected. Cache refreshes measure
    /// drift against these.
    pub(crate) anchor_a: Vec3,
    pub(crate) anchor_b: Vec3,
    /// Columns: normal, tangent, bitangent.
    contact_to_world: Mat3,
}

impl Contact {
    /// Build a contact between `a` and `b`. Materials are combined by averaging.
    pub fn new(
        a: &RigidBody,
        b: &RigidBody,
        world_a: Vec3,
        world_b: Vec3,
        normal: Vec3,
        penetration: f32,
    ) -> Self {
        let mut contact = Self {
            body_a: a.id(),
            body_b: b.id(),
            world_a,
            world_b,
            local_a: a.world_to_local(world_a),
            local_b: b.world_to_local(world_b),
            normal,
            penetration,
            restitution: (a.restitution + b.restitution) * 0.5,
            static_friction: (a.static_friction + b.static_friction) * 0.5,
            dynamic_friction: (a.dynamic_friction + b.dynamic_friction) * 0.5,
            persistent: false,
            anchor_a: world_a,
            anchor_b: world_b,
            contact_to_world: Mat3::IDENTITY,
        };
        contact.calculate_internals();
        contact
    }

    /// The same contact seen from B.
    pub fn flipped(&self) -> Self {
        let mut contact = Self {
            body_a: self.body_b,
            body_b: self.body_a,
            world_a: self.world_b,
            world_b: self.world_a,
            local_a: self.local_b,
            local_b: self.local_a,
            normal: -self.normal,
            anchor_a: self.anchor_b,
            anchor_b: self.anchor_a,
            ..*self
        };
        contact.calculate_internals();
        contact
    }

    /// Rebuild the orthonormal contact basis from the normal.
    pub fn calculate_internals(&mut self) {
        let (tangent, bitangent) = self.normal.any_orthonormal_pair();
        self.contact_to_world = Mat3::from_cols(self.normal, tangent, bitangent);
    }

    #[inline]
    pub fn contact_to_world(&self) -> Mat3 {
        self.contact_to_world
    }

    /// Velocity of A relative to B at the contact, in world space.
    fn relative_velocity(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        a.velocity_at_point(self.world_a) - b.velocity_at_point(self.world_b)
    }

    /// Target change of the normal velocity: cancel the approach, plus a
    /// bounce if the bodies close faster than `resting_velocity`.
    fn desired_delta_velocity(&self, normal_velocity: f32, restitution: bool, resting_velocity: f32) -> f32 {
        let e = if restitution && -normal_velocity >= resting_velocity {
            self.restitution
        } else {
            0.0
        };
        -(1.0 + e) * normal_velocity
    }

    /// World-space impulse on A (B receives the negation) cancelling the
    /// normal approach velocity. Zero when the bodies are separating.
    pub fn calculate_frictionless_impulse(
        &self,
        a: &RigidBody,
        b: &RigidBody,
        restitution: bool,
        resting_velocity: f32,
    ) -> Vec3 {
        let normal_velocity = self.relative_velocity(a, b).dot(self.normal);
        if normal_velocity >= 0.0 {
            return Vec3::ZERO;
        }

        let r_a = self.world_a - a.position;
        let r_b = self.world_b - b.position;
        let angular_a = (a.inverse_inertia_world() * r_a.cross(self.normal)).cross(r_a);
        let angular_b = (b.inverse_inertia_world() * r_b.cross(self.normal)).cross(r_b);
        let effective = a.inverse_mass()
            + b.inverse_mass()
            + self.normal.dot(angular_a)
            + self.normal.dot(angular_b);
        if effective <= f32::EPSILON {
            return Vec3::ZERO;
        }

        let j = self.desired_delta_velocity(normal_velocity, restitution, resting_velocity) / effective;
        self.normal * j
    }

    /// Like [`calculate_frictionless_impulse`](Self::calculate_frictionless_impulse),
    /// but also removes tangential sliding.
    ///
    /// The tangential impulse is clamped per axis (a box approximation of
    /// the Coulomb cone): a contact sticks while each component stays within
    /// `static_friction * jn`, otherwise it slides with `dynamic_friction * jn`.
    pub fn calculate_friction_impulse(
        &self,
        a: &RigidBody,
        b: &RigidBody,
        restitution: bool,
        resting_velocity: f32,
    ) -> Vec3 {
        let world_to_contact = self.contact_to_world.transpose();
        let velocity = world_to_contact * self.relative_velocity(a, b);
        if velocity.x >= 0.0 {
            return Vec3::ZERO;
        }

        let r_a = self.world_a - a.position;
        let r_b = self.world_b - b.position;
        let linear = Mat3::from_diagonal(Vec3::splat(a.inverse_mass() + b.inverse_mass()));
        let angular_a = skew(r_a) * a.inverse_inertia_world() * skew(r_a);
        let angular_b = skew(r_b) * b.inverse_inertia_world() * skew(r_b);
        // Change of relative velocity per unit impulse on A.
        let world_response = linear - angular_a - angular_b;
        let response = world_to_contact * world_response * self.contact_to_world;

        if response.determinant().abs() <= f32::EPSILON {
            return self.calculate_frictionless_impulse(a, b, restitution, resting_velocity);
        }

        let target = Vec3::new(
            self.desired_delta_velocity(velocity.x, restitution, resting_velocity),
            -velocity.y,
            -velocity.z,
        );
        let mut impulse = response.inverse() * target;
        if impulse.x <= 0.0 {
            return Vec3::ZERO;
        }

        let max_static = self.static_friction * impulse.x;
        let max_dynamic = self.dynamic_friction * impulse.x;
        for tangential in [&mut impulse.y, &mut impulse.z] {
            if tangential.abs() > max_static {
                *tangential = tangential.signum() * max_dynamic;
            }
        }

        self.contact_to_world * impulse
    }
}

/// Cross-product matrix: `skew(r) * v == r.cross(v)`.
fn skew(r: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, r.z, -r.y),
        Vec3::new(-r.z, 0.0, r.x),
        Vec3::new(r.y, -r.x, 0.0),
    )
}

/// Contact manifold between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionData {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub contacts: Vec<Contact>,
    /// Whether the pair was detected during the current step.
    pub active: bool,
}

impl CollisionData {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            contacts: Vec::with_capacity(MAX_CONTACTS),
            active: true,
        }
    }

    #[inline]
    pub fn num_contacts(&self) -> usize {
        self.contacts.len()
    }

    /// The same manifold with A and B swapped.
    pub fn flipped(&self) -> Self {
        Self {
            body_a: self.body_b,
            body_b: self.body_a,
            contacts: self.contacts.iter().map(Contact::flipped).collect(),
            active: self.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::Collider;

    fn ball(id: u32, position: Vec3, velocity: Vec3) -> RigidBody {
        let mut body = RigidBody::new_dynamic(Collider::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_position(position)
            .with_linear_velocity(velocity);
        body.id = BodyId(id);
        body
    }

    /// A at x = -0.45 moving right, B at x = 0.45 at rest.
    fn head_on(speed: f32) -> (RigidBody, RigidBody, Contact) {
        let a = ball(0, Vec3::new(-0.45, 0.0, 0.0), Vec3::new(speed, 0.0, 0.0));
        let b = ball(1, Vec3::new(0.45, 0.0, 0.0), Vec3::ZERO);
        let contact = Contact::new(
            &a,
            &b,
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::new(-0.05, 0.0, 0.0),
            Vec3::NEG_X,
            0.1,
        );
        (a, b, contact)
    }

    #[test]
    fn test_contact_basis_is_orthonormal() {
        let (_, _, contact) = head_on(1.0);
        let basis = contact.contact_to_world();
        assert!((basis.x_axis - Vec3::NEG_X).length() < 1e-6);
        assert!(basis.x_axis.dot(basis.y_axis).abs() < 1e-6);
        assert!(basis.y_axis.dot(basis.z_axis).abs() < 1e-6);
        assert!((basis.determinant().abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_penetration_matches_points() {
        let (_, _, contact) = head_on(1.0);
        let recomputed = (contact.world_b - contact.world_a).dot(contact.normal);
        assert!((recomputed - contact.penetration).abs() < 1e-6);
    }

    #[test]
    fn test_frictionless_impulse_elastic() {
        let (mut a, b, mut contact) = head_on(2.0);
        a.restitution = 1.0;
        contact.restitution = 1.0;
        let impulse = contact.calculate_frictionless_impulse(&a, &b, true, 0.1);
        // Equal masses swap velocities: A loses 2 m/s along X.
        assert!((impulse - Vec3::new(-2.0, 0.0, 0.0)).length() < 1e-4, "{impulse:?}");
    }

    #[test]
    fn test_slow_contacts_do_not_bounce() {
        let (_, b, mut contact) = head_on(0.05);
        contact.restitution = 1.0;
        let a = ball(0, Vec3::new(-0.45, 0.0, 0.0), Vec3::new(0.05, 0.0, 0.0));
        let impulse = contact.calculate_frictionless_impulse(&a, &b, true, 0.1);
        // Perfectly inelastic: relative normal velocity goes to zero.
        assert!((impulse.x + 0.025).abs() < 1e-5, "{impulse:?}");
    }

    #[test]
    fn test_separating_contact_has_no_impulse() {
        let (_, b, contact) = head_on(1.0);
        let leaving = ball(0, Vec3::new(-0.45, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(contact.calculate_frictionless_impulse(&leaving, &b, true, 0.1), Vec3::ZERO);
        assert_eq!(contact.calculate_friction_impulse(&leaving, &b, true, 0.1), Vec3::ZERO);
    }

    #[test]
    fn test_friction_impulse_matches_frictionless_without_sliding() {
        let (a, b, contact) = head_on(2.0);
        let plain = contact.calculate_frictionless_impulse(&a, &b, true, 0.1);
        let with_friction = contact.calculate_friction_impulse(&a, &b, true, 0.1);
        assert!((plain - with_friction).length() < 1e-4);
    }

    #[test]
    fn test_friction_clamped_when_sliding() {
        let ground = RigidBody::new_static(Collider::cuboid(Vec3::new(5.0, 0.5, 5.0)).unwrap())
            .with_position(Vec3::new(0.0, -0.5, 0.0));
        let mut block = RigidBody::new_dynamic(Collider::cuboid(Vec3::splat(0.5)).unwrap(), 1.0)
            .unwrap()
            .with_position(Vec3::new(0.0, 0.5, 0.0))
            .with_linear_velocity(Vec3::new(10.0, -1.0, 0.0));
        block.id = BodyId(1);

        let contact = Contact::new(
            &block,
            &ground,
            Vec3::new(0.0, -0.01, 0.0),
            Vec3::ZERO,
            Vec3::Y,
            0.01,
        );
        let impulse = contact.calculate_friction_impulse(&block, &ground, false, 0.1);
        let normal = impulse.dot(Vec3::Y);
        let tangential = impulse - Vec3::Y * normal;

        assert!(normal > 0.0);
        assert!(tangential.x < 0.0, "friction must oppose sliding: {impulse:?}");
        // Each tangent axis is bounded by the dynamic coefficient.
        let bound = contact.dynamic_friction * normal * 2.0_f32.sqrt();
        assert!(tangential.length() <= bound + 1e-4, "{impulse:?}");
    }

    #[test]
    fn test_collision_data_flip_preserves_penetration() {
        let (_, _, contact) = head_on(1.0);
        let mut data = CollisionData::new(contact.body_a, contact.body_b);
        data.contacts.push(contact);

        let flipped = data.flipped();
        assert_eq!(flipped.body_a, data.body_b);
        let c = flipped.contacts[0];
        assert_eq!(c.normal, Vec3::X);
        assert!(((c.world_b - c.world_a).dot(c.normal) - contact.penetration).abs() < 1e-6);
        assert_eq!(flipped.flipped(), data);
    }
}
