//! Impulse-based contact resolution and positional correction.
//!
//! Impulses are queued on the bodies with [`RigidBody::apply_impulse`] and
//! only take effect at [`RigidBody::flush_impulses`], so every contact of a
//! sub-step is solved against the same velocities.

use super::contact::CollisionData;
use super::rigid_body::RigidBody;
use super::PhysicsConfig;

/// Queue the contact impulses of one manifold on its two bodies.
///
/// Each contact's impulse is divided by the number of contacts in the manifold.
pub fn resolve_collision(
    collision: &mut CollisionData,
    a: &mut RigidBody,
    b: &mut RigidBody,
    config: &PhysicsConfig,
) {
    let count = collision.contacts.len();
    if count == 0 || (a.inverse_mass() == 0.0 && b.inverse_mass() == 0.0) {
        return;
    }
    let share = 1.0 / count as f32;

    for contact in &mut collision.contacts {
        contact.calculate_internals();
        let impulse = if config.friction_enabled {
            contact.calculate_friction_impulse(a, b, config.restitution_enabled, config.resting_velocity)
        } else {
            contact.calculate_frictionless_impulse(a, b, config.restitution_enabled, config.resting_velocity)
        };
        let impulse = impulse * share;

        a.apply_impulse(impulse, contact.world_a);
        b.apply_impulse(-impulse, contact.world_b);
    }
}

/// Push the bodies of a manifold apart along each contact normal.
///
/// Each body moves by its share of the pair's inverse mass, so static and
/// kinematic bodies never move. Velocities are left untouched.
pub fn correct_positions(
    collision: &CollisionData,
    a: &mut RigidBody,
    b: &mut RigidBody,
    config: &PhysicsConfig,
) {
    let total_inverse_mass = a.inverse_mass() + b.inverse_mass();
    let count = collision.contacts.len();
    if count == 0 || total_inverse_mass <= 0.0 {
        return;
    }

    for contact in &collision.contacts {
        let excess = (contact.penetration - config.penetration_slop).max(0.0);
        let correction = contact.normal * (config.correction_percent * excess / count as f32);
        a.position += correction * (a.inverse_mass() / total_inverse_mass);
        b.position -= correction * (b.inverse_mass() / total_inverse_mass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collider::Collider;
    use crate::physics::contact::Contact;
    use crate::physics::rigid_body::BodyId;
    use glam::Vec3;

    fn ball(id: u32, x: f32, vx: f32) -> RigidBody {
        let mut body = RigidBody::new_dynamic(Collider::sphere(0.5).unwrap(), 1.0)
            .unwrap()
            .with_position(Vec3::new(x, 0.0, 0.0))
            .with_linear_velocity(Vec3::new(vx, 0.0, 0.0))
            .with_material(1.0, 0.0, 0.0);
        body.id = BodyId(id);
        body
    }

    fn head_on(a: &RigidBody, b: &RigidBody) -> CollisionData {
        let mut data = CollisionData::new(a.id(), b.id());
        data.contacts.push(Contact::new(
            a,
            b,
            Vec3::new(0.05, 0.0, 0.0),
            Vec3::new(-0.05, 0.0, 0.0),
            Vec3::NEG_X,
            0.1,
        ));
        data
    }

    #[test]
    fn test_resolve_exchanges_velocities() {
        let mut a = ball(0, -0.45, 2.0);
        let mut b = ball(1, 0.45, 0.0);
        let mut data = head_on(&a, &b);
        let config = PhysicsConfig::default();

        resolve_collision(&mut data, &mut a, &mut b, &config);
        // Nothing changes until the impulses are flushed.
        assert_eq!(a.linear_velocity.x, 2.0);

        a.flush_impulses();
        b.flush_impulses();
        assert!(a.linear_velocity.x.abs() < 1e-4, "{}", a.linear_velocity);
        assert!((b.linear_velocity.x - 2.0).abs() < 1e-4, "{}", b.linear_velocity);
    }

    #[test]
    fn test_resolve_splits_impulse_across_contacts() {
        let mut a = ball(0, -0.45, 2.0);
        let mut b = ball(1, 0.45, 0.0);
        let mut data = head_on(&a, &b);
        let duplicate = data.contacts[0];
        data.contacts.push(duplicate);

        resolve_collision(&mut data, &mut a, &mut b, &PhysicsConfig::default());
        a.flush_impulses();
        b.flush_impulses();
        // Two identical contacts sum to the single-contact impulse.
        assert!(a.linear_velocity.x.abs() < 1e-4);
        assert!((a.linear_velocity + b.linear_velocity - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_correct_positions_by_inverse_mass_share() {
        let mut a = ball(0, -0.45, 0.0);
        let mut b = RigidBody::new_static(Collider::sphere(0.5).unwrap())
            .with_position(Vec3::new(0.45, 0.0, 0.0));
        b.id = BodyId(1);
        let data = head_on(&a, &b);
        let config = PhysicsConfig::default();

        correct_positions(&data, &mut a, &mut b, &config);
        let expected = -0.45 - config.correction_percent * (0.1 - config.penetration_slop);
        assert!((a.position.x - expected).abs() < 1e-6, "{}", a.position);
        assert_eq!(b.position, Vec3::new(0.45, 0.0, 0.0));
        assert_eq!(a.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_correct_positions_splits_equal_masses() {
        let mut a = ball(0, -0.45, 0.0);
        let mut b = ball(1, 0.45, 0.0);
        let data = head_on(&a, &b);
        let config = PhysicsConfig::default();

        correct_positions(&data, &mut a, &mut b, &config);
        let gap = b.position.x - a.position.x;
        let expected = 0.9 + config.correction_percent * (0.1 - config.penetration_slop);
        assert!((gap - expected).abs() < 1e-5);
        assert!((a.position.x + b.position.x).abs() < 1e-6);
    }
}
