//! Rigid body state and integration.

use glam::{Mat3, Quat, Vec3};
use tracing::warn;

use crate::error::PhysicsError;

use super::collider::Collider;

/// Stable handle of a body owned by a [`PhysicsEngine`](super::PhysicsEngine).
///
/// Ids are handed out in insertion order, so they also sort bodies the way
/// the engine iterates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// Rigid body type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigidBodyType {
    /// Affected by forces and collisions.
    Dynamic,
    /// Immovable.
    Static,
    /// Moves with its own velocity, but has infinite mass.
    Kinematic,
}

/// A rigid body with its collider.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub(crate) id: BodyId,
    pub body_type: RigidBodyType,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Linear damping per second (default: 0.01).
    pub linear_damping: f32,
    /// Angular damping per second (default: 0.01).
    pub angular_damping: f32,
    /// Coefficient of restitution (0.0 - 1.0).
    pub restitution: f32,
    /// Friction coefficient below which contacts stick.
    pub static_friction: f32,
    /// Friction coefficient applied while sliding.
    pub dynamic_friction: f32,
    /// Gravity scale (default: 1.0).
    pub gravity_scale: f32,
    inverse_mass: f32,
    inverse_inertia_local: Mat3,
    inverse_inertia_world: Mat3,
    force_accumulator: Vec3,
    torque_accumulator: Vec3,
    velocity_accumulator: Vec3,
    angular_velocity_accumulator: Vec3,
    collider: Collider,
}

impl RigidBody {
    fn with_type(body_type: RigidBodyType, collider: Collider) -> Self {
        let mut body = Self {
            id: BodyId(u32::MAX),
            body_type,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            restitution: 0.3,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            gravity_scale: 0.0,
            inverse_mass: 0.0,
            inverse_inertia_local: Mat3::ZERO,
            inverse_inertia_world: Mat3::ZERO,
            force_accumulator: Vec3::ZERO,
            torque_accumulator: Vec3::ZERO,
            velocity_accumulator: Vec3::ZERO,
            angular_velocity_accumulator: Vec3::ZERO,
            collider,
        };
        body.calculate_derived_data();
        body
    }

    /// Create a new dynamic rigid body with the given mass.
    ///
    /// The inertia tensor is derived from the collider shape.
    pub fn new_dynamic(collider: Collider, mass: f32) -> Result<Self, PhysicsError> {
        if collider.is_plane() {
            return Err(PhysicsError::DynamicPlane);
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(PhysicsError::InvalidMass(mass));
        }

        let inertia = collider.inertia_tensor(mass);
        let inverse_inertia_local = if inertia.determinant().abs() > f32::EPSILON {
            inertia.inverse()
        } else {
            warn!(?collider.shape, mass, "singular inertia tensor, body will not rotate");
            Mat3::ZERO
        };

        let mut body = Self::with_type(RigidBodyType::Dynamic, collider);
        body.inverse_mass = 1.0 / mass;
        body.inverse_inertia_local = inverse_inertia_local;
        body.linear_damping = 0.01;
        body.angular_damping = 0.01;
        body.gravity_scale = 1.0;
        body.calculate_derived_data();
        Ok(body)
    }

    /// Create a new static rigid body.
    pub fn new_static(collider: Collider) -> Self {
        Self::with_type(RigidBodyType::Static, collider)
    }

    /// Create a new kinematic rigid body.
    pub fn new_kinematic(collider: Collider) -> Self {
        Self::with_type(RigidBodyType::Kinematic, collider)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self.calculate_derived_data();
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation.normalize();
        self.calculate_derived_data();
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_material(mut self, restitution: f32, static_friction: f32, dynamic_friction: f32) -> Self {
        self.restitution = restitution;
        self.static_friction = static_friction;
        self.dynamic_friction = dynamic_friction;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    #[inline]
    pub fn id(&self) -> BodyId {
        self.id
    }

    #[inline]
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Mass of the body; infinite for static and kinematic bodies.
    pub fn mass(&self) -> f32 {
        if self.inverse_mass > 0.0 {
            1.0 / self.inverse_mass
        } else {
            f32::INFINITY
        }
    }

    #[inline]
    pub fn inverse_inertia_world(&self) -> Mat3 {
        self.inverse_inertia_world
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == RigidBodyType::Dynamic && self.inverse_mass > 0.0
    }

    /// Add a force through the center of mass for the next integration.
    pub fn apply_force(&mut self, force: Vec3) {
        self.force_accumulator += force;
    }

    /// Add a force applied at a world-space point.
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        self.force_accumulator += force;
        self.torque_accumulator += (point - self.position).cross(force);
    }

    pub fn apply_torque(&mut self, torque: Vec3) {
        self.torque_accumulator += torque;
    }

    /// Queue an impulse applied at a world-space point.
    ///
    /// The velocity change is held back until [`flush_impulses`](Self::flush_impulses),
    /// so every contact of a step sees the same pre-impulse velocities.
    pub fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        if !self.is_dynamic() {
            return;
        }
        self.velocity_accumulator += impulse * self.inverse_mass;
        self.angular_velocity_accumulator +=
            self.inverse_inertia_world * (point - self.position).cross(impulse);
    }

    /// Apply queued impulses to the velocities.
    pub fn flush_impulses(&mut self) {
        self.linear_velocity += self.velocity_accumulator;
        self.angular_velocity += self.angular_velocity_accumulator;
        self.velocity_accumulator = Vec3::ZERO;
        self.angular_velocity_accumulator = Vec3::ZERO;
    }

    /// Clear force and torque accumulators.
    pub fn clear_accumulators(&mut self) {
        self.force_accumulator = Vec3::ZERO;
        self.torque_accumulator = Vec3::ZERO;
    }

    /// Recompute the world inverse inertia tensor and the collider transform.
    pub fn calculate_derived_data(&mut self) {
        self.orientation = self.orientation.normalize();
        let rotation = Mat3::from_quat(self.orientation);
        self.inverse_inertia_world =
            rotation * self.inverse_inertia_local * rotation.transpose();
        self.collider
            .update_transform(self.position, self.orientation);
    }

    /// Semi-implicit Euler step: velocities from the accumulated forces,
    /// then positions from the new velocities.
    pub fn integrate(&mut self, dt: f32) {
        match self.body_type {
            RigidBodyType::Static => return,
            RigidBodyType::Dynamic if self.inverse_mass > 0.0 => {
                self.linear_velocity += self.force_accumulator * self.inverse_mass * dt;
                self.angular_velocity += self.inverse_inertia_world * self.torque_accumulator * dt;

                self.linear_velocity *= (1.0 - self.linear_damping * dt).max(0.0);
                self.angular_velocity *= (1.0 - self.angular_damping * dt).max(0.0);
            }
            _ => {}
        }

        self.position += self.linear_velocity * dt;

        // q' = q + 0.5 * dt * omega_quat * q
        let omega = self.angular_velocity;
        if omega.length_squared() > 1e-10 {
            let omega_quat = Quat::from_xyzw(omega.x, omega.y, omega.z, 0.0);
            let q_dot = omega_quat * self.orientation * 0.5;
            self.orientation = Quat::from_xyzw(
                self.orientation.x + q_dot.x * dt,
                self.orientation.y + q_dot.y * dt,
                self.orientation.z + q_dot.z * dt,
                self.orientation.w + q_dot.w * dt,
            )
            .normalize();
        }
    }

    /// Velocity of the material point at a world-space position.
    #[inline]
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.position)
    }

    #[inline]
    pub fn local_to_world(&self, point: Vec3) -> Vec3 {
        self.position + self.orientation * point
    }

    #[inline]
    pub fn world_to_local(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }
}
