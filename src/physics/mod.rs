//! CPU rigid body simulation with GJK/EPA collision detection and
//! persistent contact manifolds.
//!
//! # Architecture
//!
//! [`PhysicsEngine::simulate`] splits the frame into `num_iterations`
//! sub-steps. Each sub-step:
//!
//! 1. Apply forces (gravity) and integrate
//! 2. Refresh cached contact manifolds
//! 3. Narrowphase collision detection for every pair (no broadphase)
//! 4. Resolve contacts with impulses, then flush them
//! 5. Positional correction
//! 6. Synchronize derived data, mark manifolds for the next sub-step

pub mod collider;
pub mod collision_cache;
pub mod contact;
pub mod epa;
pub mod gjk;
pub mod narrowphase;
pub mod rigid_body;
pub mod solver;

use glam::{Mat3, Vec3};
use tracing::{debug, trace, warn};

use crate::error::PhysicsError;

use self::collision_cache::CollisionCache;
use self::contact::{CollisionData, MAX_CONTACTS};
use self::narrowphase::CollisionDetector;
use self::rigid_body::{BodyId, RigidBody};

/// Configuration for the physics simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsConfig {
    /// Gravity vector. Default: (0, -9.81, 0).
    pub gravity: Vec3,
    /// Sub-steps per call to [`PhysicsEngine::simulate`]. Default: 4.
    pub num_iterations: u32,
    /// Solve tangential friction along with the normal impulse. Default: true.
    pub friction_enabled: bool,
    /// Let fast contacts bounce. Default: true.
    pub restitution_enabled: bool,
    /// Keep contact manifolds across sub-steps. Default: true.
    pub caching_enabled: bool,
    /// Contacts kept per body pair, `1..=MAX_CONTACTS`. Default: 4.
    pub max_contacts: usize,
    /// Distance a cached contact may drift before it is discarded. Default: 0.3.
    pub persistence_threshold: f32,
    /// Default: 100.
    pub gjk_max_iterations: u32,
    /// Default: 100.
    pub epa_max_iterations: u32,
    /// EPA convergence distance. Default: 1e-4.
    pub epa_tolerance: f32,
    /// Fraction of the penetration removed per sub-step. Default: 0.8.
    pub correction_percent: f32,
    /// Penetration left alone by positional correction. Default: 0.005.
    pub penetration_slop: f32,
    /// Closing speed below which contacts do not bounce. Default: 0.1.
    pub resting_velocity: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            num_iterations: 4,
            friction_enabled: true,
            restitution_enabled: true,
            caching_enabled: true,
            max_contacts: MAX_CONTACTS,
            persistence_threshold: 0.3,
            gjk_max_iterations: gjk::DEFAULT_MAX_ITERATIONS,
            epa_max_iterations: epa::DEFAULT_MAX_ITERATIONS,
            epa_tolerance: epa::DEFAULT_TOLERANCE,
            correction_percent: 0.8,
            penetration_slop: 0.005,
            resting_velocity: 0.1,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if self.num_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "num_iterations must be at least 1".into(),
            ));
        }
        if !(1..=MAX_CONTACTS).contains(&self.max_contacts) {
            return Err(PhysicsError::InvalidConfig(format!(
                "max_contacts must be in 1..={MAX_CONTACTS}, got {}",
                self.max_contacts
            )));
        }
        if self.gjk_max_iterations == 0 || self.epa_max_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "GJK and EPA need at least one iteration".into(),
            ));
        }
        for (name, value) in [
            ("persistence_threshold", self.persistence_threshold),
            ("epa_tolerance", self.epa_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("penetration_slop", self.penetration_slop),
            ("resting_velocity", self.resting_velocity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.correction_percent) {
            return Err(PhysicsError::InvalidConfig(format!(
                "correction_percent must be in 0..=1, got {}",
                self.correction_percent
            )));
        }
        Ok(())
    }
}

/// Find a body by id. `bodies` must be sorted by id.
pub(crate) fn find_body(bodies: &[RigidBody], id: BodyId) -> Option<&RigidBody> {
    bodies
        .binary_search_by_key(&id, RigidBody::id)
        .ok()
        .map(|index| &bodies[index])
}

/// Mutable access to two distinct bodies.
fn pair_mut(
    bodies: &mut [RigidBody],
    a: BodyId,
    b: BodyId,
) -> Option<(&mut RigidBody, &mut RigidBody)> {
    let ia = bodies.binary_search_by_key(&a, RigidBody::id).ok()?;
    let ib = bodies.binary_search_by_key(&b, RigidBody::id).ok()?;
    if ia < ib {
        let (head, tail) = bodies.split_at_mut(ib);
        Some((&mut head[ia], &mut tail[0]))
    } else if ib < ia {
        let (head, tail) = bodies.split_at_mut(ia);
        Some((&mut tail[0], &mut head[ib]))
    } else {
        None
    }
}

/// Owns the bodies and the collision cache, and steps the simulation.
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    /// Sorted by id (insertion order).
    bodies: Vec<RigidBody>,
    next_id: u32,
    cache: CollisionCache,
    detector: CollisionDetector,
}

impl PhysicsEngine {
    /// Create an engine after validating `config`.
    pub fn new(config: PhysicsConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        Ok(Self {
            cache: CollisionCache::new(config.max_contacts, config.persistence_threshold),
            detector: CollisionDetector::from_config(&config),
            config,
            bodies: Vec::new(),
            next_id: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Take ownership of a body and return its handle.
    pub fn add_body(&mut self, mut body: RigidBody) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        body.id = id;
        body.calculate_derived_data();
        if body.is_dynamic() && body.inverse_inertia_world() == Mat3::ZERO {
            warn!(?id, "dynamic body without rotational inertia");
        }
        self.bodies.push(body);
        id
    }

    /// Remove a body and every cached manifold that refers to it.
    pub fn remove_body(&mut self, id: BodyId) -> Result<RigidBody, PhysicsError> {
        let index = self
            .bodies
            .binary_search_by_key(&id, RigidBody::id)
            .map_err(|_| PhysicsError::UnknownBody(id))?;
        self.cache.remove_body(id);
        debug!(?id, "removed body");
        Ok(self.bodies.remove(index))
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        find_body(&self.bodies, id)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let index = self.bodies.binary_search_by_key(&id, RigidBody::id).ok()?;
        Some(&mut self.bodies[index])
    }

    /// All bodies in insertion order.
    #[inline]
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Manifolds found during the last sub-step, ordered by body pair.
    pub fn collisions(&self) -> impl Iterator<Item = &CollisionData> {
        self.cache.iter()
    }

    /// Advance the simulation by `delta` seconds.
    pub fn simulate(&mut self, delta: f32) {
        if !delta.is_finite() || delta <= 0.0 {
            warn!(delta, "ignoring non-positive time step");
            return;
        }
        let dt = delta / self.config.num_iterations as f32;
        for _ in 0..self.config.num_iterations {
            self.sub_step(dt);
        }
    }

    fn sub_step(&mut self, dt: f32) {
        let Self {
            config,
            bodies,
            cache,
            detector,
            ..
        } = self;

        // 1. Apply forces and integrate
        for body in bodies.iter_mut() {
            body.calculate_derived_data();
        }
        for body in bodies.iter_mut() {
            if body.is_dynamic() {
                body.apply_force(config.gravity * body.gravity_scale * body.mass());
            }
            body.integrate(dt);
            body.calculate_derived_data();
            body.clear_accumulators();
        }

        // 2. Carry manifolds over from the previous sub-step
        if config.caching_enabled {
            cache.refresh_contacts(bodies);
        } else {
            cache.clear();
        }

        // 3. Narrowphase over every pair with at least one dynamic body
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let (a, b) = (&bodies[i], &bodies[j]);
                if !a.is_dynamic() && !b.is_dynamic() {
                    continue;
                }
                if let Some(data) = detector.detect(a, b) {
                    cache.update_collision(data);
                }
            }
        }
        cache.remove_inactive_collisions();

        // 4. Resolve
        for collision in cache.iter_mut() {
            if let Some((a, b)) = pair_mut(bodies, collision.body_a, collision.body_b) {
                solver::resolve_collision(collision, a, b, config);
            }
        }
        for body in bodies.iter_mut() {
            body.flush_impulses();
        }

        // 5. Positional correction
        for collision in cache.iter() {
            if let Some((a, b)) = pair_mut(bodies, collision.body_a, collision.body_b) {
                solver::correct_positions(collision, a, b, config);
            }
        }

        // 6. Sync and prepare the cache for the next sub-step
        for body in bodies.iter_mut() {
            body.calculate_derived_data();
        }
        cache.mark_collisions_as_inactive();

        trace!(
            bodies = bodies.len(),
            collisions = cache.len(),
            contacts = cache.iter().map(CollisionData::num_contacts).sum::<usize>(),
            "sub-step"
        );
    }
}
