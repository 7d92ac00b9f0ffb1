//! rein physics core
//!
//! Rigid body simulation built around a GJK/EPA narrowphase, persistent
//! contact manifolds and an impulse solver with friction.
//!
//! # Architecture
//!
//! The library is organized leaf-first:
//!
//! 1. **collider** - Shapes, support functions and mass properties
//! 2. **gjk** / **epa** - Intersection test and penetration depth
//! 3. **contact** - Contacts, manifolds and impulse math
//! 4. **collision_cache** - Manifold persistence across steps
//! 5. **narrowphase** - Per-pair collision dispatch
//! 6. **solver** - Impulse resolution and positional correction
//! 7. **PhysicsEngine** - The step loop tying it together
//!
//! ```
//! use rein_physics::glam::Vec3;
//! use rein_physics::{Collider, PhysicsConfig, PhysicsEngine, RigidBody};
//!
//! # fn main() -> Result<(), rein_physics::PhysicsError> {
//! let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
//! engine.add_body(RigidBody::new_static(Collider::plane(Vec3::Y)?));
//! let ball = engine.add_body(
//!     RigidBody::new_dynamic(Collider::sphere(0.5)?, 1.0)?.with_position(Vec3::new(0.0, 2.0, 0.0)),
//! );
//!
//! for _ in 0..120 {
//!     engine.simulate(1.0 / 60.0);
//! }
//! assert!(engine.body(ball).unwrap().position.y > 0.0);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod physics;

pub use error::{CollisionError, PhysicsError};

pub use physics::collider::{Collider, ColliderShape};
pub use physics::collision_cache::{CollisionCache, IdPair};
pub use physics::contact::{CollisionData, Contact, MAX_CONTACTS};
pub use physics::epa::{epa_penetration, Penetration};
pub use physics::gjk::{gjk_intersection, test_intersection, Simplex, SupportPoint};
pub use physics::narrowphase::CollisionDetector;
pub use physics::rigid_body::{BodyId, RigidBody, RigidBodyType};
pub use physics::{PhysicsConfig, PhysicsEngine};

pub use glam;
