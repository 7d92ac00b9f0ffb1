//! Scene setup shared by the physics benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rein_physics::glam::{Quat, Vec3};
use rein_physics::{Collider, ColliderShape, PhysicsConfig, PhysicsEngine, RigidBody};

/// Seed shared by every scene so runs are comparable.
pub const SCENE_SEED: u64 = 0x5eed;

/// The convex shapes cycled through by the mixed scenes.
pub fn mixed_collider(index: usize) -> anyhow::Result<Collider> {
    let shape = match index % 5 {
        0 => ColliderShape::Sphere { radius: 0.4 },
        1 => ColliderShape::Box {
            half_extents: Vec3::new(0.4, 0.3, 0.35),
        },
        2 => ColliderShape::Capsule {
            radius: 0.25,
            half_height: 0.3,
        },
        3 => ColliderShape::Cylinder {
            radius: 0.35,
            half_height: 0.3,
        },
        _ => ColliderShape::Cone {
            radius: 0.4,
            height: 0.8,
        },
    };
    Ok(Collider::new(shape)?)
}

/// `n` mixed bodies stacked in columns above a ground plane.
pub fn setup_scene(n: usize) -> anyhow::Result<PhysicsEngine> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(RigidBody::new_static(Collider::plane(Vec3::Y)?));

    let columns = (n as f32).sqrt().ceil().max(1.0) as usize;
    let mut rng = StdRng::seed_from_u64(SCENE_SEED);
    for i in 0..n {
        let x = (i % columns) as f32 * 1.2;
        let z = (i / columns) as f32 * 1.2;
        let y = 1.0 + rng.gen_range(0.0..3.0f32);
        let orientation = Quat::from_rotation_y(rng.gen_range(0.0..std::f32::consts::TAU));
        engine.add_body(
            RigidBody::new_dynamic(mixed_collider(i)?, 1.0)?
                .with_position(Vec3::new(x, y, z))
                .with_orientation(orientation),
        );
    }
    Ok(engine)
}

/// Two colliders with their centers `distance` apart along X, B slightly rotated.
pub fn collider_pair(
    a: ColliderShape,
    b: ColliderShape,
    distance: f32,
) -> anyhow::Result<(Collider, Collider)> {
    let mut ca = Collider::new(a)?;
    let mut cb = Collider::new(b)?;
    ca.update_transform(Vec3::ZERO, Quat::IDENTITY);
    cb.update_transform(Vec3::new(distance, 0.1, -0.05), Quat::from_rotation_y(0.3));
    Ok((ca, cb))
}

/// Run `frames` steps of 1/60 s.
pub fn run_frames(engine: &mut PhysicsEngine, frames: usize) {
    for _ in 0..frames {
        engine.simulate(1.0 / 60.0);
    }
}
