use rein_physics::glam::{Quat, Vec3};
use rein_physics::{
    BodyId, Collider, ColliderShape, PhysicsConfig, PhysicsEngine, RigidBody,
};

const DT: f32 = 1.0 / 60.0;

fn ground() -> anyhow::Result<RigidBody> {
    Ok(RigidBody::new_static(Collider::plane(Vec3::Y)?))
}

fn drop_box(engine: &mut PhysicsEngine, height: f32) -> anyhow::Result<BodyId> {
    let body = RigidBody::new_dynamic(Collider::cuboid(Vec3::splat(0.5))?, 1.0)?
        .with_position(Vec3::new(0.0, height, 0.0));
    Ok(engine.add_body(body))
}

#[test]
fn box_comes_to_rest_on_plane() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(ground()?);
    let id = drop_box(&mut engine, 1.0)?;

    // Let the bounce die out.
    for _ in 0..180 {
        engine.simulate(DT);
    }

    let settled = engine.body(id).unwrap().position.y;
    let mut highest = settled;
    for _ in 0..120 {
        engine.simulate(DT);
        let body = engine.body(id).unwrap();
        highest = highest.max(body.position.y);
        assert!(
            body.linear_velocity.y.abs() < 0.25,
            "box should be resting: v = {}",
            body.linear_velocity
        );
    }

    let body = engine.body(id).unwrap();
    assert!(
        body.position.y > 0.45 && body.position.y < 0.5 + 1e-3,
        "box should rest on the plane: y = {}",
        body.position.y
    );
    // Positional correction must not push the box upward over time.
    assert!(highest < 0.5 + 1e-3, "upward drift: max y = {highest}");
    assert!(body.position.x.abs() < 1e-3 && body.position.z.abs() < 1e-3);
    assert!(body.orientation.angle_between(Quat::IDENTITY) < 1e-2);
    Ok(())
}

#[test]
fn resting_contacts_become_persistent() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(ground()?);
    drop_box(&mut engine, 0.49)?;

    for _ in 0..30 {
        engine.simulate(DT);
    }

    let collisions: Vec<_> = engine.collisions().collect();
    assert_eq!(collisions.len(), 1);
    let manifold = collisions[0];
    assert_eq!(manifold.num_contacts(), 4);
    assert!(manifold.contacts.iter().all(|c| c.persistent));
    Ok(())
}

#[test]
fn box_rests_without_caching() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig {
        caching_enabled: false,
        ..PhysicsConfig::default()
    })?;
    engine.add_body(ground()?);
    let id = drop_box(&mut engine, 1.0)?;

    for _ in 0..180 {
        engine.simulate(DT);
    }

    let y = engine.body(id).unwrap().position.y;
    assert!(y > 0.45 && y < 0.51, "y = {y}");
    assert!(engine
        .collisions()
        .flat_map(|c| c.contacts.iter())
        .all(|c| !c.persistent));
    Ok(())
}

#[test]
fn elastic_spheres_exchange_velocities() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig {
        gravity: Vec3::ZERO,
        ..PhysicsConfig::default()
    })?;
    let ball = |x: f32, vx: f32| -> anyhow::Result<RigidBody> {
        Ok(RigidBody::new_dynamic(Collider::sphere(0.5)?, 1.0)?
            .with_position(Vec3::new(x, 0.0, 0.0))
            .with_linear_velocity(Vec3::new(vx, 0.0, 0.0))
            .with_material(1.0, 0.5, 0.3)
            .with_damping(0.0, 0.0))
    };
    let a = engine.add_body(ball(-2.0, 1.0)?);
    let b = engine.add_body(ball(2.0, -1.0)?);

    for _ in 0..180 {
        engine.simulate(DT);
    }

    let va = engine.body(a).unwrap().linear_velocity;
    let vb = engine.body(b).unwrap().linear_velocity;
    assert!((va - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-2, "va = {va}");
    assert!((vb - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-2, "vb = {vb}");
    assert!((va + vb).length() < 1e-4, "momentum must be conserved");
    Ok(())
}

#[test]
fn friction_slows_sliding_box() -> anyhow::Result<()> {
    let slide = |friction_enabled: bool| -> anyhow::Result<f32> {
        let mut engine = PhysicsEngine::new(PhysicsConfig {
            friction_enabled,
            ..PhysicsConfig::default()
        })?;
        engine.add_body(ground()?);
        let id = engine.add_body(
            RigidBody::new_dynamic(Collider::cuboid(Vec3::new(0.5, 0.25, 0.5))?, 1.0)?
                .with_position(Vec3::new(0.0, 0.245, 0.0))
                .with_linear_velocity(Vec3::new(2.0, 0.0, 0.0)),
        );
        for _ in 0..60 {
            engine.simulate(DT);
        }
        Ok(engine.body(id).unwrap().linear_velocity.x)
    };

    let frictionless = slide(false)?;
    let with_friction = slide(true)?;
    assert!(frictionless > 1.9, "frictionless box keeps sliding: {frictionless}");
    assert!(
        with_friction < 0.5 * frictionless,
        "friction should slow the box: {with_friction}"
    );
    assert!(with_friction > -1e-2, "friction must not reverse the motion");
    Ok(())
}

#[test]
fn box_lands_on_static_box() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(
        RigidBody::new_static(Collider::cuboid(Vec3::new(5.0, 0.5, 5.0))?)
            .with_position(Vec3::new(0.0, -0.5, 0.0)),
    );
    let id = drop_box(&mut engine, 1.5)?;

    for _ in 0..120 {
        engine.simulate(DT);
    }

    let y = engine.body(id).unwrap().position.y;
    assert!(y > 0.2 && y < 1.0, "box should land on the ground box: y = {y}");
    Ok(())
}

#[test]
fn cylinder_and_cone_land_on_static_box() -> anyhow::Result<()> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(
        RigidBody::new_static(Collider::cuboid(Vec3::new(5.0, 0.5, 5.0))?)
            .with_position(Vec3::new(0.0, -0.5, 0.0)),
    );
    let cylinder = engine.add_body(
        RigidBody::new_dynamic(
            Collider::new(ColliderShape::Cylinder {
                radius: 0.35,
                half_height: 0.3,
            })?,
            1.0,
        )?
        .with_position(Vec3::new(-1.0, 1.0, 0.0))
        .with_orientation(Quat::from_rotation_y(0.4)),
    );
    let cone = engine.add_body(
        RigidBody::new_dynamic(
            Collider::new(ColliderShape::Cone {
                radius: 0.4,
                height: 0.8,
            })?,
            1.0,
        )?
        .with_position(Vec3::new(1.0, 1.0, 0.0)),
    );

    let mut touched = Vec::new();
    for _ in 0..180 {
        engine.simulate(DT);
        for data in engine.collisions() {
            assert!(
                data.contacts.iter().all(|c| c.penetration >= 0.0),
                "contacts must not report negative depth"
            );
            touched.extend([data.body_a, data.body_b]);
        }
    }
    assert!(touched.contains(&cylinder) && touched.contains(&cone));

    // Resting heights: half the cylinder, a quarter of the cone.
    let y = engine.body(cylinder).unwrap().position.y;
    assert!(y > 0.15 && y < 0.6, "cylinder should rest on the box: y = {y}");
    let y = engine.body(cone).unwrap().position.y;
    assert!(y > 0.05 && y < 0.6, "cone should rest on the box: y = {y}");
    Ok(())
}

fn pile() -> anyhow::Result<PhysicsEngine> {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default())?;
    engine.add_body(ground()?);
    for i in 0..6 {
        let x = (i % 3) as f32 * 0.7 - 0.7;
        let y = 0.6 + i as f32 * 0.9;
        let collider = match i % 3 {
            0 => Collider::cuboid(Vec3::new(0.4, 0.3, 0.35))?,
            1 => Collider::sphere(0.4)?,
            _ => Collider::new(ColliderShape::Capsule {
                radius: 0.2,
                half_height: 0.3,
            })?,
        };
        engine.add_body(
            RigidBody::new_dynamic(collider, 1.0 + i as f32 * 0.5)?
                .with_position(Vec3::new(x, y, 0.1 * i as f32))
                .with_orientation(Quat::from_rotation_z(0.3 * i as f32)),
        );
    }
    Ok(engine)
}

#[test]
fn simulation_is_deterministic() -> anyhow::Result<()> {
    let mut first = pile()?;
    let mut second = pile()?;
    for _ in 0..120 {
        first.simulate(DT);
        second.simulate(DT);
    }

    for (a, b) in first.bodies().iter().zip(second.bodies()) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.position.to_array(), b.position.to_array());
        assert_eq!(a.orientation.to_array(), b.orientation.to_array());
        assert_eq!(a.linear_velocity.to_array(), b.linear_velocity.to_array());
    }
    let first_pairs: Vec<_> = first.collisions().map(|c| (c.body_a, c.body_b)).collect();
    let second_pairs: Vec<_> = second.collisions().map(|c| (c.body_a, c.body_b)).collect();
    assert_eq!(first_pairs, second_pairs);
    Ok(())
}
