//! Collider shapes: support functions for GJK/EPA and mass properties.

use std::f32::consts::PI;

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::error::PhysicsError;

/// Collider shape in the collider's local frame.
///
/// Axial shapes (capsule, cylinder, cone) are aligned with the local Y axis.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Sphere {
        radius: f32,
    },
    Box {
        half_extents: Vec3,
    },
    Capsule {
        radius: f32,
        half_height: f32,
    },
    Cylinder {
        radius: f32,
        half_height: f32,
    },
    /// Apex on +Y. The local origin is the centroid, a quarter of the
    /// height above the base.
    Cone {
        radius: f32,
        height: f32,
    },
    /// Convex polyhedron. `indices` are the hull triangles and are only
    /// used for volume and inertia.
    ConvexMesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
    /// Flat convex polygon lying in the local XZ plane.
    Polygon {
        vertices: Vec<Vec3>,
    },
    /// Infinite half-space below the plane through the local origin.
    Plane {
        normal: Vec3,
    },
}

impl ColliderShape {
    /// Check dimensions are finite and strictly positive.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        fn positive(name: &str, value: f32) -> Result<(), PhysicsError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PhysicsError::InvalidShape(format!(
                    "{name} must be finite and positive, got {value}"
                )))
            }
        }

        match self {
            ColliderShape::Sphere { radius } => positive("radius", *radius),
            ColliderShape::Box { half_extents } => {
                positive("half_extents.x", half_extents.x)?;
                positive("half_extents.y", half_extents.y)?;
                positive("half_extents.z", half_extents.z)
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            }
            | ColliderShape::Cylinder {
                radius,
                half_height,
            } => {
                positive("radius", *radius)?;
                positive("half_height", *half_height)
            }
            ColliderShape::Cone { radius, height } => {
                positive("radius", *radius)?;
                positive("height", *height)
            }
            ColliderShape::ConvexMesh { vertices, indices } => {
                if vertices.len() < 4 {
                    return Err(PhysicsError::InvalidShape(format!(
                        "convex mesh needs at least 4 vertices, got {}",
                        vertices.len()
                    )));
                }
                if !vertices.iter().all(|v| v.is_finite()) {
                    return Err(PhysicsError::InvalidShape(
                        "convex mesh has non-finite vertices".into(),
                    ));
                }
                let n = vertices.len() as u32;
                if indices.iter().flatten().any(|&i| i >= n) {
                    return Err(PhysicsError::InvalidShape(
                        "convex mesh index out of range".into(),
                    ));
                }
                Ok(())
            }
            ColliderShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(PhysicsError::InvalidShape(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
                if vertices.iter().any(|v| !v.is_finite() || v.y.abs() > 1e-6) {
                    return Err(PhysicsError::InvalidShape(
                        "polygon vertices must be finite and lie in the XZ plane".into(),
                    ));
                }
                Ok(())
            }
            ColliderShape::Plane { normal } => {
                if normal.is_finite() && normal.length_squared() > 1e-12 {
                    Ok(())
                } else {
                    Err(PhysicsError::InvalidShape(
                        "plane normal must be finite and non-zero".into(),
                    ))
                }
            }
        }
    }

    /// GJK/EPA support function in local space. Returns the farthest point
    /// of the shape along `direction`.
    ///
    /// Planes are unbounded and have no support point; callers dispatch
    /// them to the plane test instead.
    #[inline]
    pub fn local_support(&self, direction: Vec3) -> Vec3 {
        match self {
            ColliderShape::Sphere { radius } => direction.normalize_or_zero() * *radius,
            ColliderShape::Box { half_extents } => Vec3::new(
                if direction.x >= 0.0 {
                    half_extents.x
                } else {
                    -half_extents.x
                },
                if direction.y >= 0.0 {
                    half_extents.y
                } else {
                    -half_extents.y
                },
                if direction.z >= 0.0 {
                    half_extents.z
                } else {
                    -half_extents.z
                },
            ),
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let cap = if direction.y >= 0.0 {
                    *half_height
                } else {
                    -*half_height
                };
                Vec3::new(0.0, cap, 0.0) + direction.normalize_or_zero() * *radius
            }
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => {
                let y = if direction.y >= 0.0 {
                    *half_height
                } else {
                    -*half_height
                };
                let rim = radial(direction, *radius);
                Vec3::new(rim.x, y, rim.z)
            }
            ColliderShape::Cone { radius, height } => {
                let apex = Vec3::new(0.0, 0.75 * *height, 0.0);
                let len = direction.length();
                if len <= f32::EPSILON {
                    return apex;
                }
                // The apex wins while the direction is inside its normal cone.
                let sin_half_angle = *radius / (*radius * *radius + *height * *height).sqrt();
                if direction.y >= len * sin_half_angle {
                    apex
                } else {
                    let rim = radial(direction, *radius);
                    Vec3::new(rim.x, -0.25 * *height, rim.z)
                }
            }
            ColliderShape::ConvexMesh { vertices, .. } | ColliderShape::Polygon { vertices } => {
                farthest_vertex(vertices, direction)
            }
            ColliderShape::Plane { .. } => {
                debug_assert!(false, "planes have no support function");
                Vec3::ZERO
            }
        }
    }

    /// Corner points of polyhedral shapes, used for plane contacts.
    ///
    /// Returns `None` for curved shapes.
    pub fn local_vertices(&self) -> Option<Vec<Vec3>> {
        match self {
            ColliderShape::Box { half_extents } => {
                let h = *half_extents;
                let mut corners = Vec::with_capacity(8);
                for sx in [-1.0, 1.0] {
                    for sy in [-1.0, 1.0] {
                        for sz in [-1.0, 1.0] {
                            corners.push(Vec3::new(sx * h.x, sy * h.y, sz * h.z));
                        }
                    }
                }
                Some(corners)
            }
            ColliderShape::ConvexMesh { vertices, .. } | ColliderShape::Polygon { vertices } => {
                Some(vertices.clone())
            }
            _ => None,
        }
    }

    /// Volume of the shape. Polygons are flat (zero volume), planes are unbounded.
    pub fn volume(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            ColliderShape::Box { half_extents } => {
                8.0 * half_extents.x * half_extents.y * half_extents.z
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            } => PI * radius * radius * (2.0 * half_height) + 4.0 / 3.0 * PI * radius.powi(3),
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => PI * radius * radius * (2.0 * half_height),
            ColliderShape::Cone { radius, height } => PI * radius * radius * height / 3.0,
            ColliderShape::ConvexMesh { vertices, indices } => {
                mesh_volume_and_centroid(vertices, indices).0
            }
            ColliderShape::Polygon { .. } => 0.0,
            ColliderShape::Plane { .. } => f32::INFINITY,
        }
    }

    /// Inertia tensor of a body of the given mass about the shape's centroid,
    /// in local space.
    pub fn inertia_tensor(&self, mass: f32) -> Mat3 {
        match self {
            ColliderShape::Sphere { radius } => {
                Mat3::from_diagonal(Vec3::splat(0.4 * mass * radius * radius))
            }
            ColliderShape::Box { half_extents } => {
                let sq = *half_extents * *half_extents;
                Mat3::from_diagonal(
                    Vec3::new(sq.y + sq.z, sq.x + sq.z, sq.x + sq.y) * (mass / 3.0),
                )
            }
            ColliderShape::Capsule {
                radius,
                half_height,
            } => {
                let r2 = radius * radius;
                let cylinder_volume = PI * r2 * (2.0 * half_height);
                let sphere_volume = 4.0 / 3.0 * PI * r2 * radius;
                let total = cylinder_volume + sphere_volume;
                let m_cyl = mass * cylinder_volume / total;
                let m_caps = mass * sphere_volume / total;
                let h = 2.0 * half_height;

                // Each hemisphere's centroid sits 3r/8 past the cylinder end.
                let axial = 0.5 * m_cyl * r2 + 0.4 * m_caps * r2;
                let lateral = m_cyl * (3.0 * r2 + h * h) / 12.0
                    + m_caps * (0.4 * r2 + half_height * half_height + 0.75 * half_height * radius);
                Mat3::from_diagonal(Vec3::new(lateral, axial, lateral))
            }
            ColliderShape::Cylinder {
                radius,
                half_height,
            } => {
                let r2 = radius * radius;
                let h = 2.0 * half_height;
                let lateral = mass * (3.0 * r2 + h * h) / 12.0;
                Mat3::from_diagonal(Vec3::new(lateral, 0.5 * mass * r2, lateral))
            }
            ColliderShape::Cone { radius, height } => {
                let r2 = radius * radius;
                let lateral = 3.0 / 80.0 * mass * (4.0 * r2 + height * height);
                Mat3::from_diagonal(Vec3::new(lateral, 0.3 * mass * r2, lateral))
            }
            ColliderShape::ConvexMesh { vertices, indices } => {
                mesh_inertia(vertices, indices, mass)
            }
            ColliderShape::Polygon { vertices } => lamina_inertia(vertices, mass),
            ColliderShape::Plane { .. } => Mat3::ZERO,
        }
    }
}

/// Point on a circle of `radius` in the XZ plane, in the planar direction of `direction`.
#[inline]
fn radial(direction: Vec3, radius: f32) -> Vec3 {
    let xz = Vec3::new(direction.x, 0.0, direction.z);
    let xz_len = xz.length();
    if xz_len > 1e-6 {
        xz * (radius / xz_len)
    } else {
        Vec3::ZERO
    }
}

#[inline]
fn farthest_vertex(vertices: &[Vec3], direction: Vec3) -> Vec3 {
    let Some((first, rest)) = vertices.split_first() else {
        return Vec3::ZERO;
    };
    let mut best = *first;
    let mut best_dot = best.dot(direction);
    for p in rest {
        let d = p.dot(direction);
        if d > best_dot {
            best_dot = d;
            best = *p;
        }
    }
    best
}

fn tetrahedron_signed_volume(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> f32 {
    (p2 - p1).dot((p3 - p1).cross(p4 - p1)) / 6.0
}

/// Signed volume and centroid of a closed triangle mesh.
fn mesh_volume_and_centroid(vertices: &[Vec3], indices: &[[u32; 3]]) -> (f32, Vec3) {
    let reference = vertices.first().copied().unwrap_or(Vec3::ZERO);
    let mut volume = 0.0;
    let mut weighted = Vec3::ZERO;

    for t in indices {
        let p2 = vertices[t[0] as usize];
        let p3 = vertices[t[1] as usize];
        let p4 = vertices[t[2] as usize];
        let v = tetrahedron_signed_volume(reference, p2, p3, p4);
        weighted += (reference + p2 + p3 + p4) * 0.25 * v;
        volume += v;
    }

    if volume.abs() <= f32::EPSILON {
        (0.0, reference)
    } else {
        (volume.abs(), weighted / volume)
    }
}

/// Inertia tensor of a tetrahedron of unit density, relative to `origin`.
fn tetrahedron_unit_inertia(origin: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> Mat3 {
    let p = [p1 - origin, p2 - origin, p3 - origin, p4 - origin];

    // Sum over i <= j of a_i * a_j for one coordinate.
    let sym = |f: &dyn Fn(Vec3) -> f32| {
        let mut s = 0.0;
        for i in 0..4 {
            for j in i..4 {
                s += f(p[i]) * f(p[j]);
            }
        }
        s
    };
    // Sum of a_i * b_j with doubled diagonal terms.
    let mixed = |fa: &dyn Fn(Vec3) -> f32, fb: &dyn Fn(Vec3) -> f32| {
        let mut s = 0.0;
        for i in 0..4 {
            for j in 0..4 {
                let w = if i == j { 2.0 } else { 1.0 };
                s += w * fa(p[i]) * fb(p[j]);
            }
        }
        s
    };

    let xx = sym(&|v: Vec3| v.x);
    let yy = sym(&|v: Vec3| v.y);
    let zz = sym(&|v: Vec3| v.z);
    let a0 = (yy + zz) * 0.1;
    let b0 = (zz + xx) * 0.1;
    let c0 = (xx + yy) * 0.1;
    let a1 = mixed(&|v: Vec3| v.y, &|v: Vec3| v.z) * 0.05;
    let b1 = mixed(&|v: Vec3| v.x, &|v: Vec3| v.z) * 0.05;
    let c1 = mixed(&|v: Vec3| v.x, &|v: Vec3| v.y) * 0.05;

    Mat3::from_cols(
        Vec3::new(a0, -c1, -b1),
        Vec3::new(-c1, b0, -a1),
        Vec3::new(-b1, -a1, c0),
    )
}

fn mesh_inertia(vertices: &[Vec3], indices: &[[u32; 3]], mass: f32) -> Mat3 {
    let (volume, centroid) = mesh_volume_and_centroid(vertices, indices);
    if volume <= f32::EPSILON {
        return Mat3::ZERO;
    }

    let mut total = Mat3::ZERO;
    for t in indices {
        let p2 = vertices[t[0] as usize];
        let p3 = vertices[t[1] as usize];
        let p4 = vertices[t[2] as usize];
        let v = tetrahedron_signed_volume(centroid, p2, p3, p4);
        total += tetrahedron_unit_inertia(centroid, centroid, p2, p3, p4) * v;
    }

    // The summed signed volumes share the sign of the winding.
    let sign = if total.col(0).x < 0.0 { -1.0 } else { 1.0 };
    total * (sign * mass / volume)
}

/// Thin-plate inertia of a polygon in the XZ plane, fanned from its first vertex.
fn lamina_inertia(vertices: &[Vec3], mass: f32) -> Mat3 {
    let Some((&p0, rest)) = vertices.split_first() else {
        return Mat3::ZERO;
    };

    let mut area = 0.0;
    let mut sxx = 0.0;
    let mut szz = 0.0;
    let mut sxz = 0.0;
    for pair in rest.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);
        let a = 0.5 * (p1 - p0).cross(p2 - p0).length();
        area += a;
        sxx += a / 6.0 * (p0.x * p0.x + p1.x * p1.x + p2.x * p2.x
            + p0.x * p1.x + p0.x * p2.x + p1.x * p2.x);
        szz += a / 6.0 * (p0.z * p0.z + p1.z * p1.z + p2.z * p2.z
            + p0.z * p1.z + p0.z * p2.z + p1.z * p2.z);
        sxz += a / 12.0
            * (2.0 * (p0.x * p0.z + p1.x * p1.z + p2.x * p2.z)
                + p0.x * p1.z + p1.x * p0.z
                + p0.x * p2.z + p2.x * p0.z
                + p1.x * p2.z + p2.x * p1.z);
    }

    if area <= f32::EPSILON {
        return Mat3::ZERO;
    }
    let density = mass / area;
    Mat3::from_cols(
        Vec3::new(szz, 0.0, -sxz) * density,
        Vec3::new(0.0, sxx + szz, 0.0) * density,
        Vec3::new(-sxz, 0.0, sxx) * density,
    )
}

/// A shape attached to a rigid body, with its cached world transform.
#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset from the body origin, in body space.
    pub offset: Vec3,
    to_world: Mat4,
    to_local: Mat4,
}

impl Collider {
    /// Create a collider after validating the shape's dimensions.
    pub fn new(shape: ColliderShape) -> Result<Self, PhysicsError> {
        shape.validate()?;
        Ok(Self {
            shape,
            offset: Vec3::ZERO,
            to_world: Mat4::IDENTITY,
            to_local: Mat4::IDENTITY,
        })
    }

    pub fn sphere(radius: f32) -> Result<Self, PhysicsError> {
        Self::new(ColliderShape::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self, PhysicsError> {
        Self::new(ColliderShape::Box { half_extents })
    }

    pub fn plane(normal: Vec3) -> Result<Self, PhysicsError> {
        Self::new(ColliderShape::Plane {
            normal: normal.normalize_or_zero(),
        })
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Recompute the shape-to-world transform from the owning body's pose.
    pub fn update_transform(&mut self, position: Vec3, orientation: Quat) {
        self.to_world =
            Mat4::from_rotation_translation(orientation, position) * Mat4::from_translation(self.offset);
        self.to_local = self.to_world.inverse();
    }

    #[inline]
    pub fn world_transform(&self) -> &Mat4 {
        &self.to_world
    }

    /// World-space position of the shape origin.
    #[inline]
    pub fn center(&self) -> Vec3 {
        self.to_world.w_axis.truncate()
    }

    /// World-space point of the shape farthest along `direction`.
    #[inline]
    pub fn support_point(&self, direction: Vec3) -> Vec3 {
        let local_dir = self.to_local.transform_vector3(direction);
        self.to_world
            .transform_point3(self.shape.local_support(local_dir))
    }

    /// World-space corners of polyhedral shapes.
    pub fn world_vertices(&self) -> Option<Vec<Vec3>> {
        self.shape.local_vertices().map(|points| {
            points
                .into_iter()
                .map(|p| self.to_world.transform_point3(p))
                .collect()
        })
    }

    /// World-space plane normal, if this is a plane.
    pub fn world_plane_normal(&self) -> Option<Vec3> {
        match self.shape {
            ColliderShape::Plane { normal } => {
                Some(self.to_world.transform_vector3(normal).normalize_or_zero())
            }
            _ => None,
        }
    }

    pub fn is_plane(&self) -> bool {
        matches!(self.shape, ColliderShape::Plane { .. })
    }

    pub fn volume(&self) -> f32 {
        self.shape.volume()
    }

    /// Inertia tensor about the body origin, including the collider offset.
    pub fn inertia_tensor(&self, mass: f32) -> Mat3 {
        let centroidal = self.shape.inertia_tensor(mass);
        let d = self.offset;
        // Parallel axis theorem.
        let shift = Mat3::from_diagonal(Vec3::splat(d.length_squared()))
            - Mat3::from_cols(d * d.x, d * d.y, d * d.z);
        centroidal + shift * mass
    }
}
