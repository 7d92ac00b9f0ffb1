//! Error types for the physics core.

use thiserror::Error;

use crate::physics::rigid_body::BodyId;

/// Failure of a single narrowphase query.
///
/// These never abort a simulation step: the detector logs them and skips
/// the pair for the current sub-step.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CollisionError {
    /// GJK did not reach a verdict within its iteration bound.
    #[error("GJK did not terminate within {iterations} iterations")]
    GjkIterationLimit { iterations: u32 },
    /// EPA did not converge within its iteration bound.
    #[error("EPA did not converge within {iterations} iterations")]
    EpaIterationLimit { iterations: u32 },
    /// The polytope collapsed to zero volume (e.g. exactly touching shapes).
    #[error("degenerate polytope")]
    DegeneratePolytope,
}

/// Errors raised when building colliders, bodies or the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A configuration field is out of range.
    #[error("invalid physics config: {0}")]
    InvalidConfig(String),
    /// A collider has non-finite or non-positive dimensions, or no vertices.
    #[error("invalid collider shape: {0}")]
    InvalidShape(String),
    /// A dynamic body needs a finite, strictly positive mass.
    #[error("invalid mass {0}: dynamic bodies need a finite positive mass")]
    InvalidMass(f32),
    /// Planes are unbounded and can only be attached to static bodies.
    #[error("plane colliders can only be attached to static bodies")]
    DynamicPlane,
    /// No body with this id is owned by the engine.
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
}
