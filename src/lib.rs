pub mod math;
pub mod core;
pub mod bodies;
pub mod collision;
pub mod constraints;

/// Re-export common types for easier usage
pub use crate::core::{BodyHandle, ConstraintHandle, DynamicsWorld, WorldConfig};
pub use crate::bodies::{CollisionBounds, RigidBody};
pub use crate::constraints::{Joint, MotorRequest};
pub use crate::error::PhysicsError;
pub use crate::math::{Matrix3, Transform, Vector3};

/// Error types for the joint engine
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Resource not found: {0}")]
        ResourceNotFound(String),

        #[error("Simulation stability error: {0}")]
        SimulationError(String),

        #[error("Internal error: {0}")]
        InternalError(String),
    }
}

/// Result type for joint engine operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
