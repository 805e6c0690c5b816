use crate::math::{Aabb, Vector3};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Iteration-count class of the constraint solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SolverMode {
    /// High iteration count, most accurate
    Exact,

    /// Fixed number of relaxation passes
    Linear(u32),
}

impl SolverMode {
    /// Number of relaxation passes this mode runs
    pub fn iterations(&self) -> usize {
        match self {
            SolverMode::Exact => 16,
            SolverMode::Linear(passes) => (*passes).max(1) as usize,
        }
    }
}

/// Friction accuracy class, consumed by the contact generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FrictionMode {
    /// Exact friction cones
    Exact,

    /// Adaptive (cheaper) friction approximation
    Adaptive,
}

/// Numeric execution path of the row solver.
///
/// Both paths are numerically equivalent; `Auto` resolves once at the
/// first update from a capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ExecutionMode {
    /// Probe the hardware once and pick a path
    Auto,

    /// One row at a time
    Scalar,

    /// Rows processed in blocks of four
    Chunked,
}

/// Motion thresholds below which a body counts as being at rest
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct FreezeThresholds {
    /// Squared linear acceleration threshold
    pub accel2: f32,

    /// Squared angular acceleration threshold
    pub alpha2: f32,

    /// Squared linear speed threshold
    pub speed2: f32,

    /// Squared angular speed threshold
    pub omega2: f32,
}

impl Default for FreezeThresholds {
    fn default() -> Self {
        Self {
            accel2: 1.0e-2,
            alpha2: 1.0e-2,
            speed2: 1.0e-3,
            omega2: 1.0e-3,
        }
    }
}

/// Configuration for a dynamics world
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Solver iteration class
    pub solver_mode: SolverMode,

    /// Friction accuracy class
    pub friction_mode: FrictionMode,

    /// Numeric execution path
    pub execution_mode: ExecutionMode,

    /// Worker threads for the island solve; 0 picks the hardware count
    pub thread_count: usize,

    /// Solve on workers even when only one island exists
    pub thread_single_island: bool,

    /// Region bodies are expected to stay inside
    pub world_bounds: Aabb,

    /// Default linear damping applied to new bodies
    pub default_linear_damping: f32,

    /// Default angular damping applied to new bodies
    pub default_angular_damping: f32,

    /// Rest thresholds seeding the sleep table
    pub freeze_thresholds: FreezeThresholds,

    /// Constraint-force magnitude beyond which the excessive-force
    /// callback fires; `f32::MAX` disables the check
    pub excessive_force_threshold: f32,

    /// Whether bodies may be put to sleep at all
    pub sleep_enabled: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            solver_mode: SolverMode::Linear(4),
            friction_mode: FrictionMode::Adaptive,
            execution_mode: ExecutionMode::Auto,
            thread_count: 0,
            thread_single_island: false,
            world_bounds: Aabb::new(
                Vector3::new(-1000.0, -1000.0, -1000.0),
                Vector3::new(1000.0, 1000.0, 1000.0),
            ),
            default_linear_damping: 0.1,
            default_angular_damping: 0.1,
            freeze_thresholds: FreezeThresholds::default(),
            excessive_force_threshold: f32::MAX,
            sleep_enabled: true,
        }
    }
}
