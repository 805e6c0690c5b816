mod config;
mod context;
mod island;
mod scheduler;
mod sleep;
mod solver;
mod storage;
mod world;

pub use self::config::{ExecutionMode, FreezeThresholds, FrictionMode, SolverMode, WorldConfig};
pub use self::island::Island;
pub use self::sleep::{SleepEntry, SleepTable};
pub use self::storage::{BodyStorage, ConstraintStorage};
pub use self::world::{
    DynamicsWorld, ExcessiveForceCallback, LeaveWorldCallback,
};

pub(crate) use self::context::SimulationContext;
pub(crate) use self::scheduler::IslandScheduler;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Handle identifying a rigid body inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BodyHandle(pub u32);

/// Handle identifying a joint inside a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ConstraintHandle(pub u32);
