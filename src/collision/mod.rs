mod broad_phase;

pub use self::broad_phase::{BroadPhase, CandidatePair, SweepBroadPhase};

use crate::bodies::RigidBody;
use crate::core::BodyStorage;

/// Collaborator that turns broad-phase candidate pairs into contact
/// constraints.
///
/// Contact row generation lives outside this subsystem; implementations use
/// the same row-building protocol the joints do.
pub trait ContactGenerator: Send {
    /// Processes one candidate pair for the current step
    fn process_pair(
        &mut self,
        pair: CandidatePair,
        bodies: &mut BodyStorage<RigidBody>,
        timestep: f32,
    );
}
