mod rigid_body;

pub use self::rigid_body::{CollisionBounds, RigidBody};

/// Flags for controlling body behavior
pub mod body_flags {
    use bitflags::bitflags;

    bitflags! {
        /// Flags for controlling the behavior of rigid bodies
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct BodyFlags: u32 {
            /// Body may be frozen by the sleep heuristics when inactive
            const AUTO_SLEEP = 0x01;

            /// Body is currently sleeping (excluded from active solving)
            const SLEEPING = 0x02;

            /// Body's motion stayed below the freeze thresholds last step
            const EQUILIBRIUM = 0x04;

            /// Body is inside the world bounds
            const IN_WORLD = 0x08;
        }
    }
}
