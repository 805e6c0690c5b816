mod ball;
mod bilateral;
mod corkscrew;
mod descriptor;
mod hinge;
mod slider;
mod universal;
mod up_vector;

pub use self::ball::{BallCallback, BallJoint, BallState};
pub use self::bilateral::{BilateralBase, ConstraintDestructorCallback, PointParam};
pub use self::corkscrew::{CorkscrewCallback, CorkscrewJoint, CorkscrewMotor, CorkscrewState};
pub use self::descriptor::{
    ConstraintRow, Jacobian, RowDescriptor, MAX_CONSTRAINT_ROWS, MAX_BOUND, MIN_BOUND,
};
pub use self::hinge::{HingeCallback, HingeJoint, HingeState};
pub use self::slider::{SliderCallback, SliderJoint, SliderState};
pub use self::universal::{UniversalCallback, UniversalJoint, UniversalMotor, UniversalState};
pub use self::up_vector::UpVectorJoint;

use crate::bodies::RigidBody;
use crate::core::BodyHandle;

/// Desired acceleration and friction bounds a joint callback may request
/// for a motor row.
#[derive(Debug, Clone, Copy)]
pub struct MotorRequest {
    /// Target relative acceleration along the driven axis
    pub acceleration: f32,

    /// Lower bound on the motor force
    pub min_friction: f32,

    /// Upper bound on the motor force
    pub max_friction: f32,
}

/// The closed set of joint variants.
///
/// All variants are known at compile time; row building dispatches with a
/// plain `match` instead of dynamic dispatch.
pub enum Joint {
    Ball(BallJoint),
    Hinge(HingeJoint),
    Slider(SliderJoint),
    Corkscrew(CorkscrewJoint),
    Universal(UniversalJoint),
    UpVector(UpVectorJoint),
}

impl Joint {
    /// Returns the shared bilateral state
    pub fn base(&self) -> &BilateralBase {
        match self {
            Joint::Ball(joint) => &joint.base,
            Joint::Hinge(joint) => &joint.base,
            Joint::Slider(joint) => &joint.base,
            Joint::Corkscrew(joint) => &joint.base,
            Joint::Universal(joint) => &joint.base,
            Joint::UpVector(joint) => &joint.base,
        }
    }

    /// Returns the shared bilateral state mutably
    pub fn base_mut(&mut self) -> &mut BilateralBase {
        match self {
            Joint::Ball(joint) => &mut joint.base,
            Joint::Hinge(joint) => &mut joint.base,
            Joint::Slider(joint) => &mut joint.base,
            Joint::Corkscrew(joint) => &mut joint.base,
            Joint::Universal(joint) => &mut joint.base,
            Joint::UpVector(joint) => &mut joint.base,
        }
    }

    /// Returns the first constrained body
    pub fn get_body0(&self) -> BodyHandle {
        self.base().get_body0()
    }

    /// Returns the second constrained body, if any
    pub fn get_body1(&self) -> Option<BodyHandle> {
        self.base().get_body1()
    }

    /// Whether the joint links its two bodies in the connectivity graph.
    ///
    /// Up-vector joints anchor a single body and never contribute edges.
    pub fn is_bilateral(&self) -> bool {
        !matches!(self, Joint::UpVector(_))
    }

    /// Fills the descriptor with this joint's constraint rows for the
    /// current step
    pub fn build_rows(
        &mut self,
        desc: &mut RowDescriptor,
        body0: &RigidBody,
        body1: Option<&RigidBody>,
    ) {
        match self {
            Joint::Ball(joint) => joint.build_rows(desc, body0, body1),
            Joint::Hinge(joint) => joint.build_rows(desc, body0, body1),
            Joint::Slider(joint) => joint.build_rows(desc, body0, body1),
            Joint::Corkscrew(joint) => joint.build_rows(desc, body0, body1),
            Joint::Universal(joint) => joint.build_rows(desc, body0, body1),
            Joint::UpVector(joint) => joint.build_rows(desc, body0),
        }
    }
}
