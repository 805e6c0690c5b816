use crate::bodies::RigidBody;
use crate::constraints::bilateral::{BilateralBase, PointParam};
use crate::constraints::descriptor::RowDescriptor;
use crate::constraints::MotorRequest;
use crate::core::BodyHandle;
use crate::math::{Transform, Vector3};
use crate::Result;

/// State handed to a hinge joint's per-step callback
#[derive(Debug, Clone, Copy)]
pub struct HingeState {
    /// Resolved rotation about the hinge axis
    pub angle: f32,

    /// Relative angular velocity about the hinge axis
    pub omega: f32,

    /// Current step length in seconds
    pub timestep: f32,
}

/// Per-step motor/friction callback for a hinge joint
pub type HingeCallback = Box<dyn FnMut(HingeState) -> Option<MotorRequest> + Send>;

/// Hinge joint: pins a shared pivot and locks two rotational degrees of
/// freedom, leaving rotation about the pin axis free.
pub struct HingeJoint {
    pub(crate) base: BilateralBase,

    /// Resolved hinge angle from the last step
    angle: f32,

    /// Resolved hinge rate from the last step
    omega: f32,

    callback: Option<HingeCallback>,
}

impl HingeJoint {
    /// Creates a hinge at the given world pivot rotating about `pin_dir`
    pub(crate) fn new(
        pivot: Vector3,
        pin_dir: Vector3,
        body0: BodyHandle,
        body1: Option<BodyHandle>,
        matrix0: &Transform,
        matrix1: &Transform,
    ) -> Result<Self> {
        let mut base = BilateralBase::new(body0, body1);
        base.set_pivot_and_pin_dir(pivot, pin_dir, matrix0, matrix1)?;
        Ok(Self {
            base,
            angle: 0.0,
            omega: 0.0,
            callback: None,
        })
    }

    /// Registers a callback that may drive the free axis each step
    pub fn set_callback<F>(&mut self, callback: F)
    where
        F: FnMut(HingeState) -> Option<MotorRequest> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Returns the resolved hinge angle from the last step
    pub fn get_joint_angle(&self) -> f32 {
        self.angle
    }

    /// Returns the resolved hinge rate from the last step
    pub fn get_joint_omega(&self) -> f32 {
        self.omega
    }

    /// Returns the reaction force solved for a row last step
    pub fn get_joint_force(&self, row: usize) -> f32 {
        self.base.get_row_force(row)
    }

    pub(crate) fn build_rows(
        &mut self,
        desc: &mut RowDescriptor,
        body0: &RigidBody,
        body1: Option<&RigidBody>,
    ) {
        let matrix0 = body0.get_transform();
        let matrix1 = body1.map(|b| b.get_transform());
        let (global0, global1, euler) = self
            .base
            .calculate_global_matrix_and_angle(&matrix0, matrix1.as_ref());

        let omega0 = body0.get_angular_velocity();
        let omega1 = body1
            .map(|b| b.get_angular_velocity())
            .unwrap_or_else(Vector3::zero);

        let front0 = global0.basis.front();
        self.angle = -euler.x;
        self.omega = (omega0 - omega1).dot(front0);

        let stiffness = self.base.get_stiffness();
        let param = PointParam::new(body0, body1, global0.position, global1.position, stiffness);
        self.base.calculate_point_derivative(desc, front0, &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.up(), &param);
        self.base
            .calculate_point_derivative(desc, global0.basis.right(), &param);

        // Two angular rows perpendicular to the free axis keep the pin
        // directions aligned.
        let front1 = global1.basis.front();
        let misalign = front0.cross(front1);
        self.base.calculate_angular_derivative(
            desc,
            global0.basis.up(),
            omega0,
            omega1,
            misalign.dot(global0.basis.up()),
            stiffness,
        );
        self.base.calculate_angular_derivative(
            desc,
            global0.basis.right(),
            omega0,
            omega1,
            misalign.dot(global0.basis.right()),
            stiffness,
        );

        if let Some(callback) = self.callback.as_mut() {
            let request = callback(HingeState {
                angle: self.angle,
                omega: self.omega,
                timestep: desc.timestep,
            });
            if let Some(request) = request {
                let index = self
                    .base
                    .calculate_angular_derivative(desc, front0, omega0, omega1, 0.0, stiffness);
                desc.rows[index].min_force = request.min_friction;
                desc.rows[index].max_force = request.max_friction;
                self.base
                    .set_motor_acceleration(desc, index, request.acceleration);
            }
        }
    }
}
